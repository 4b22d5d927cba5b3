//! Common error types for primitives

use thiserror::Error;
use crate::hash::HashError;

/// Primitive operation error
#[derive(Debug, Error)]
pub enum PrimitiveError {
    /// Hash error
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Transaction id error
    #[error("invalid transaction id: {0}")]
    TxId(String),
}
