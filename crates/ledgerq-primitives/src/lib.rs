//! # ledgerq-primitives
//!
//! Primitive types shared by the ledgerq crates.
//!
//! - [`H256`]: 32-byte digest used for payload digests and proposal hashes
//! - [`TxId`]: transaction identifier assigned to every proposal

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod tx_id;

pub use error::PrimitiveError;
pub use hash::{HashError, H256};
pub use tx_id::TxId;

/// Block number reported in commit notifications
pub type BlockNumber = u64;
