//! SDK error types

use thiserror::Error;

/// SDK error type
#[derive(Debug, Error)]
pub enum SdkError {
    /// Transport/network error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reported by a remote node
    #[error("Remote error: {code} - {message}")]
    Remote {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Certificate authority refused the enrollment
    #[error("Enrollment rejected: {0}")]
    Enrollment(String),

    /// Invalid private key
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid certificate contents
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Invalid hex string
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Channel object already allocated in this client context
    #[error("Channel already exists: {0}")]
    ChannelExists(String),

    /// Commit notification sender went away before delivering an event
    #[error("Commit notification channel closed")]
    NotificationClosed,

    /// Invalid argument passed to an SDK call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<hex::FromHexError> for SdkError {
    fn from(e: hex::FromHexError) -> Self {
        SdkError::InvalidHex(e.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::Serialization(e.to_string())
    }
}

impl From<ledgerq_crypto::CryptoError> for SdkError {
    fn from(e: ledgerq_crypto::CryptoError) -> Self {
        SdkError::SigningFailed(e.to_string())
    }
}
