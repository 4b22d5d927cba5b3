//! Orchestration error types

use std::time::Duration;

use ledgerq_primitives::TxId;
use ledgerq_sdk::SdkError;
use thiserror::Error;

/// Orchestration errors
#[derive(Debug, Error)]
pub enum CoreError {
    /// Enrollment failed or the identity is unusable
    #[error("identity error: {0}")]
    Identity(String),

    /// Channel object could not be created or queried
    #[error("channel error: {0}")]
    Channel(String),

    /// No discovery peer participates in the channel
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// Operation invoked before the session was set up
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Install or instantiate responses did not agree
    #[error("chaincode {chaincode} deployment inconsistent ({detail}); dissenting peers: {}", .dissenters.join(", "))]
    InstallInconsistency {
        /// Chaincode name
        chaincode: String,
        /// Peers that failed or disagreed, in observation order
        dissenters: Vec<String>,
        /// First failure message reported by a peer
        detail: String,
    },

    /// No proposal responses to evaluate
    #[error("no proposal responses received for {0}")]
    NoResponse(String),

    /// Invocation responses did not agree
    #[error("Inconsistent proposal responses across {sets} consistency sets; dissenting peers: {}", .dissenters.join(", "))]
    InvocationInconsistency {
        /// Chaincode name
        chaincode: String,
        /// Peers that failed or disagreed, in observation order
        dissenters: Vec<String>,
        /// Number of consistency sets
        sets: usize,
    },

    /// Commit notification did not arrive in time
    #[error("Transaction {tx_id} not committed within {timeout:?}")]
    CommitTimeout {
        /// Submitted transaction
        tx_id: TxId,
        /// The bound that expired
        timeout: Duration,
    },

    /// Validation rejected the committed transaction
    #[error("Transaction {tx_id} rejected: {code}")]
    CommitRejected {
        /// Submitted transaction
        tx_id: TxId,
        /// Validation code
        code: String,
    },

    /// No endorsing peers are configured for the chaincode
    #[error("Endorsing peer information not provided for chaincode {0}")]
    UnconfiguredPeers(String),

    /// The caller cancelled the invocation
    #[error("Invocation cancelled")]
    Cancelled,

    /// Malformed request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Credential store failure
    #[error("credential store error: {0}")]
    Store(String),

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),

    /// Network SDK failure
    #[error("sdk error: {0}")]
    Sdk(#[from] SdkError),
}

/// Stable classification of [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// [`CoreError::Identity`]
    Identity,
    /// [`CoreError::Channel`]
    Channel,
    /// [`CoreError::ChannelNotFound`]
    ChannelNotFound,
    /// [`CoreError::Precondition`]
    Precondition,
    /// [`CoreError::InstallInconsistency`]
    InstallInconsistency,
    /// [`CoreError::NoResponse`]
    NoResponse,
    /// [`CoreError::InvocationInconsistency`]
    InvocationInconsistency,
    /// [`CoreError::CommitTimeout`]
    CommitTimeout,
    /// [`CoreError::CommitRejected`]
    CommitRejected,
    /// [`CoreError::UnconfiguredPeers`]
    UnconfiguredPeers,
    /// [`CoreError::Cancelled`]
    Cancelled,
    /// [`CoreError::InvalidRequest`]
    InvalidRequest,
    /// [`CoreError::Store`]
    Store,
    /// [`CoreError::Config`]
    Config,
    /// [`CoreError::Sdk`]
    Sdk,
}

impl CoreError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Identity(_) => ErrorKind::Identity,
            CoreError::Channel(_) => ErrorKind::Channel,
            CoreError::ChannelNotFound(_) => ErrorKind::ChannelNotFound,
            CoreError::Precondition(_) => ErrorKind::Precondition,
            CoreError::InstallInconsistency { .. } => ErrorKind::InstallInconsistency,
            CoreError::NoResponse(_) => ErrorKind::NoResponse,
            CoreError::InvocationInconsistency { .. } => ErrorKind::InvocationInconsistency,
            CoreError::CommitTimeout { .. } => ErrorKind::CommitTimeout,
            CoreError::CommitRejected { .. } => ErrorKind::CommitRejected,
            CoreError::UnconfiguredPeers(_) => ErrorKind::UnconfiguredPeers,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CoreError::Store(_) => ErrorKind::Store,
            CoreError::Config(_) => ErrorKind::Config,
            CoreError::Sdk(_) => ErrorKind::Sdk,
        }
    }

    /// Whether an invocation reports this error as a failed row instead of returning it
    pub fn is_captured(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnconfiguredPeers
                | ErrorKind::NoResponse
                | ErrorKind::InvocationInconsistency
                | ErrorKind::CommitTimeout
                | ErrorKind::CommitRejected
                | ErrorKind::Cancelled
                | ErrorKind::Sdk
        )
    }

    /// Peers blamed by this error, if any
    pub fn dissenters(&self) -> &[String] {
        match self {
            CoreError::InstallInconsistency { dissenters, .. }
            | CoreError::InvocationInconsistency { dissenters, .. } => dissenters,
            _ => &[],
        }
    }
}

/// Result type for orchestration operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerq_primitives::H256;

    #[test]
    fn test_unconfigured_peers_message() {
        let err = CoreError::UnconfiguredPeers("mycc".into());
        assert_eq!(
            err.to_string(),
            "Endorsing peer information not provided for chaincode mycc"
        );
        assert_eq!(err.kind(), ErrorKind::UnconfiguredPeers);
        assert!(err.is_captured());
    }

    #[test]
    fn test_inconsistency_lists_dissenters() {
        let err = CoreError::InvocationInconsistency {
            chaincode: "mycc".into(),
            dissenters: vec!["peer2".into(), "peer0".into()],
            sets: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("peer2, peer0"));
        assert!(msg.contains("2 consistency sets"));
        assert_eq!(err.dissenters().len(), 2);
    }

    #[test]
    fn test_commit_timeout_is_distinct_kind() {
        let err = CoreError::CommitTimeout {
            tx_id: TxId::new(H256::ZERO),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.kind(), ErrorKind::CommitTimeout);
        assert_ne!(err.kind(), ErrorKind::InvocationInconsistency);
        assert_ne!(err.kind(), ErrorKind::CommitRejected);
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_setup_errors_propagate() {
        assert!(!CoreError::Precondition("no identity".into()).is_captured());
        assert!(!CoreError::InvalidRequest("empty".into()).is_captured());
        assert!(!CoreError::Identity("x".into()).is_captured());
    }

    #[test]
    fn test_from_sdk_error() {
        let err: CoreError = SdkError::Transport("refused".into()).into();
        assert_eq!(err.kind(), ErrorKind::Sdk);
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_cancelled_message() {
        assert_eq!(CoreError::Cancelled.to_string(), "Invocation cancelled");
    }
}
