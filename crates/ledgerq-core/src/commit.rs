//! Bounded wait for commit notifications

use std::time::Duration;

use ledgerq_primitives::TxId;
use ledgerq_sdk::{CommitHandle, EndorsedTransaction, Orderer, TransactionEvent};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

/// Validation code prefix for an event naming another transaction
pub const MISMATCHED_EVENT: &str = "MISMATCHED_EVENT";

/// Result of waiting for a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Committed as valid
    Committed(TransactionEvent),
    /// No notification within the bound; the transaction may still commit
    TimedOut(Duration),
    /// Committed but invalidated, with the validation code
    Rejected(String),
}

impl CommitOutcome {
    /// Turn a non-committed outcome into its error.
    ///
    /// A commit event for any transaction other than `tx_id` counts as a
    /// rejection.
    pub fn into_result(self, tx_id: TxId) -> CoreResult<TransactionEvent> {
        match self {
            CommitOutcome::Committed(event) if event.tx_id != tx_id => {
                Err(CoreError::CommitRejected {
                    tx_id,
                    code: format!("{} for transaction {}", MISMATCHED_EVENT, event.tx_id),
                })
            }
            CommitOutcome::Committed(event) => Ok(event),
            CommitOutcome::TimedOut(timeout) => Err(CoreError::CommitTimeout { tx_id, timeout }),
            CommitOutcome::Rejected(code) => Err(CoreError::CommitRejected { tx_id, code }),
        }
    }
}

/// Wait at most `timeout` for `handle` to resolve
pub async fn await_commit(handle: CommitHandle, timeout: Duration) -> CoreResult<CommitOutcome> {
    match tokio::time::timeout(timeout, handle.wait()).await {
        Err(_) => Ok(CommitOutcome::TimedOut(timeout)),
        Ok(event) => {
            let event = event?;
            if event.valid {
                Ok(CommitOutcome::Committed(event))
            } else {
                Ok(CommitOutcome::Rejected(event.validation_code))
            }
        }
    }
}

/// Broadcast `transaction` and wait for its commit
pub async fn submit_and_wait(
    orderer: &dyn Orderer,
    transaction: &EndorsedTransaction,
    timeout: Duration,
) -> CoreResult<TransactionEvent> {
    let tx_id = transaction.tx_id();
    let handle = orderer.broadcast(transaction).await?;
    let outcome = await_commit(handle, timeout).await?;
    match &outcome {
        CommitOutcome::Committed(event) => {
            info!("Transaction {} committed in block {}", tx_id, event.block_number)
        }
        CommitOutcome::TimedOut(after) => {
            warn!("Transaction {} not committed within {:?}", tx_id, after)
        }
        CommitOutcome::Rejected(code) => warn!("Transaction {} rejected: {}", tx_id, code),
    }
    outcome.into_result(tx_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ledgerq_primitives::H256;
    use ledgerq_sdk::SdkError;

    fn event(valid: bool, code: &str) -> TransactionEvent {
        TransactionEvent {
            tx_id: TxId::new(H256::ZERO),
            valid,
            validation_code: code.to_string(),
            block_number: 1,
        }
    }

    #[tokio::test]
    async fn test_committed() {
        let (sender, handle) = CommitHandle::channel();
        sender.deliver(event(true, "VALID"));
        let outcome = await_commit(handle, Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed(event(true, "VALID")));
    }

    #[tokio::test]
    async fn test_rejected() {
        let (sender, handle) = CommitHandle::channel();
        sender.deliver(event(false, "MVCC_READ_CONFLICT"));
        let outcome = await_commit(handle, Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Rejected("MVCC_READ_CONFLICT".into()));

        let err = outcome.into_result(TxId::new(H256::ZERO)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitRejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out() {
        let (_sender, handle) = CommitHandle::channel();
        let start = tokio::time::Instant::now();
        let outcome = await_commit(handle, Duration::from_secs(30)).await.unwrap();
        assert_eq!(outcome, CommitOutcome::TimedOut(Duration::from_secs(30)));
        assert!(start.elapsed() >= Duration::from_secs(30));

        let err = outcome.into_result(TxId::new(H256::ZERO)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitTimeout);
    }

    #[tokio::test]
    async fn test_event_for_other_transaction_is_rejected() {
        let (sender, handle) = CommitHandle::channel();
        sender.deliver(event(true, "VALID"));
        let outcome = await_commit(handle, Duration::from_secs(1)).await.unwrap();

        let submitted = TxId::new(H256::from_bytes([7u8; 32]));
        let err = outcome.into_result(submitted).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitRejected);
        assert!(err.to_string().contains(MISMATCHED_EVENT));
    }

    #[tokio::test]
    async fn test_matching_event_is_accepted() {
        let (sender, handle) = CommitHandle::channel();
        sender.deliver(event(true, "VALID"));
        let outcome = await_commit(handle, Duration::from_secs(1)).await.unwrap();
        let committed = outcome.into_result(TxId::new(H256::ZERO)).unwrap();
        assert_eq!(committed.block_number, 1);
    }

    #[tokio::test]
    async fn test_closed_notification() {
        let (sender, handle) = CommitHandle::channel();
        drop(sender);
        let err = await_commit(handle, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Sdk(SdkError::NotificationClosed)));
    }
}
