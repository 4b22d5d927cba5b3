//! Ordering service contract and commit notifications

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::types::{EndorsedTransaction, TransactionEvent};
use crate::SdkError;

/// Ordering service (object-safe)
#[async_trait]
pub trait Orderer: Send + Sync {
    /// Submit an endorsed transaction.
    ///
    /// Returns once the orderer accepted the envelope; the handle resolves
    /// when the transaction is committed (or invalidated) network-wide.
    async fn broadcast(&self, transaction: &EndorsedTransaction) -> Result<CommitHandle, SdkError>;
}

/// Producer side of a commit notification
#[derive(Debug)]
pub struct CommitSender(oneshot::Sender<TransactionEvent>);

impl CommitSender {
    /// Deliver the event. Returns false if nobody is waiting any more.
    pub fn deliver(self, event: TransactionEvent) -> bool {
        self.0.send(event).is_ok()
    }

    /// Resolves once the handle has been dropped
    pub async fn closed(&mut self) {
        self.0.closed().await
    }

    /// Deliver the result of `fetch`, giving up as soon as the handle is
    /// dropped. A failed fetch drops the sender, which closes the handle.
    pub async fn relay<F>(mut self, fetch: F)
    where
        F: Future<Output = Result<TransactionEvent, SdkError>>,
    {
        let fetched = tokio::select! {
            _ = self.closed() => None,
            result = fetch => Some(result),
        };
        match fetched {
            Some(Ok(event)) => {
                self.deliver(event);
            }
            Some(Err(e)) => tracing::warn!(error = %e, "commit event polling failed"),
            None => tracing::debug!("commit handle dropped, no longer waiting for event"),
        }
    }
}

/// One-shot handle on the commit notification of a submitted transaction
#[derive(Debug)]
pub struct CommitHandle(oneshot::Receiver<TransactionEvent>);

impl CommitHandle {
    /// Create a connected sender/handle pair
    pub fn channel() -> (CommitSender, CommitHandle) {
        let (tx, rx) = oneshot::channel();
        (CommitSender(tx), CommitHandle(rx))
    }

    /// Wait for the event. Unbounded; callers put their own timeout around it.
    pub async fn wait(self) -> Result<TransactionEvent, SdkError> {
        self.0.await.map_err(|_| SdkError::NotificationClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerq_primitives::{TxId, H256};

    fn event() -> TransactionEvent {
        TransactionEvent {
            tx_id: TxId::new(H256::ZERO),
            valid: true,
            validation_code: "VALID".into(),
            block_number: 3,
        }
    }

    #[tokio::test]
    async fn test_commit_handle_delivers() {
        let (sender, handle) = CommitHandle::channel();
        assert!(sender.deliver(event()));
        assert_eq!(handle.wait().await.unwrap(), event());
    }

    #[tokio::test]
    async fn test_commit_handle_dropped_sender() {
        let (sender, handle) = CommitHandle::channel();
        drop(sender);
        assert!(matches!(handle.wait().await, Err(SdkError::NotificationClosed)));
    }

    #[tokio::test]
    async fn test_relay_delivers_fetched_event() {
        let (sender, handle) = CommitHandle::channel();
        sender.relay(async { Ok(event()) }).await;
        assert_eq!(handle.wait().await.unwrap(), event());
    }

    #[tokio::test]
    async fn test_relay_failure_closes_handle() {
        let (sender, handle) = CommitHandle::channel();
        sender
            .relay(async { Err(SdkError::Transport("connection reset".into())) })
            .await;
        assert!(matches!(handle.wait().await, Err(SdkError::NotificationClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_stops_when_handle_dropped() {
        let (sender, handle) = CommitHandle::channel();
        let relay = tokio::spawn(sender.relay(std::future::pending()));

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert!(!relay.is_finished());

        drop(handle);
        tokio::time::timeout(std::time::Duration::from_secs(1), relay)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_deliver_after_handle_dropped() {
        let (sender, handle) = CommitHandle::channel();
        drop(handle);
        assert!(!sender.deliver(event()));
    }
}
