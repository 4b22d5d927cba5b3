//! Transaction Orchestrator
//!
//! Drives one invocation through
//! `BuildProposal -> SendToPeers -> ValidateConsistency -> (Done | Submit -> AwaitCommit -> Done)`.
//! Failures are terminal and never retried.

use bytes::Bytes;
use ledgerq_primitives::TxId;
use ledgerq_sdk::{
    ChaincodeId, EndorsedTransaction, Orderer, Proposal, ProposalKind, ProposalResponse,
    SigningIdentity, TransactionEvent,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ChannelHandle;
use crate::commit::await_commit;
use crate::config::SessionConfig;
use crate::consistency::partition;
use crate::endorsement::collect_endorsements;
use crate::error::{CoreError, CoreResult};

/// Read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Read-only; no ordering or commit
    Query,
    /// State-mutating; ordered and awaited
    Invoke,
}

impl InvocationMode {
    fn proposal_kind(&self) -> ProposalKind {
        match self {
            InvocationMode::Query => ProposalKind::Query,
            InvocationMode::Invoke => ProposalKind::Invoke,
        }
    }
}

/// One chaincode call
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Target chaincode
    pub chaincode: String,
    /// Function name
    pub function: String,
    /// String arguments
    pub args: Vec<String>,
    /// Read or write
    pub mode: InvocationMode,
    /// Report one row per peer instead of one aggregate row
    pub per_peer_detail: bool,
    /// Caller-level cancellation
    pub cancel: Option<CancellationToken>,
}

impl InvocationRequest {
    /// State-mutating call
    pub fn invoke(
        chaincode: impl Into<String>,
        function: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            chaincode: chaincode.into(),
            function: function.into(),
            args,
            mode: InvocationMode::Invoke,
            per_peer_detail: false,
            cancel: None,
        }
    }

    /// Read-only call
    pub fn query(
        chaincode: impl Into<String>,
        function: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            mode: InvocationMode::Query,
            ..Self::invoke(chaincode, function, args)
        }
    }

    /// Request per-peer rows
    pub fn with_per_peer_detail(mut self) -> Self {
        self.per_peer_detail = true;
        self
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Reject malformed requests
    pub fn validate(&self) -> CoreResult<()> {
        if self.chaincode.is_empty() {
            return Err(CoreError::InvalidRequest("chaincode name is empty".to_string()));
        }
        if self.function.is_empty() {
            return Err(CoreError::InvalidRequest("function name is empty".to_string()));
        }
        Ok(())
    }
}

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// Resolving endorsers and signing the proposal
    BuildProposal,
    /// Waiting on the endorsement barrier
    SendToPeers,
    /// Partitioning responses
    ValidateConsistency,
    /// Broadcasting to the ordering service
    Submit,
    /// Waiting for the commit notification
    AwaitCommit,
    /// Finished successfully
    Done,
}

/// Successful invocation
#[derive(Debug, Clone)]
pub struct InvocationReceipt {
    /// Transaction id
    pub tx_id: TxId,
    /// Agreed payload
    pub payload: Bytes,
    /// Commit event (writes only)
    pub event: Option<TransactionEvent>,
}

/// Everything observed during one invocation, successful or not
#[derive(Debug)]
pub struct InvocationReport {
    chaincode: String,
    tx_id: Option<TxId>,
    responses: Vec<ProposalResponse>,
    state: InvocationState,
    outcome: CoreResult<InvocationReceipt>,
}

impl InvocationReport {
    /// Target chaincode
    pub fn chaincode(&self) -> &str {
        &self.chaincode
    }

    /// Transaction id, once a proposal was built
    pub fn tx_id(&self) -> Option<TxId> {
        self.tx_id
    }

    /// Peer responses in arrival order
    pub fn responses(&self) -> &[ProposalResponse] {
        &self.responses
    }

    /// Last state reached
    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Final outcome
    pub fn outcome(&self) -> &CoreResult<InvocationReceipt> {
        &self.outcome
    }

    /// Consume into the outcome
    pub fn into_result(self) -> CoreResult<InvocationReceipt> {
        self.outcome
    }
}

struct Progress {
    tx_id: Option<TxId>,
    responses: Vec<ProposalResponse>,
    state: InvocationState,
}

impl Progress {
    fn enter(&mut self, state: InvocationState) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

/// Runs invocations on one channel for one identity.
///
/// All proposal and response state is local to each call, so concurrent
/// invocations never observe each other.
pub struct Orchestrator<'a> {
    channel: &'a ChannelHandle,
    signer: &'a SigningIdentity,
    orderer: &'a dyn Orderer,
    config: &'a SessionConfig,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator
    pub fn new(
        channel: &'a ChannelHandle,
        signer: &'a SigningIdentity,
        orderer: &'a dyn Orderer,
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            channel,
            signer,
            orderer,
            config,
        }
    }

    /// Run the invocation and return its receipt
    pub async fn execute(&self, request: &InvocationRequest) -> CoreResult<InvocationReceipt> {
        self.run(request).await.into_result()
    }

    /// Run the invocation and report everything observed
    #[tracing::instrument(
        name = "invocation",
        skip(self, request),
        fields(chaincode = %request.chaincode, function = %request.function, mode = ?request.mode)
    )]
    pub async fn run(&self, request: &InvocationRequest) -> InvocationReport {
        let mut progress = Progress {
            tx_id: None,
            responses: Vec::new(),
            state: InvocationState::BuildProposal,
        };

        let outcome = match &request.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(CoreError::Cancelled),
                    outcome = self.drive(request, &mut progress) => outcome,
                }
            }
            None => self.drive(request, &mut progress).await,
        };

        match &outcome {
            Ok(receipt) => info!("Invocation {} succeeded", receipt.tx_id),
            Err(e) => warn!("Invocation failed in {:?}: {}", progress.state, e),
        }

        InvocationReport {
            chaincode: request.chaincode.clone(),
            tx_id: progress.tx_id,
            responses: progress.responses,
            state: progress.state,
            outcome,
        }
    }

    async fn drive(
        &self,
        request: &InvocationRequest,
        progress: &mut Progress,
    ) -> CoreResult<InvocationReceipt> {
        request.validate()?;

        let endorsers = self
            .channel
            .select(self.config.endorsers_for(&request.chaincode));
        if endorsers.is_empty() {
            return Err(CoreError::UnconfiguredPeers(request.chaincode.clone()));
        }

        let signed = Proposal::new(
            self.channel.name(),
            request.mode.proposal_kind(),
            ChaincodeId::named(&request.chaincode),
            self.signer.certificate(),
        )?
        .call(&request.function, request.args.clone())
        .sign(self.signer)?;
        let tx_id = signed.tx_id();
        progress.tx_id = Some(tx_id);

        progress.enter(InvocationState::SendToPeers);
        let responses =
            collect_endorsements(&endorsers, &signed, self.config.proposal_timeout).await;
        progress.responses = responses.clone();

        progress.enter(InvocationState::ValidateConsistency);
        let sets = partition(responses)?;
        if !sets.is_agreement() {
            return Err(CoreError::InvocationInconsistency {
                chaincode: request.chaincode.clone(),
                dissenters: sets.dissenters(),
                sets: sets.len(),
            });
        }
        let endorsements = sets.largest().responses().to_vec();
        let payload = endorsements
            .first()
            .map(|r| r.payload.clone())
            .unwrap_or_default();

        if !request.mode.proposal_kind().requires_commit() {
            progress.enter(InvocationState::Done);
            return Ok(InvocationReceipt {
                tx_id,
                payload,
                event: None,
            });
        }

        progress.enter(InvocationState::Submit);
        let handle = self
            .orderer
            .broadcast(&EndorsedTransaction {
                proposal: signed,
                endorsements,
            })
            .await?;

        progress.enter(InvocationState::AwaitCommit);
        let event = await_commit(handle, self.config.commit_timeout)
            .await?
            .into_result(tx_id)?;

        progress.enter(InvocationState::Done);
        Ok(InvocationReceipt {
            tx_id,
            payload,
            event: Some(event),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelManager;
    use crate::error::ErrorKind;
    use ledgerq_sdk::mock::{CommitBehavior, MockAuthority, MockOrderer, MockPeer, PeerBehavior};
    use ledgerq_sdk::{ClientContext, Peer as _};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        context: ClientContext,
        signer: SigningIdentity,
        channel: ChannelHandle,
        orderer: Arc<MockOrderer>,
        peers: Vec<Arc<MockPeer>>,
        config: SessionConfig,
    }

    impl Fixture {
        fn orchestrator(&self) -> Orchestrator<'_> {
            Orchestrator::new(
                &self.channel,
                &self.signer,
                self.context.orderer().as_ref(),
                &self.config,
            )
        }
    }

    async fn fixture(behaviors: Vec<PeerBehavior>) -> Fixture {
        let orderer = Arc::new(MockOrderer::new());
        let mut context = ClientContext::new(
            Arc::new(MockAuthority::new("ca").with_user("admin", "adminpw")),
            orderer.clone(),
        );
        let mut peers = Vec::new();
        for (i, behavior) in behaviors.into_iter().enumerate() {
            let peer = Arc::new(MockPeer::new(format!("peer{}", i)).with_behavior(behavior));
            context = context.with_shared_peer(peer.clone());
            peers.push(peer);
        }
        let names: Vec<String> = peers.iter().map(|p| p.name().to_string()).collect();
        let config = SessionConfig {
            proposal_timeout: Duration::from_secs(2),
            commit_timeout: Duration::from_secs(30),
            ..SessionConfig::default()
        }
        .with_endorsers("mycc", names);

        let signer = context.enroll("admin", "adminpw").await.unwrap();
        let channel = ChannelManager::new(&context).create_channel("mychannel").unwrap();
        Fixture {
            context,
            signer,
            channel,
            orderer,
            peers,
            config,
        }
    }

    fn endorse(payload: &'static [u8]) -> PeerBehavior {
        PeerBehavior::Endorse(Bytes::from_static(payload))
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let f = fixture(vec![endorse(b"90"), endorse(b"90")]).await;
        let request =
            InvocationRequest::invoke("mycc", "move", vec!["a".into(), "b".into(), "10".into()]);
        let report = f.orchestrator().run(&request).await;

        assert_eq!(report.state(), InvocationState::Done);
        let receipt = report.outcome().as_ref().unwrap();
        assert_eq!(receipt.payload.as_ref(), b"90");
        assert!(receipt.event.as_ref().unwrap().valid);
        assert_eq!(report.tx_id(), Some(receipt.tx_id));
        assert_eq!(f.orderer.submitted().len(), 1);
        assert_eq!(f.orderer.submitted()[0].endorsements.len(), 2);
    }

    #[tokio::test]
    async fn test_query_skips_ordering() {
        let f = fixture(vec![endorse(b"100"), endorse(b"100")]).await;
        let receipt = f
            .orchestrator()
            .execute(&InvocationRequest::query("mycc", "query", vec!["a".into()]))
            .await
            .unwrap();
        assert_eq!(receipt.payload.as_ref(), b"100");
        assert!(receipt.event.is_none());
        assert!(f.orderer.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_chaincode_sends_nothing() {
        let f = fixture(vec![endorse(b"1")]).await;
        let report = f
            .orchestrator()
            .run(&InvocationRequest::invoke("othercc", "move", vec![]))
            .await;

        let err = report.outcome().as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnconfiguredPeers);
        assert!(report.tx_id().is_none());
        assert_eq!(report.state(), InvocationState::BuildProposal);
        assert_eq!(f.peers[0].proposal_count(), 0);
    }

    #[tokio::test]
    async fn test_divergent_peers() {
        let f = fixture(vec![endorse(b"100"), endorse(b"100"), endorse(b"90")]).await;
        let report = f
            .orchestrator()
            .run(&InvocationRequest::invoke("mycc", "move", vec![]))
            .await;

        match report.outcome() {
            Err(CoreError::InvocationInconsistency { dissenters, sets, .. }) => {
                assert_eq!(dissenters, &vec!["peer2".to_string()]);
                assert_eq!(*sets, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(report.responses().len(), 3);
        assert!(f.orderer.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_failing_peer_fails_invocation() {
        let f = fixture(vec![endorse(b"1"), PeerBehavior::Reject("chaincode error".into())]).await;
        let err = f
            .orchestrator()
            .execute(&InvocationRequest::invoke("mycc", "move", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvocationInconsistency);
        assert!(err.dissenters().contains(&"peer1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_dissents() {
        let f = fixture(vec![endorse(b"1"), endorse(b"1"), PeerBehavior::Silent]).await;
        let report = f
            .orchestrator()
            .run(&InvocationRequest::invoke("mycc", "move", vec![]))
            .await;
        let err = report.outcome().as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvocationInconsistency);
        assert_eq!(err.dissenters(), ["peer2".to_string()]);
        assert_eq!(report.responses().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_timeout() {
        let f = fixture(vec![endorse(b"1"), endorse(b"1")]).await;
        f.orderer.set_behavior(CommitBehavior::Hold);
        let report = f
            .orchestrator()
            .run(&InvocationRequest::invoke("mycc", "move", vec![]))
            .await;

        let err = report.outcome().as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitTimeout);
        assert_ne!(err.kind(), ErrorKind::InvocationInconsistency);
        assert_eq!(report.state(), InvocationState::AwaitCommit);
    }

    #[tokio::test]
    async fn test_commit_rejected() {
        let f = fixture(vec![endorse(b"1")]).await;
        f.orderer
            .set_behavior(CommitBehavior::Invalidate("ENDORSEMENT_POLICY_FAILURE".into()));
        let err = f
            .orchestrator()
            .execute(&InvocationRequest::invoke("mycc", "move", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitRejected);
        assert!(err.to_string().contains("ENDORSEMENT_POLICY_FAILURE"));
    }

    #[tokio::test]
    async fn test_orderer_unavailable_is_captured() {
        let f = fixture(vec![endorse(b"1")]).await;
        f.orderer
            .set_behavior(CommitBehavior::Unavailable("no leader".into()));
        let err = f
            .orchestrator()
            .execute(&InvocationRequest::invoke("mycc", "move", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sdk);
        assert!(err.is_captured());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_commit_wait() {
        let f = fixture(vec![endorse(b"1")]).await;
        f.orderer.set_behavior(CommitBehavior::Hold);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let report = f
            .orchestrator()
            .run(&InvocationRequest::invoke("mycc", "move", vec![]).with_cancellation(token))
            .await;
        assert!(matches!(report.outcome(), Err(CoreError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_malformed_request() {
        let f = fixture(vec![endorse(b"1")]).await;
        let err = f
            .orchestrator()
            .execute(&InvocationRequest::invoke("mycc", "", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_isolated() {
        let f = fixture(vec![endorse(b"7"), endorse(b"7")]).await;
        let orchestrator = f.orchestrator();
        let a = InvocationRequest::invoke("mycc", "move", vec!["a".into()]);
        let b = InvocationRequest::invoke("mycc", "move", vec!["b".into()]);
        let (ra, rb) = tokio::join!(orchestrator.run(&a), orchestrator.run(&b));

        assert_ne!(ra.tx_id(), rb.tx_id());
        for report in [&ra, &rb] {
            assert!(report.outcome().is_ok());
            assert!(report.responses().iter().all(|r| Some(r.tx_id) == report.tx_id()));
        }
    }
}
