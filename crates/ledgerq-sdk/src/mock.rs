//! In-memory network collaborators for testing

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::authority::CertificateAuthority;
use crate::identity::Certificate;
use crate::orderer::{CommitHandle, CommitSender, Orderer};
use crate::peer::Peer;
use crate::types::{
    EndorsedTransaction, EnrollmentRequest, ProposalKind, ProposalResponse, SignedProposal,
    TransactionEvent,
};
use crate::SdkError;

/// How a [`MockPeer`] answers proposals
#[derive(Debug, Clone)]
pub enum PeerBehavior {
    /// Endorse with the given payload
    Endorse(Bytes),
    /// Answer with a failure status and message
    Reject(String),
    /// Fail at the transport level
    Unreachable(String),
    /// Never answer
    Silent,
    /// Wait, then behave as the inner behavior
    Delayed(Duration, Box<PeerBehavior>),
}

/// Mock endorsing peer
pub struct MockPeer {
    name: String,
    channels: Mutex<BTreeSet<String>>,
    behavior: Mutex<PeerBehavior>,
    installed: Mutex<HashSet<(String, String)>>,
    received: Mutex<Vec<SignedProposal>>,
}

impl MockPeer {
    /// Create a peer that endorses everything with an empty payload
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Mutex::new(BTreeSet::new()),
            behavior: Mutex::new(PeerBehavior::Endorse(Bytes::new())),
            installed: Mutex::new(HashSet::new()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Set the channels reported by channel discovery
    pub fn with_channels<I, S>(self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels
            .lock()
            .extend(channels.into_iter().map(Into::into));
        self
    }

    /// Set the proposal behavior
    pub fn with_behavior(self, behavior: PeerBehavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    /// Change the proposal behavior
    pub fn set_behavior(&self, behavior: PeerBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Join a channel
    pub fn join_channel(&self, name: impl Into<String>) {
        self.channels.lock().insert(name.into());
    }

    /// Proposals received so far
    pub fn received(&self) -> Vec<SignedProposal> {
        self.received.lock().clone()
    }

    /// Number of proposals received so far
    pub fn proposal_count(&self) -> usize {
        self.received.lock().len()
    }

    /// Whether `name:version` has been installed on this peer
    pub fn is_installed(&self, name: &str, version: &str) -> bool {
        self.installed
            .lock()
            .contains(&(name.to_string(), version.to_string()))
    }

    fn endorse(&self, signed: &SignedProposal, payload: Bytes) -> ProposalResponse {
        let proposal = &signed.proposal;
        if !signed.verify().unwrap_or(false) {
            return ProposalResponse::failure(
                &self.name,
                proposal.tx_id,
                "access denied: creator signature invalid",
            );
        }

        if proposal.kind == ProposalKind::Install {
            let key = (
                proposal.chaincode.name.clone(),
                proposal.chaincode.version.clone(),
            );
            if !self.installed.lock().insert(key) {
                return ProposalResponse::failure(
                    &self.name,
                    proposal.tx_id,
                    format!(
                        "chaincode {}:{} already installed",
                        proposal.chaincode.name, proposal.chaincode.version
                    ),
                );
            }
            return ProposalResponse::success(&self.name, proposal.tx_id, Bytes::new());
        }

        ProposalResponse::success(&self.name, proposal.tx_id, payload)
    }
}

impl std::fmt::Debug for MockPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPeer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Peer for MockPeer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, SdkError> {
        self.received.lock().push(proposal.clone());

        // Clone out of the lock; never hold it across an await
        let mut behavior = self.behavior.lock().clone();
        loop {
            match behavior {
                PeerBehavior::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    behavior = *inner;
                }
                PeerBehavior::Endorse(payload) => return Ok(self.endorse(proposal, payload)),
                PeerBehavior::Reject(message) => {
                    return Ok(ProposalResponse::failure(
                        &self.name,
                        proposal.tx_id(),
                        message,
                    ))
                }
                PeerBehavior::Unreachable(message) => return Err(SdkError::Transport(message)),
                PeerBehavior::Silent => return std::future::pending().await,
            }
        }
    }

    async fn query_channels(&self, _requester: &Certificate) -> Result<BTreeSet<String>, SdkError> {
        if let PeerBehavior::Unreachable(message) = &*self.behavior.lock() {
            return Err(SdkError::Transport(message.clone()));
        }
        Ok(self.channels.lock().clone())
    }
}

/// How a [`MockOrderer`] treats submitted transactions
#[derive(Debug, Clone)]
pub enum CommitBehavior {
    /// Commit immediately as valid
    Commit,
    /// Deliver an invalid event with the given validation code
    Invalidate(String),
    /// Accept, but hold the notification until [`MockOrderer::release_held`]
    Hold,
    /// Refuse the broadcast at the transport level
    Unavailable(String),
}

/// Mock ordering service
pub struct MockOrderer {
    behavior: Mutex<CommitBehavior>,
    submitted: Mutex<Vec<EndorsedTransaction>>,
    held: Mutex<Vec<(CommitSender, TransactionEvent)>>,
    height: AtomicU64,
}

impl MockOrderer {
    /// Create an orderer that commits everything
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(CommitBehavior::Commit),
            submitted: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
            height: AtomicU64::new(0),
        }
    }

    /// Set the commit behavior
    pub fn with_behavior(self, behavior: CommitBehavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    /// Change the commit behavior
    pub fn set_behavior(&self, behavior: CommitBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Transactions submitted so far
    pub fn submitted(&self) -> Vec<EndorsedTransaction> {
        self.submitted.lock().clone()
    }

    /// Commit every held transaction; returns how many notifications found a listener
    pub fn release_held(&self) -> usize {
        let held: Vec<_> = self.held.lock().drain(..).collect();
        held.into_iter()
            .map(|(sender, event)| sender.deliver(event))
            .filter(|delivered| *delivered)
            .count()
    }

    fn next_event(
        &self,
        transaction: &EndorsedTransaction,
        valid: bool,
        code: &str,
    ) -> TransactionEvent {
        TransactionEvent {
            tx_id: transaction.tx_id(),
            valid,
            validation_code: code.to_string(),
            block_number: self.height.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

impl Default for MockOrderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Orderer for MockOrderer {
    async fn broadcast(&self, transaction: &EndorsedTransaction) -> Result<CommitHandle, SdkError> {
        let behavior = self.behavior.lock().clone();
        if let CommitBehavior::Unavailable(message) = &behavior {
            return Err(SdkError::Transport(message.clone()));
        }
        self.submitted.lock().push(transaction.clone());

        let (sender, handle) = CommitHandle::channel();
        match behavior {
            CommitBehavior::Commit => {
                sender.deliver(self.next_event(transaction, true, "VALID"));
            }
            CommitBehavior::Invalidate(code) => {
                sender.deliver(self.next_event(transaction, false, &code));
            }
            CommitBehavior::Hold => {
                let event = self.next_event(transaction, true, "VALID");
                self.held.lock().push((sender, event));
            }
            // Rejected before submission
            CommitBehavior::Unavailable(_) => {}
        }
        Ok(handle)
    }
}

/// Mock certificate authority
pub struct MockAuthority {
    issuer: String,
    users: Mutex<HashMap<String, String>>,
    reachable: AtomicBool,
    issued: AtomicU64,
}

impl MockAuthority {
    /// Create an authority with no registered users
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            users: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            issued: AtomicU64::new(0),
        }
    }

    /// Register an enrollment id/secret pair
    pub fn with_user(self, enrollment_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.register(enrollment_id, secret);
        self
    }

    /// Register an enrollment id/secret pair
    pub fn register(&self, enrollment_id: impl Into<String>, secret: impl Into<String>) {
        self.users.lock().insert(enrollment_id.into(), secret.into());
    }

    /// Simulate the authority going offline
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of certificates issued so far
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateAuthority for MockAuthority {
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<Certificate, SdkError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(SdkError::Transport(format!("{} unreachable", self.issuer)));
        }

        let authorized = self
            .users
            .lock()
            .get(&request.enrollment_id)
            .map(|secret| secret == &request.secret)
            .unwrap_or(false);
        if !authorized {
            return Err(SdkError::Enrollment(format!(
                "authentication failure for {}",
                request.enrollment_id
            )));
        }

        ledgerq_crypto::public_key_from_hex(&request.public_key)
            .map_err(|e| SdkError::InvalidArgument(e.to_string()))?;

        Ok(Certificate {
            subject: request.enrollment_id.clone(),
            public_key: request.public_key.clone(),
            issuer: self.issuer.clone(),
            serial: self.issued.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}
