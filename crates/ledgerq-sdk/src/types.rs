//! Wire types exchanged with peers and the ordering service

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use ledgerq_crypto::{sha256, sha256_concat, Signature};
use ledgerq_primitives::{BlockNumber, TxId, H256};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::identity::{Certificate, SigningIdentity};
use crate::SdkError;

/// Chaincode coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChaincodeId {
    /// Chaincode name
    pub name: String,
    /// Chaincode version (empty for invocations)
    #[serde(default)]
    pub version: String,
    /// Source path (empty for invocations)
    #[serde(default)]
    pub path: String,
}

impl ChaincodeId {
    /// Reference an already deployed chaincode by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            path: String::new(),
        }
    }

    /// Fully qualified chaincode
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
        }
    }
}

/// What a proposal asks the peers to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    /// Install a chaincode package on the peer
    Install,
    /// Activate an installed chaincode version on the channel
    Instantiate,
    /// Read-only chaincode call
    Query,
    /// State-mutating chaincode call
    Invoke,
}

impl ProposalKind {
    /// Whether a successful endorsement must be submitted for ordering
    pub fn requires_commit(&self) -> bool {
        matches!(self, ProposalKind::Instantiate | ProposalKind::Invoke)
    }
}

/// Which peers must endorse transactions of a chaincode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementPolicy {
    /// Number of endorsements required
    pub required: usize,
    /// Eligible peers; empty means every peer of the channel
    #[serde(default)]
    pub of: Vec<String>,
}

impl EndorsementPolicy {
    /// Any single channel peer suffices
    pub fn any() -> Self {
        Self {
            required: 1,
            of: Vec::new(),
        }
    }

    /// Every listed peer must endorse
    pub fn all_of(peers: Vec<String>) -> Self {
        Self {
            required: peers.len(),
            of: peers,
        }
    }

    /// `n` of the listed peers must endorse
    pub fn n_of(required: usize, peers: Vec<String>) -> Self {
        Self { required, of: peers }
    }

    /// Reject policies that can never be satisfied
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.required == 0 {
            return Err(SdkError::InvalidArgument(
                "endorsement policy requires at least one endorsement".to_string(),
            ));
        }
        if !self.of.is_empty() && self.required > self.of.len() {
            return Err(SdkError::InvalidArgument(format!(
                "endorsement policy requires {} of {} peers",
                self.required,
                self.of.len()
            )));
        }
        Ok(())
    }

    /// Check a set of endorsing peer names against the policy
    pub fn is_satisfied_by<'a>(&self, endorsers: impl IntoIterator<Item = &'a str>) -> bool {
        let count = endorsers
            .into_iter()
            .filter(|peer| self.of.is_empty() || self.of.iter().any(|p| p == peer))
            .count();
        count >= self.required
    }
}

impl Default for EndorsementPolicy {
    fn default() -> Self {
        Self::any()
    }
}

/// Proposal sent to endorsing peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Transaction id, derived from nonce and creator
    pub tx_id: TxId,
    /// Target channel
    pub channel: String,
    /// Operation kind
    pub kind: ProposalKind,
    /// Target chaincode
    pub chaincode: ChaincodeId,
    /// Function to call (init function for instantiate)
    #[serde(default)]
    pub function: String,
    /// String arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Install package contents
    #[serde(default)]
    pub package: Option<Bytes>,
    /// Endorsement policy (instantiate only)
    #[serde(default)]
    pub policy: Option<EndorsementPolicy>,
    /// Certificate of the submitting identity
    pub creator: Certificate,
    /// Random nonce, hex
    pub nonce: String,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl Proposal {
    /// Start a proposal for `creator`; the transaction id is sha256(nonce || certificate)
    pub fn new(
        channel: impl Into<String>,
        kind: ProposalKind,
        chaincode: ChaincodeId,
        creator: &Certificate,
    ) -> Result<Self, SdkError> {
        let mut nonce = [0u8; 24];
        OsRng.fill_bytes(&mut nonce);
        let creator_bytes = serde_json::to_vec(creator)?;
        let tx_id = TxId::new(sha256_concat(&[&nonce, &creator_bytes]));
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;

        Ok(Self {
            tx_id,
            channel: channel.into(),
            kind,
            chaincode,
            function: String::new(),
            args: Vec::new(),
            package: None,
            policy: None,
            creator: creator.clone(),
            nonce: hex::encode(nonce),
            timestamp,
        })
    }

    /// Set the function and arguments
    pub fn call(mut self, function: impl Into<String>, args: Vec<String>) -> Self {
        self.function = function.into();
        self.args = args;
        self
    }

    /// Attach an install package
    pub fn package(mut self, package: Bytes) -> Self {
        self.package = Some(package);
        self
    }

    /// Attach an endorsement policy
    pub fn policy(mut self, policy: EndorsementPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Digest that the creator signs
    pub fn digest(&self) -> Result<H256, SdkError> {
        Ok(sha256(&serde_json::to_vec(self)?))
    }

    /// Sign with the creator's identity
    pub fn sign(self, identity: &SigningIdentity) -> Result<SignedProposal, SdkError> {
        if identity.certificate() != &self.creator {
            return Err(SdkError::InvalidArgument(
                "proposal creator does not match signing identity".to_string(),
            ));
        }
        let signature = identity.sign_digest(&self.digest()?)?;
        Ok(SignedProposal {
            proposal: self,
            signature: signature.to_hex(),
        })
    }
}

/// Proposal plus the creator's signature over its digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    /// The proposal
    pub proposal: Proposal,
    /// Hex signature over [`Proposal::digest`]
    pub signature: String,
}

impl SignedProposal {
    /// Transaction id of the wrapped proposal
    pub fn tx_id(&self) -> TxId {
        self.proposal.tx_id
    }

    /// Check the signature against the creator certificate
    pub fn verify(&self) -> Result<bool, SdkError> {
        let signature = Signature::from_hex(&self.signature)?;
        self.proposal
            .creator
            .verify(&self.proposal.digest()?, &signature)
    }
}

/// Outcome reported by one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Simulation succeeded
    Success,
    /// Peer refused or simulation failed
    Failure,
    /// No answer within the proposal timeout
    TimedOut,
}

impl ProposalStatus {
    /// Status code folded into the payload digest
    pub fn code(&self) -> u16 {
        match self {
            ProposalStatus::Success => 200,
            ProposalStatus::Failure => 500,
            ProposalStatus::TimedOut => 504,
        }
    }
}

/// Response of a single peer to a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResponse {
    /// Name of the answering peer
    pub peer: String,
    /// Transaction id the response belongs to
    pub tx_id: TxId,
    /// Peer status
    pub status: ProposalStatus,
    /// Simulation result
    #[serde(default)]
    pub payload: Bytes,
    /// sha256(status code || payload); absent when the peer never answered
    pub payload_digest: Option<H256>,
    /// Peer message (error text on failure)
    #[serde(default)]
    pub message: String,
}

impl ProposalResponse {
    /// Successful simulation returning `payload`
    pub fn success(peer: impl Into<String>, tx_id: TxId, payload: Bytes) -> Self {
        Self::answered(peer.into(), tx_id, ProposalStatus::Success, payload, String::new())
    }

    /// Peer answered with a failure
    pub fn failure(peer: impl Into<String>, tx_id: TxId, message: impl Into<String>) -> Self {
        Self::answered(
            peer.into(),
            tx_id,
            ProposalStatus::Failure,
            Bytes::new(),
            message.into(),
        )
    }

    /// Peer never answered within `after`
    pub fn timed_out(peer: impl Into<String>, tx_id: TxId, after: Duration) -> Self {
        Self {
            peer: peer.into(),
            tx_id,
            status: ProposalStatus::TimedOut,
            payload: Bytes::new(),
            payload_digest: None,
            message: format!("no response within {:?}", after),
        }
    }

    fn answered(
        peer: String,
        tx_id: TxId,
        status: ProposalStatus,
        payload: Bytes,
        message: String,
    ) -> Self {
        let digest = sha256_concat(&[&status.code().to_be_bytes(), &payload]);
        Self {
            peer,
            tx_id,
            status,
            payload,
            payload_digest: Some(digest),
            message,
        }
    }

    /// Rebuild a response received from `peer` for transaction `tx_id`.
    ///
    /// The digest is recomputed from the status and payload, so whatever
    /// digest the peer reported is discarded. A response addressed to a
    /// different transaction, or a peer reporting its own timeout, becomes a
    /// failure.
    pub fn verified(self, peer: impl Into<String>, tx_id: TxId) -> Self {
        let peer = peer.into();
        if self.tx_id != tx_id {
            return Self::failure(
                peer,
                tx_id,
                format!("response for transaction {} instead of {}", self.tx_id, tx_id),
            );
        }
        match self.status {
            ProposalStatus::Success => {
                Self::answered(peer, tx_id, ProposalStatus::Success, self.payload, self.message)
            }
            ProposalStatus::Failure => Self::failure(peer, tx_id, self.message),
            ProposalStatus::TimedOut => {
                Self::failure(peer, tx_id, format!("peer reported timeout: {}", self.message))
            }
        }
    }

    /// Whether the peer endorsed the proposal
    pub fn is_success(&self) -> bool {
        self.status == ProposalStatus::Success
    }
}

/// Endorsed proposal submitted to the ordering service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsedTransaction {
    /// The signed proposal
    pub proposal: SignedProposal,
    /// Agreeing endorsements
    pub endorsements: Vec<ProposalResponse>,
}

impl EndorsedTransaction {
    /// Transaction id
    pub fn tx_id(&self) -> TxId {
        self.proposal.tx_id()
    }
}

/// Commit notification for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Transaction id
    pub tx_id: TxId,
    /// Whether validation accepted the transaction
    pub valid: bool,
    /// Validation code (`VALID`, `ENDORSEMENT_POLICY_FAILURE`, ...)
    pub validation_code: String,
    /// Block that contains the transaction
    pub block_number: BlockNumber,
}

/// Enrollment request sent to a certificate authority
#[derive(Clone, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    /// Enrollment id
    pub enrollment_id: String,
    /// Enrollment secret
    pub secret: String,
    /// Public key to certify, compressed SEC1 hex
    pub public_key: String,
}

impl std::fmt::Debug for EnrollmentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentRequest")
            .field("enrollment_id", &self.enrollment_id)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
