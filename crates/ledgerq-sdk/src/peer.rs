//! Endorsing peer contract

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::identity::Certificate;
use crate::types::{ProposalResponse, SignedProposal};
use crate::SdkError;

/// An endorsing peer (object-safe)
#[async_trait]
pub trait Peer: Send + Sync {
    /// Peer name, unique within a client context
    fn name(&self) -> &str;

    /// Simulate a signed proposal and return the peer's response.
    ///
    /// `Err` means the peer could not be reached; a peer that refuses the
    /// proposal answers `Ok` with a failure status.
    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, SdkError>;

    /// Names of the channels this peer has joined
    async fn query_channels(&self, requester: &Certificate) -> Result<BTreeSet<String>, SdkError>;
}
