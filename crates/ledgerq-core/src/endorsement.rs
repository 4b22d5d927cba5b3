//! Endorsement fan-out/fan-in barrier

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use ledgerq_sdk::{Peer, ProposalResponse, SignedProposal};
use tracing::{debug, warn};

/// Send `proposal` to every peer concurrently and wait for all of them.
///
/// Each peer gets `timeout` to answer. Transport failures become failure
/// responses and silent peers become [`ProposalResponse::timed_out`], so the
/// result holds exactly one response per peer, in arrival order. Answers are
/// passed through [`ProposalResponse::verified`]; digests are never taken
/// from the wire.
pub async fn collect_endorsements(
    peers: &[Arc<dyn Peer>],
    proposal: &SignedProposal,
    timeout: Duration,
) -> Vec<ProposalResponse> {
    let tx_id = proposal.tx_id();
    let mut pending: FuturesUnordered<_> = peers
        .iter()
        .map(|peer| async move {
            let name = peer.name().to_string();
            match tokio::time::timeout(timeout, peer.process_proposal(proposal)).await {
                Ok(Ok(response)) => response.verified(name, tx_id),
                Ok(Err(e)) => {
                    warn!("Peer {} failed: {}", name, e);
                    ProposalResponse::failure(name, tx_id, e.to_string())
                }
                Err(_) => {
                    warn!("Peer {} timed out after {:?}", name, timeout);
                    ProposalResponse::timed_out(name, tx_id, timeout)
                }
            }
        })
        .collect();

    let mut responses = Vec::with_capacity(peers.len());
    while let Some(response) = pending.next().await {
        debug!(
            peer = %response.peer,
            status = ?response.status,
            digest = ?response.payload_digest.map(|d| d.short()),
            "proposal response"
        );
        responses.push(response);
    }
    responses
}
