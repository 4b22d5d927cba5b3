//! Consistency Validator
//!
//! Groups proposal responses by payload digest. A single group of successful
//! responses means the peers agree.

use ledgerq_primitives::H256;
use ledgerq_sdk::ProposalResponse;

use crate::error::{CoreError, CoreResult};

/// Responses sharing one payload digest
#[derive(Debug, Clone)]
pub struct ConsistencySet {
    digest: Option<H256>,
    responses: Vec<ProposalResponse>,
}

impl ConsistencySet {
    /// Shared digest; `None` for peers that never answered
    pub fn digest(&self) -> Option<H256> {
        self.digest
    }

    /// Member responses in observation order
    pub fn responses(&self) -> &[ProposalResponse] {
        &self.responses
    }

    /// Member peer names in observation order
    pub fn peers(&self) -> Vec<&str> {
        self.responses.iter().map(|r| r.peer.as_str()).collect()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Whether every member reported success
    pub fn all_success(&self) -> bool {
        self.responses.iter().all(ProposalResponse::is_success)
    }
}

/// Partition of one invocation's responses
#[derive(Debug, Clone)]
pub struct ConsistencySets {
    sets: Vec<ConsistencySet>,
    observed: Vec<ProposalResponse>,
}

impl ConsistencySets {
    /// Sets in first-seen digest order
    pub fn sets(&self) -> &[ConsistencySet] {
        &self.sets
    }

    /// Number of sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Always false; an empty partition is a [`CoreError::NoResponse`]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Total number of responses
    pub fn response_count(&self) -> usize {
        self.observed.len()
    }

    /// One set spanning every response, all successful
    pub fn is_agreement(&self) -> bool {
        self.sets.len() == 1 && self.sets[0].all_success()
    }

    /// Largest set; the first seen among equally large ones
    pub fn largest(&self) -> &ConsistencySet {
        let mut best = &self.sets[0];
        for set in &self.sets[1..] {
            if set.len() > best.len() {
                best = set;
            }
        }
        best
    }

    /// Peers that failed or fall outside the largest set, in observation order
    pub fn dissenters(&self) -> Vec<String> {
        let largest = self.largest();
        self.observed
            .iter()
            .filter(|r| !r.is_success() || r.payload_digest != largest.digest)
            .map(|r| r.peer.clone())
            .collect()
    }

    /// First failure message, if any peer failed
    pub fn first_failure(&self) -> Option<&str> {
        self.observed
            .iter()
            .find(|r| !r.is_success())
            .map(|r| r.message.as_str())
    }
}

/// Group `responses` by payload digest.
///
/// Which peers end up together depends only on their digests, not on the
/// order responses arrived in.
pub fn partition(responses: Vec<ProposalResponse>) -> CoreResult<ConsistencySets> {
    if responses.is_empty() {
        return Err(CoreError::NoResponse("proposal".to_string()));
    }

    let mut sets: Vec<ConsistencySet> = Vec::new();
    for response in &responses {
        match sets.iter_mut().find(|s| s.digest == response.payload_digest) {
            Some(set) => set.responses.push(response.clone()),
            None => sets.push(ConsistencySet {
                digest: response.payload_digest,
                responses: vec![response.clone()],
            }),
        }
    }

    Ok(ConsistencySets {
        sets,
        observed: responses,
    })
}
