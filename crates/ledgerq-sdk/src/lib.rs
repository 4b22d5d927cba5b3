//! # ledgerq-sdk
//!
//! Client-side contracts of a permissioned ledger network.
//!
//! ## Features
//!
//! - **ClientContext**: collaborators of one client and the channel objects it allocated
//! - **Peer / Orderer / CertificateAuthority**: object-safe network traits
//! - **SigningIdentity**: enrollment certificate plus private key
//! - **mock**: in-memory network for tests
//! - **http**: HTTP/JSON adapters (feature `http`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledgerq_sdk::{ChaincodeId, ClientContext, Proposal, ProposalKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ClientContext::new_mock();
//!     let identity = context.enroll("admin", "adminpw").await?;
//!
//!     let signed = Proposal::new(
//!         "mychannel",
//!         ProposalKind::Query,
//!         ChaincodeId::named("mycc"),
//!         identity.certificate(),
//!     )?
//!     .call("query", vec!["a".to_string()])
//!     .sign(&identity)?;
//!
//!     for peer in context.peers() {
//!         let response = peer.process_proposal(&signed).await?;
//!         println!("{}: {:?}", response.peer, response.status);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod authority;
mod client;
mod error;
#[cfg(feature = "http")]
pub mod http;
mod identity;
pub mod mock;
mod orderer;
mod peer;
pub mod types;

pub use authority::CertificateAuthority;
pub use client::{Channel, ClientContext};
pub use error::SdkError;
pub use identity::{Certificate, KeyPair, SigningIdentity};
pub use orderer::{CommitHandle, CommitSender, Orderer};
pub use peer::Peer;
pub use types::{
    ChaincodeId, EndorsedTransaction, EndorsementPolicy, EnrollmentRequest, Proposal,
    ProposalKind, ProposalResponse, ProposalStatus, SignedProposal, TransactionEvent,
};

#[cfg(feature = "http")]
pub use http::{HttpAuthority, HttpOrderer, HttpPeer};

// Re-export primitives for convenience
pub use ledgerq_primitives::{BlockNumber, TxId, H256};
