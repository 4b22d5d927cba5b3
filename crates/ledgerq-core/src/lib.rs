//! # ledgerq-core
//!
//! Transaction orchestration for permissioned ledger clients.
//!
//! ## Features
//!
//! - **Identity**: enrollment with a persistent credential store
//! - **Channels**: create or rediscover a channel and its peers
//! - **Lifecycle**: install and instantiate chaincode with consistency checks
//! - **Orchestrator**: endorse, validate, order and await commit for each invocation
//! - **Frames**: fixed-schema result rows for every operation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ledgerq_core::{MemoryCredentialStore, Session, SessionConfig};
//! use ledgerq_sdk::ClientContext;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::default().with_endorsers("mycc", ["peer0", "peer1"]);
//!     let mut session = Session::new(
//!         ClientContext::new_mock(),
//!         config,
//!         Arc::new(MemoryCredentialStore::new()),
//!     );
//!
//!     session.enroll("admin", "adminpw").await?;
//!     session.create_channel("mychannel")?;
//!
//!     let frame = session
//!         .invoke_chaincode("mycc", "move", vec!["a".into(), "b".into(), "10".into()])
//!         .await?;
//!     println!("success = {}", frame.all_success());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod commit;
pub mod config;
pub mod consistency;
pub mod endorsement;
mod error;
pub mod frame;
pub mod identity;
pub mod lifecycle;
pub mod orchestrator;
mod session;
pub mod store;

pub use channel::{ChannelHandle, ChannelManager, MembershipSource};
pub use commit::{await_commit, submit_and_wait, CommitOutcome, MISMATCHED_EVENT};
pub use config::{PeerConfig, SessionConfig};
pub use consistency::{partition, ConsistencySet, ConsistencySets};
pub use endorsement::collect_endorsements;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use frame::{Column, ColumnType, FrameBuilder, OperationKind, ResultFrame, ResultRow, Value};
pub use identity::{Identity, IdentityManager};
pub use lifecycle::{ChaincodeDescriptor, LifecycleManager, INSTALL_SUCCESS};
pub use orchestrator::{
    InvocationMode, InvocationReceipt, InvocationReport, InvocationRequest, InvocationState,
    Orchestrator,
};
pub use session::Session;
pub use store::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, SecretDigest, StoredCredential,
};
