//! Subcommands and the session plumbing they share

pub mod chaincode;
pub mod channel;
pub mod enroll;

use std::sync::Arc;

use ledgerq_core::{CredentialStore, FileCredentialStore, MemoryCredentialStore, Session};
use ledgerq_sdk::mock::{MockAuthority, MockOrderer, MockPeer};
use ledgerq_sdk::ClientContext;
use tracing::debug;

use crate::config::{Config, NetworkMode};
use crate::CliError;

/// Build the client context for the configured network
pub fn connect(config: &Config) -> Result<ClientContext, CliError> {
    match config.network {
        NetworkMode::Mock => Ok(mock_network(config)),
        NetworkMode::Http => {
            let session = &config.session;
            let ca_url = session
                .ca_url
                .as_deref()
                .ok_or_else(|| CliError::Config("session.ca_url is required".to_string()))?;
            let orderer_url = session
                .orderer_url
                .as_deref()
                .ok_or_else(|| CliError::Config("session.orderer_url is required".to_string()))?;
            if session.peers.is_empty() {
                return Err(CliError::Config("no peers configured".to_string()));
            }
            Ok(ClientContext::connect_http(
                ca_url,
                orderer_url,
                session.peers.iter().map(|p| (p.name.clone(), p.url.clone())),
            ))
        }
    }
}

/// In-process network that knows the configured user and has every
/// configured peer joined to the configured channel
fn mock_network(config: &Config) -> ClientContext {
    let authority = MockAuthority::new("ca.ledgerq.mock").with_user(&config.user, &config.secret);
    let mut context = ClientContext::new(Arc::new(authority), Arc::new(MockOrderer::new()));

    let mut names: Vec<String> = config.session.peers.iter().map(|p| p.name.clone()).collect();
    if names.is_empty() {
        names = vec!["peer0".to_string(), "peer1".to_string()];
    }
    for name in names {
        let peer = MockPeer::new(name).with_channels([config.session.channel.as_str()]);
        context = context.with_peer(peer);
    }
    context
}

/// Session with no identity or channel yet
pub fn open_session(config: &Config) -> Result<Session, CliError> {
    let store: Arc<dyn CredentialStore> = match config.store_dir() {
        Some(dir) => {
            debug!("Credential store at {}", dir.display());
            Arc::new(FileCredentialStore::new(dir))
        }
        None => Arc::new(MemoryCredentialStore::new()),
    };
    Ok(Session::new(connect(config)?, config.session.clone(), store))
}

/// Session enrolled as the configured user and bound to the configured channel
pub async fn ready_session(config: &Config) -> Result<Session, CliError> {
    let mut session = open_session(config)?;
    session.enroll(&config.user, &config.secret).await?;
    session.reconstruct_channel(&config.session.channel).await?;
    Ok(session)
}
