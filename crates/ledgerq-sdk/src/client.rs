//! ClientContext - entry point to a ledger network

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::authority::CertificateAuthority;
use crate::identity::{KeyPair, SigningIdentity};
use crate::mock::{MockAuthority, MockOrderer, MockPeer};
use crate::orderer::Orderer;
use crate::peer::Peer;
use crate::types::EnrollmentRequest;
use crate::SdkError;

#[cfg(feature = "http")]
use crate::http::{HttpAuthority, HttpOrderer, HttpPeer};

/// Handle on the network collaborators of one client.
///
/// Owns the certificate authority, the ordering service and the known peers,
/// and tracks which channel objects have been allocated locally.
pub struct ClientContext {
    authority: Arc<dyn CertificateAuthority>,
    orderer: Arc<dyn Orderer>,
    peers: Vec<Arc<dyn Peer>>,
    channels: Mutex<HashSet<String>>,
}

impl ClientContext {
    /// Create a context from its collaborators
    pub fn new(authority: Arc<dyn CertificateAuthority>, orderer: Arc<dyn Orderer>) -> Self {
        Self {
            authority,
            orderer,
            peers: Vec::new(),
            channels: Mutex::new(HashSet::new()),
        }
    }

    /// Connect to an HTTP/JSON network
    #[cfg(feature = "http")]
    pub fn connect_http<I, N, U>(authority_url: &str, orderer_url: &str, peers: I) -> Self
    where
        I: IntoIterator<Item = (N, U)>,
        N: Into<String>,
        U: AsRef<str>,
    {
        let mut context = Self::new(
            Arc::new(HttpAuthority::new(authority_url)),
            Arc::new(HttpOrderer::new(orderer_url)),
        );
        for (name, url) in peers {
            context = context.with_peer(HttpPeer::new(name, url.as_ref()));
        }
        context
    }

    /// In-memory network with a `ca.mock` authority (user `admin`/`adminpw`),
    /// an orderer that commits everything, and peers `peer0` and `peer1`
    pub fn new_mock() -> Self {
        Self::new(
            Arc::new(MockAuthority::new("ca.mock").with_user("admin", "adminpw")),
            Arc::new(MockOrderer::new()),
        )
        .with_peer(MockPeer::new("peer0"))
        .with_peer(MockPeer::new("peer1"))
    }

    /// Register a peer
    pub fn with_peer(self, peer: impl Peer + 'static) -> Self {
        self.with_shared_peer(Arc::new(peer))
    }

    /// Register a peer the caller keeps a handle on; replaces a peer of the same name
    pub fn with_shared_peer(mut self, peer: Arc<dyn Peer>) -> Self {
        self.peers.retain(|p| p.name() != peer.name());
        self.peers.push(peer);
        self
    }

    /// All known peers, in registration order
    pub fn peers(&self) -> &[Arc<dyn Peer>] {
        &self.peers
    }

    /// Look up a peer by name
    pub fn peer(&self, name: &str) -> Option<Arc<dyn Peer>> {
        self.peers.iter().find(|p| p.name() == name).cloned()
    }

    /// The certificate authority
    pub fn authority(&self) -> &Arc<dyn CertificateAuthority> {
        &self.authority
    }

    /// The ordering service
    pub fn orderer(&self) -> &Arc<dyn Orderer> {
        &self.orderer
    }

    /// Enroll with the certificate authority using a freshly generated key pair
    pub async fn enroll(
        &self,
        enrollment_id: &str,
        secret: &str,
    ) -> Result<SigningIdentity, SdkError> {
        let keys = KeyPair::generate();
        let request = EnrollmentRequest {
            enrollment_id: enrollment_id.to_string(),
            secret: secret.to_string(),
            public_key: keys.public_key_hex(),
        };
        let certificate = self.authority.enroll(&request).await?;
        SigningIdentity::new(certificate, keys)
    }

    /// Allocate a new channel object. Fails if `name` is already allocated.
    pub fn new_channel(&self, name: &str) -> Result<Channel, SdkError> {
        if name.is_empty() {
            return Err(SdkError::InvalidArgument("channel name is empty".to_string()));
        }
        if !self.channels.lock().insert(name.to_string()) {
            return Err(SdkError::ChannelExists(name.to_string()));
        }
        Ok(Channel::new(name))
    }

    /// Channel object for `name`, allocating it if needed
    pub fn channel_or_new(&self, name: &str) -> Result<Channel, SdkError> {
        if name.is_empty() {
            return Err(SdkError::InvalidArgument("channel name is empty".to_string()));
        }
        self.channels.lock().insert(name.to_string());
        Ok(Channel::new(name))
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let peers: Vec<&str> = self.peers.iter().map(|p| p.name()).collect();
        f.debug_struct("ClientContext")
            .field("peers", &peers)
            .field("channels", &*self.channels.lock())
            .finish_non_exhaustive()
    }
}

/// Channel object: a name plus the peers proposals are sent to
#[derive(Clone)]
pub struct Channel {
    name: String,
    peers: Vec<Arc<dyn Peer>>,
}

impl Channel {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            peers: Vec::new(),
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a peer; a peer with the same name is only added once
    pub fn add_peer(&mut self, peer: Arc<dyn Peer>) {
        if !self.peers.iter().any(|p| p.name() == peer.name()) {
            self.peers.push(peer);
        }
    }

    /// Peers in the order they were added
    pub fn peers(&self) -> &[Arc<dyn Peer>] {
        &self.peers
    }

    /// Names of the peers in the order they were added
    pub fn peer_names(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.name().to_string()).collect()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("peers", &self.peer_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_context_enroll() {
        let context = ClientContext::new_mock();
        let identity = context.enroll("admin", "adminpw").await.unwrap();
        assert_eq!(identity.subject(), "admin");
        assert_eq!(identity.certificate().issuer, "ca.mock");
    }

    #[tokio::test]
    async fn test_mock_context_enroll_rejected() {
        let context = ClientContext::new_mock();
        let result = context.enroll("admin", "wrong").await;
        assert!(matches!(result, Err(SdkError::Enrollment(_))));
    }

    #[test]
    fn test_new_channel_only_once() {
        let context = ClientContext::new_mock();
        let channel = context.new_channel("mychannel").unwrap();
        assert_eq!(channel.name(), "mychannel");
        assert!(matches!(
            context.new_channel("mychannel"),
            Err(SdkError::ChannelExists(_))
        ));
    }

    #[test]
    fn test_channel_or_new_is_idempotent() {
        let context = ClientContext::new_mock();
        context.new_channel("a").unwrap();
        assert!(context.channel_or_new("a").is_ok());
        assert!(context.channel_or_new("b").is_ok());
        assert!(matches!(
            context.new_channel("b"),
            Err(SdkError::ChannelExists(_))
        ));
    }

    #[test]
    fn test_empty_channel_name_rejected() {
        let context = ClientContext::new_mock();
        assert!(matches!(
            context.new_channel(""),
            Err(SdkError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_channel_add_peer_dedupes() {
        let context = ClientContext::new_mock();
        let mut channel = context.new_channel("ch").unwrap();
        let peer0 = context.peer("peer0").unwrap();
        channel.add_peer(peer0.clone());
        channel.add_peer(peer0);
        channel.add_peer(context.peer("peer1").unwrap());
        assert_eq!(channel.peer_names(), vec!["peer0", "peer1"]);
    }

    #[test]
    fn test_with_shared_peer_replaces_by_name() {
        let shared: Arc<dyn Peer> = Arc::new(MockPeer::new("peer0"));
        let context = ClientContext::new_mock().with_shared_peer(shared);
        let names: Vec<&str> = context.peers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["peer1", "peer0"]);
        assert!(context.peer("peer2").is_none());
    }
}
