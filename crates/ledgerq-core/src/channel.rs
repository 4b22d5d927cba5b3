//! Channel Manager

use std::sync::Arc;

use futures::future::join_all;
use ledgerq_sdk::{Certificate, Channel, ClientContext, Peer, SdkError};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};

/// How a channel handle got its peer membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipSource {
    /// Created by this session
    Created,
    /// Peers reported participating in the channel
    Discovered,
    /// No peer reported the channel; bound to every configured peer
    Reattached,
}

/// Channel bound to a fixed, ordered peer set
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    channel: Channel,
    source: MembershipSource,
}

impl ChannelHandle {
    /// Channel name
    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// Member peers in order
    pub fn peers(&self) -> &[Arc<dyn Peer>] {
        self.channel.peers()
    }

    /// Member peer names in order
    pub fn peer_names(&self) -> Vec<String> {
        self.channel.peer_names()
    }

    /// Where the membership came from
    pub fn source(&self) -> MembershipSource {
        self.source
    }

    /// Members whose names appear in `names`, in channel order
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn Peer>> {
        self.peers()
            .iter()
            .filter(|p| names.iter().any(|n| n == p.name()))
            .cloned()
            .collect()
    }
}

/// Creates and reconstructs channel handles
pub struct ChannelManager<'a> {
    context: &'a ClientContext,
}

impl<'a> ChannelManager<'a> {
    /// Create a manager over a client context
    pub fn new(context: &'a ClientContext) -> Self {
        Self { context }
    }

    /// Allocate a new channel object bound to every known peer
    pub fn create_channel(&self, name: &str) -> CoreResult<ChannelHandle> {
        let mut channel = self.context.new_channel(name).map_err(|e| match e {
            SdkError::ChannelExists(name) => {
                CoreError::Channel(format!("channel {} already exists", name))
            }
            other => CoreError::Channel(other.to_string()),
        })?;
        for peer in self.context.peers() {
            channel.add_peer(peer.clone());
        }
        info!("Created channel {} with {} peers", name, channel.peers().len());
        Ok(ChannelHandle {
            channel,
            source: MembershipSource::Created,
        })
    }

    /// Bind to `name` if `discovery_peer` participates in it
    pub async fn reconstruct_channel(
        &self,
        name: &str,
        discovery_peer: &Arc<dyn Peer>,
        requester: &Certificate,
    ) -> CoreResult<ChannelHandle> {
        let channels = discovery_peer
            .query_channels(requester)
            .await
            .map_err(|e| {
                CoreError::Channel(format!(
                    "channel discovery on {} failed: {}",
                    discovery_peer.name(),
                    e
                ))
            })?;
        debug!("{} reports channels {:?}", discovery_peer.name(), channels);

        if !channels.contains(name) {
            return Err(CoreError::ChannelNotFound(format!(
                "{} is not joined to {}",
                discovery_peer.name(),
                name
            )));
        }

        let mut channel = self.allocate(name)?;
        channel.add_peer(discovery_peer.clone());
        Ok(ChannelHandle {
            channel,
            source: MembershipSource::Discovered,
        })
    }

    /// Use every known peer for discovery.
    ///
    /// Peers reporting `name` become the membership. If none does, the handle
    /// is reattached to every known peer.
    pub async fn discover_channel(
        &self,
        name: &str,
        requester: &Certificate,
    ) -> CoreResult<ChannelHandle> {
        let peers = self.context.peers();
        if peers.is_empty() {
            return Err(CoreError::ChannelNotFound(format!(
                "no peers configured to discover {}",
                name
            )));
        }

        let reports = join_all(peers.iter().map(|peer| async move {
            (peer.clone(), peer.query_channels(requester).await)
        }))
        .await;

        let mut channel = self.allocate(name)?;
        for (peer, report) in reports {
            match report {
                Ok(channels) if channels.contains(name) => channel.add_peer(peer),
                Ok(channels) => debug!("{} reports channels {:?}", peer.name(), channels),
                Err(e) => warn!("Channel discovery on {} failed: {}", peer.name(), e),
            }
        }

        if !channel.peers().is_empty() {
            info!("Reconstructed channel {} on {:?}", name, channel.peer_names());
            return Ok(ChannelHandle {
                channel,
                source: MembershipSource::Discovered,
            });
        }

        warn!(
            "No peer reports channel {}, reattaching to all {} peers",
            name,
            peers.len()
        );
        for peer in peers {
            channel.add_peer(peer.clone());
        }
        Ok(ChannelHandle {
            channel,
            source: MembershipSource::Reattached,
        })
    }

    fn allocate(&self, name: &str) -> CoreResult<Channel> {
        self.context
            .channel_or_new(name)
            .map_err(|e| CoreError::Channel(e.to_string()))
    }
}
