//! Orchestration session
//!
//! Owns one identity and at most one channel handle. Setup calls take
//! `&mut self`; invocations take `&self` and may run concurrently.

use std::path::Path;
use std::sync::Arc;

use ledgerq_primitives::TxId;
use ledgerq_sdk::{ClientContext, EndorsementPolicy, SigningIdentity};
use tracing::info;

use crate::channel::{ChannelHandle, ChannelManager};
use crate::config::SessionConfig;
use crate::error::{CoreError, CoreResult};
use crate::frame::{FrameBuilder, ResultFrame};
use crate::identity::{Identity, IdentityManager};
use crate::lifecycle::LifecycleManager;
use crate::orchestrator::{InvocationReport, InvocationRequest, Orchestrator};
use crate::store::CredentialStore;

/// Client session against one ledger network
pub struct Session {
    context: ClientContext,
    config: SessionConfig,
    identities: IdentityManager,
    identity: Option<Identity>,
    channel: Option<ChannelHandle>,
}

impl Session {
    /// Create a session with no identity and no channel
    pub fn new(
        context: ClientContext,
        config: SessionConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            context,
            config,
            identities: IdentityManager::new(store),
            identity: None,
            channel: None,
        }
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Underlying client context
    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    /// Current identity
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Current channel handle
    pub fn channel(&self) -> Option<&ChannelHandle> {
        self.channel.as_ref()
    }

    /// Enroll `username` and make it the session identity
    pub async fn enroll(&mut self, username: &str, secret: &str) -> CoreResult<&Identity> {
        let identity = self
            .identities
            .enroll(&self.context, username, secret)
            .await?;
        info!("Session identity is now {}", identity.username());
        Ok(&*self.identity.insert(identity))
    }

    /// Create channel `name` over every configured peer
    pub fn create_channel(&mut self, name: &str) -> CoreResult<&ChannelHandle> {
        if let Some(existing) = &self.channel {
            return Err(CoreError::Channel(format!(
                "session already bound to channel {}",
                existing.name()
            )));
        }
        let handle = ChannelManager::new(&self.context).create_channel(name)?;
        Ok(&*self.channel.insert(handle))
    }

    /// Rebind the session to an existing channel, replacing any current handle
    pub async fn reconstruct_channel(&mut self, name: &str) -> CoreResult<&ChannelHandle> {
        let identity = self.identity.as_ref().ok_or_else(|| {
            CoreError::Precondition("enroll before reconstructing a channel".into())
        })?;
        let requester = identity.require_enrolled()?.certificate().clone();

        let handle = ChannelManager::new(&self.context)
            .discover_channel(name, &requester)
            .await?;
        info!(
            "Session bound to channel {} via {:?} ({} peers)",
            handle.name(),
            handle.source(),
            handle.peers().len()
        );
        Ok(&*self.channel.insert(handle))
    }

    /// Install a chaincode package on every channel peer
    pub async fn install_chaincode(
        &self,
        name: &str,
        version: &str,
        configured_path: &Path,
        package_path: &str,
    ) -> CoreResult<String> {
        let (channel, signer) = self.ready()?;
        self.lifecycle(channel, signer)
            .install(name, version, configured_path, package_path)
            .await
    }

    /// Instantiate an installed chaincode and wait for the commit
    pub async fn instantiate_chaincode(
        &self,
        name: &str,
        version: &str,
        package_path: &str,
        function: &str,
        args: Vec<String>,
        policy: Option<EndorsementPolicy>,
    ) -> CoreResult<TxId> {
        let (channel, signer) = self.ready()?;
        self.lifecycle(channel, signer)
            .instantiate(name, version, package_path, function, args, policy)
            .await
    }

    /// Invoke a state-mutating chaincode function.
    ///
    /// Only missing setup or a malformed request is an `Err`; every
    /// invocation failure comes back as a failed row.
    pub async fn invoke_chaincode(
        &self,
        name: &str,
        function: &str,
        args: Vec<String>,
    ) -> CoreResult<ResultFrame> {
        self.invoke_with(InvocationRequest::invoke(name, function, args))
            .await
    }

    /// Evaluate a read-only chaincode function without ordering
    pub async fn query_chaincode(
        &self,
        name: &str,
        function: &str,
        args: Vec<String>,
    ) -> CoreResult<ResultFrame> {
        self.invoke_with(InvocationRequest::query(name, function, args))
            .await
    }

    /// Run `request` and render its frame
    pub async fn invoke_with(&self, request: InvocationRequest) -> CoreResult<ResultFrame> {
        let report = self.run(&request).await?;
        Ok(if request.per_peer_detail {
            FrameBuilder::per_peer(&report)
        } else {
            FrameBuilder::invocation(&report)
        })
    }

    /// Run `request` and return the full report
    pub async fn run(&self, request: &InvocationRequest) -> CoreResult<InvocationReport> {
        let (channel, signer) = self.ready()?;
        request.validate()?;
        let orchestrator = Orchestrator::new(
            channel,
            signer,
            self.context.orderer().as_ref(),
            &self.config,
        );
        Ok(orchestrator.run(request).await)
    }

    fn ready(&self) -> CoreResult<(&ChannelHandle, &SigningIdentity)> {
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| CoreError::Precondition("no enrolled identity".into()))?;
        let signer = identity.require_enrolled()?;
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| CoreError::Precondition("no channel handle".into()))?;
        Ok((channel, signer))
    }

    fn lifecycle<'a>(
        &'a self,
        channel: &'a ChannelHandle,
        signer: &'a SigningIdentity,
    ) -> LifecycleManager<'a> {
        LifecycleManager::new(
            channel,
            signer,
            self.context.orderer().as_ref(),
            self.config.proposal_timeout,
            self.config.commit_timeout,
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity.as_ref().map(Identity::username))
            .field("channel", &self.channel.as_ref().map(ChannelHandle::name))
            .finish()
    }
}
