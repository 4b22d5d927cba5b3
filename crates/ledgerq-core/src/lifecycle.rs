//! Chaincode Lifecycle Manager

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use ledgerq_primitives::TxId;
use ledgerq_sdk::{
    ChaincodeId, EndorsedTransaction, EndorsementPolicy, Orderer, Proposal, ProposalKind,
    SigningIdentity,
};
use tracing::{info, warn};

use crate::channel::ChannelHandle;
use crate::commit::submit_and_wait;
use crate::consistency::{partition, ConsistencySets};
use crate::endorsement::collect_endorsements;
use crate::error::{CoreError, CoreResult};

/// Confirmation returned by a successful install
pub const INSTALL_SUCCESS: &str = "Chaincode installed successfully";

/// Chaincode being deployed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeDescriptor {
    /// Chaincode name
    pub name: String,
    /// Version
    pub version: String,
    /// Source or package path
    pub path: String,
    /// Endorsement policy set at instantiation
    pub policy: Option<EndorsementPolicy>,
}

impl ChaincodeDescriptor {
    /// Describe a chaincode version
    pub fn new(name: &str, version: &str, path: &str) -> CoreResult<Self> {
        if name.is_empty() || version.is_empty() {
            return Err(CoreError::InvalidRequest(
                "chaincode name and version must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            path: path.to_string(),
            policy: None,
        })
    }

    fn id(&self) -> ChaincodeId {
        ChaincodeId::new(&self.name, &self.version, &self.path)
    }
}

/// Installs and instantiates chaincode on a channel's peers
pub struct LifecycleManager<'a> {
    channel: &'a ChannelHandle,
    signer: &'a SigningIdentity,
    orderer: &'a dyn Orderer,
    proposal_timeout: Duration,
    commit_timeout: Duration,
}

impl<'a> LifecycleManager<'a> {
    /// Create a manager for one channel and identity
    pub fn new(
        channel: &'a ChannelHandle,
        signer: &'a SigningIdentity,
        orderer: &'a dyn Orderer,
        proposal_timeout: Duration,
        commit_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            signer,
            orderer,
            proposal_timeout,
            commit_timeout,
        }
    }

    /// Install on every channel peer.
    ///
    /// The package is read from `configured_path/package_path` when that file
    /// exists; otherwise the path itself is sent for the peers to resolve.
    pub async fn install(
        &self,
        name: &str,
        version: &str,
        configured_path: &Path,
        package_path: &str,
    ) -> CoreResult<String> {
        let descriptor = ChaincodeDescriptor::new(name, version, package_path)?;
        let package = read_package(configured_path, package_path).await?;

        let proposal = Proposal::new(
            self.channel.name(),
            ProposalKind::Install,
            descriptor.id(),
            self.signer.certificate(),
        )?
        .package(package)
        .sign(self.signer)?;

        self.endorse_all(&descriptor, &proposal).await?;
        info!(
            "Installed {}:{} on {} peers",
            name,
            version,
            self.channel.peers().len()
        );
        Ok(INSTALL_SUCCESS.to_string())
    }

    /// Instantiate on the channel and wait for the commit
    pub async fn instantiate(
        &self,
        name: &str,
        version: &str,
        package_path: &str,
        function: &str,
        args: Vec<String>,
        policy: Option<EndorsementPolicy>,
    ) -> CoreResult<TxId> {
        let mut descriptor = ChaincodeDescriptor::new(name, version, package_path)?;
        let policy = policy.unwrap_or_default();
        policy
            .validate()
            .map_err(|e| CoreError::InvalidRequest(e.to_string()))?;
        descriptor.policy = Some(policy.clone());

        let signed = Proposal::new(
            self.channel.name(),
            ProposalKind::Instantiate,
            descriptor.id(),
            self.signer.certificate(),
        )?
        .call(function, args)
        .policy(policy.clone())
        .sign(self.signer)?;
        let tx_id = signed.tx_id();

        let sets = self.endorse_all(&descriptor, &signed).await?;
        let endorsements = sets.largest().responses().to_vec();
        if !policy.is_satisfied_by(endorsements.iter().map(|r| r.peer.as_str())) {
            return Err(CoreError::InstallInconsistency {
                chaincode: name.to_string(),
                dissenters: Vec::new(),
                detail: format!(
                    "endorsement policy requires {} of {:?}",
                    policy.required, policy.of
                ),
            });
        }

        let transaction = EndorsedTransaction {
            proposal: signed,
            endorsements,
        };
        submit_and_wait(self.orderer, &transaction, self.commit_timeout).await?;
        info!("Instantiated {}:{} in transaction {}", name, version, tx_id);
        Ok(tx_id)
    }

    async fn endorse_all(
        &self,
        descriptor: &ChaincodeDescriptor,
        proposal: &ledgerq_sdk::SignedProposal,
    ) -> CoreResult<ConsistencySets> {
        if self.channel.peers().is_empty() {
            return Err(CoreError::NoResponse(format!(
                "{} (channel {} has no peers)",
                descriptor.name,
                self.channel.name()
            )));
        }

        let responses =
            collect_endorsements(self.channel.peers(), proposal, self.proposal_timeout).await;
        let sets = partition(responses)?;
        if !sets.is_agreement() {
            let dissenters = sets.dissenters();
            warn!(
                "{}:{} deployment disagreement across {} sets, dissenting {:?}",
                descriptor.name,
                descriptor.version,
                sets.len(),
                dissenters
            );
            return Err(CoreError::InstallInconsistency {
                chaincode: descriptor.name.clone(),
                detail: sets
                    .first_failure()
                    .unwrap_or("divergent responses")
                    .to_string(),
                dissenters,
            });
        }
        Ok(sets)
    }
}

async fn read_package(configured_path: &Path, package_path: &str) -> CoreResult<Bytes> {
    let full = configured_path.join(package_path);
    if tokio::fs::metadata(&full)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        let bytes = tokio::fs::read(&full).await.map_err(|e| {
            CoreError::InvalidRequest(format!("cannot read package {}: {}", full.display(), e))
        })?;
        return Ok(Bytes::from(bytes));
    }
    Ok(Bytes::copy_from_slice(package_path.as_bytes()))
}
