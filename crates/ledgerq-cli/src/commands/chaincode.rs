//! Chaincode commands

use clap::{Args, Subcommand};
use ledgerq_core::{FrameBuilder, InvocationMode, InvocationRequest, ResultFrame};
use ledgerq_sdk::EndorsementPolicy;

use crate::commands::ready_session;
use crate::output::print_frame;
use crate::{config::Config, CliError};

/// Chaincode subcommands
#[derive(Debug, Subcommand)]
pub enum ChaincodeCommand {
    /// Install a chaincode package on every channel peer
    Install {
        /// Chaincode name
        #[arg(long)]
        name: String,
        /// Chaincode version
        #[arg(long)]
        version: String,
        /// Package path, relative to the configured chaincode directory
        #[arg(long)]
        path: String,
    },
    /// Instantiate an installed chaincode
    Instantiate {
        /// Chaincode name
        #[arg(long)]
        name: String,
        /// Chaincode version
        #[arg(long)]
        version: String,
        /// Package path the chaincode was installed from
        #[arg(long)]
        path: String,
        /// Init function
        #[arg(long, default_value = "init")]
        function: String,
        /// Endorsements required (defaults to any single peer)
        #[arg(long)]
        required: Option<usize>,
        /// Peers the endorsements must come from
        #[arg(long = "endorser")]
        endorsers: Vec<String>,
        /// Init arguments
        args: Vec<String>,
    },
    /// Invoke a state-mutating function
    Invoke(CallArgs),
    /// Evaluate a read-only function
    Query(CallArgs),
}

/// Arguments of a chaincode call
#[derive(Debug, Args)]
pub struct CallArgs {
    /// Chaincode name
    #[arg(long)]
    pub name: String,
    /// Function name
    #[arg(long)]
    pub function: String,
    /// Report one row per endorsing peer
    #[arg(long)]
    pub per_peer: bool,
    /// Function arguments
    pub args: Vec<String>,
}

impl ChaincodeCommand {
    pub async fn execute(self, config: &Config, json: bool) -> Result<bool, CliError> {
        let session = ready_session(config).await?;

        let frame: ResultFrame = match self {
            ChaincodeCommand::Install {
                name,
                version,
                path,
            } => {
                let outcome = session
                    .install_chaincode(&name, &version, &config.chaincode_dir(), &path)
                    .await;
                FrameBuilder::install(&name, &version, &outcome)
            }
            ChaincodeCommand::Instantiate {
                name,
                version,
                path,
                function,
                required,
                endorsers,
                args,
            } => {
                let policy = policy(required, endorsers)?;
                let outcome = session
                    .instantiate_chaincode(&name, &version, &path, &function, args, policy)
                    .await;
                FrameBuilder::instantiate(&name, &outcome)
            }
            ChaincodeCommand::Invoke(call) => {
                session
                    .invoke_with(call.into_request(InvocationMode::Invoke))
                    .await?
            }
            ChaincodeCommand::Query(call) => {
                session
                    .invoke_with(call.into_request(InvocationMode::Query))
                    .await?
            }
        };

        print_frame(&frame, json);
        Ok(frame.all_success())
    }
}

impl CallArgs {
    fn into_request(self, mode: InvocationMode) -> InvocationRequest {
        let mut request = InvocationRequest::invoke(self.name, self.function, self.args);
        request.mode = mode;
        if self.per_peer {
            request.with_per_peer_detail()
        } else {
            request
        }
    }
}

fn policy(
    required: Option<usize>,
    endorsers: Vec<String>,
) -> Result<Option<EndorsementPolicy>, CliError> {
    match (required, endorsers.is_empty()) {
        (None, true) => Ok(None),
        (None, false) => Ok(Some(EndorsementPolicy::all_of(endorsers))),
        (Some(0), _) => Err(CliError::InvalidInput(
            "--required must be at least 1".to_string(),
        )),
        (Some(n), _) => Ok(Some(EndorsementPolicy::n_of(n, endorsers))),
    }
}
