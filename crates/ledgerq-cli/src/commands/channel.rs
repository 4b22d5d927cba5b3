//! Channel commands

use clap::Subcommand;
use ledgerq_core::ChannelHandle;

use crate::commands::open_session;
use crate::{config::Config, output::Output, CliError};

/// Channel subcommands
#[derive(Debug, Subcommand)]
pub enum ChannelCommand {
    /// Create a channel object over every configured peer
    Create {
        /// Channel name (defaults to the configured channel)
        name: Option<String>,
    },
    /// Rediscover an existing channel through the configured peers
    Reconstruct {
        /// Channel name (defaults to the configured channel)
        name: Option<String>,
    },
}

impl ChannelCommand {
    pub async fn execute(self, config: &Config, json: bool) -> Result<bool, CliError> {
        let mut session = open_session(config)?;
        session.enroll(&config.user, &config.secret).await?;

        let handle = match self {
            ChannelCommand::Create { name } => {
                let name = name.unwrap_or_else(|| config.session.channel.clone());
                session.create_channel(&name)?
            }
            ChannelCommand::Reconstruct { name } => {
                let name = name.unwrap_or_else(|| config.session.channel.clone());
                session.reconstruct_channel(&name).await?
            }
        };
        print_handle(handle, json);
        Ok(true)
    }
}

fn print_handle(handle: &ChannelHandle, json: bool) {
    let peers = handle.peer_names();
    let source = format!("{:?}", handle.source()).to_lowercase();
    Output::new(json)
        .field("channel", handle.name())
        .field("source", &source)
        .field_value("peers", peers.clone().into())
        .message(&format!(
            "Channel {} ({}): {}",
            handle.name(),
            source,
            peers.join(", ")
        ))
        .print();
}
