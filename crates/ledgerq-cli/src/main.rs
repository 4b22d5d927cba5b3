//! # ledgerq-cli
//!
//! Command-line interface for LedgerQ.
//!
//! ## Usage
//!
//! ```bash
//! # Identity
//! ledgerq enroll --user admin --secret adminpw
//!
//! # Channels
//! ledgerq channel create mychannel
//! ledgerq channel reconstruct mychannel
//!
//! # Chaincode
//! ledgerq chaincode install --name mycc --version 1.0 --path github.com/mycc
//! ledgerq chaincode instantiate --name mycc --version 1.0 --path github.com/mycc a 100 b 200
//! ledgerq chaincode invoke --name mycc --function move a b 10
//! ledgerq chaincode query --name mycc --function query a
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

pub use config::{Config, NetworkMode};
pub use error::CliError;
pub use output::Output;

/// LedgerQ CLI
#[derive(Parser, Debug)]
#[command(name = "ledgerq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to ~/.ledgerq/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Network backend, overriding the config file
    #[arg(long, global = true, value_enum)]
    network: Option<NetworkMode>,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Enroll an identity
    Enroll(commands::enroll::EnrollArgs),
    /// Channel management
    #[command(subcommand)]
    Channel(commands::channel::ChannelCommand),
    /// Chaincode lifecycle and invocation
    #[command(subcommand)]
    Chaincode(commands::chaincode::ChaincodeCommand),
    /// Show or edit configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Set network backend
        #[arg(long, value_enum)]
        set_network: Option<NetworkMode>,
        /// Set enrollment id
        #[arg(long)]
        set_user: Option<String>,
        /// Set enrollment secret
        #[arg(long)]
        set_secret: Option<String>,
        /// Set channel name
        #[arg(long)]
        set_channel: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let json = cli.json;
    match run(cli).await {
        Ok(true) => {}
        // Operation ran but reported a failed row
        Ok(false) => std::process::exit(2),
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "error": format!("{:#}", e),
                        "success": false
                    })
                );
            } else {
                eprintln!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(network) = cli.network {
        config.network = network;
    }

    let ok = match cli.command {
        Commands::Enroll(args) => args.execute(&config, cli.json).await?,
        Commands::Channel(cmd) => cmd.execute(&config, cli.json).await?,
        Commands::Chaincode(cmd) => cmd.execute(&config, cli.json).await?,
        Commands::Config {
            show,
            set_network,
            set_user,
            set_secret,
            set_channel,
        } => {
            let edits = ConfigEdits {
                network: set_network,
                user: set_user,
                secret: set_secret,
                channel: set_channel,
            };
            handle_config(&mut config, cli.config.as_deref(), show, edits, cli.json)?
        }
    };
    Ok(ok)
}

struct ConfigEdits {
    network: Option<NetworkMode>,
    user: Option<String>,
    secret: Option<String>,
    channel: Option<String>,
}

fn handle_config(
    config: &mut Config,
    path: Option<&std::path::Path>,
    show: bool,
    edits: ConfigEdits,
    json: bool,
) -> Result<bool, CliError> {
    let mut modified = false;

    if let Some(network) = edits.network {
        config.network = network;
        modified = true;
    }
    if let Some(user) = edits.user {
        config.user = user;
        modified = true;
    }
    if let Some(secret) = edits.secret {
        config.secret = secret;
        modified = true;
    }
    if let Some(channel) = edits.channel {
        config.session.channel = channel;
        modified = true;
    }

    if modified {
        let saved = config.save(path)?;
        Output::new(json)
            .field("status", "saved")
            .field("path", &saved.display().to_string())
            .message(&format!("Configuration saved to {}", saved.display()))
            .print();
    } else if show {
        let network = format!("{:?}", config.network).to_lowercase();
        Output::new(json)
            .field("network", &network)
            .field("user", &config.user)
            .field("channel", &config.session.channel)
            .field_value(
                "endorsers",
                serde_json::to_value(&config.session.endorsers)?,
            )
            .message(&format!(
                "Network: {}\nUser: {}\nChannel: {}\nProposal timeout: {:?}\nCommit timeout: {:?}",
                network,
                config.user,
                config.session.channel,
                config.session.proposal_timeout,
                config.session.commit_timeout
            ))
            .print();
    } else {
        Output::new(json)
            .message("Use --show to display config, or --set-network/--set-user/--set-secret/--set-channel to modify")
            .print();
    }

    Ok(true)
}
