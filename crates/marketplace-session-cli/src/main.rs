/*
[INPUT]:  CLI arguments, YAML configuration file
[OUTPUT]: Session lifecycle commands run against the auth backend
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or startup flow
*/

mod cli;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{commands, init};
use crate::config::{CliConfig, default_config_path};

#[derive(Parser, Debug)]
#[command(name = "marketplace-session", version, about = "Marketplace session and token lifecycle tool")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    /// Overrides `api.api_base_url` from the config file
    #[arg(long = "api-url", value_name = "URL", global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a configuration file interactively
    Init {
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Re-derive the session from storage, refreshing if expired
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the local session
    Logout {
        /// Also revoke the refresh token on the backend
        #[arg(long)]
        revoke: bool,
    },
    /// Rotate the token pair now
    Refresh,
    /// Link an EVM wallet through the nonce/sign/connect challenge
    LinkWallet {
        /// Prompted for when omitted
        #[arg(long = "private-key", value_name = "HEX")]
        private_key: Option<String>,
        #[arg(long = "chain-id")]
        chain_id: Option<u64>,
    },
    /// Print the Google sign-in URL
    GoogleUrl,
    /// Show what the route gate decides for a path
    Gate {
        path: String,
        /// Pretend the session cookie is present
        #[arg(long)]
        cookie: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    if let Command::Init { output } = &args.command {
        let output = match output {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        return init::run_init(output);
    }

    let mut config = CliConfig::load(args.config_path.as_deref()).context("load config")?;
    if let Some(api_url) = args.api_url {
        config.api.api_base_url = api_url;
    }
    info!(
        config_path = ?args.config_path,
        api = %config.api.api_base_url,
        "configuration loaded"
    );

    match args.command {
        Command::Init { .. } => Ok(()),
        Command::Status => commands::status(&config).await,
        Command::Login { email, password } => commands::login(&config, &email, password).await,
        Command::Logout { revoke } => commands::logout(&config, revoke).await,
        Command::Refresh => commands::refresh(&config).await,
        Command::LinkWallet {
            private_key,
            chain_id,
        } => commands::link_wallet(&config, private_key, chain_id).await,
        Command::GoogleUrl => commands::google_url(&config).await,
        Command::Gate { path, cookie } => commands::gate(&config, &path, cookie),
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}
