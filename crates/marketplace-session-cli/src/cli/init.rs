/*
[INPUT]:  Interactive user input via CLI
[OUTPUT]: Generated YAML configuration file
[POS]:    CLI initialization layer
[UPDATE]: When CliConfig schema changes
*/

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use marketplace_session::ClientConfig;

use crate::config::{CliConfig, WalletConfig, default_store_path};

pub fn run_init(output: PathBuf) -> Result<()> {
    println!("{}", style("Welcome to Marketplace Session Init").bold().cyan());
    println!(
        "{}",
        style("This will guide you through creating a session CLI configuration.").dim()
    );

    let theme = ColorfulTheme::default();
    let defaults = CliConfig::default();

    let api_base_url: String = Input::with_theme(&theme)
        .with_prompt("Auth API base URL")
        .default(defaults.api.api_base_url.clone())
        .interact_text()?;

    let store_default = default_store_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "session.json".to_string());
    let store_path: String = Input::with_theme(&theme)
        .with_prompt("Token file")
        .default(store_default)
        .interact_text()?;

    println!("\n{}", style("--- Wallet ---").bold());
    let chain_id: u64 = Input::with_theme(&theme)
        .with_prompt("Chain ID")
        .default(defaults.wallet.chain_id)
        .interact_text()?;

    if output.exists()
        && !Confirm::with_theme(&theme)
            .with_prompt(format!("{} exists. Overwrite?", output.display()))
            .default(false)
            .interact()?
    {
        println!("{}", style("Aborted; nothing written.").yellow());
        return Ok(());
    }

    let config = CliConfig {
        api: ClientConfig {
            api_base_url,
            ..defaults.api
        },
        store_path: Some(PathBuf::from(store_path)),
        wallet: WalletConfig { chain_id },
        ..CliConfig::default()
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&output, config.to_yaml()?)
        .with_context(|| format!("failed to write config to {}", output.display()))?;

    println!("\n{}", style("SUCCESS!").bold().green());
    println!("Configuration written to: {}", style(output.display()).cyan());

    Ok(())
}
