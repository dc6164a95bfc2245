/*
[INPUT]:  Subcommand arguments and resolved CliConfig
[OUTPUT]: Session operations run against the configured backend, results on stdout
[POS]:    CLI layer - command handlers over SessionClient
[UPDATE]: When facade operations or command output change
*/

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use console::style;
use dialoguer::{Password, theme::ColorfulTheme};
use tracing::{info, warn};

use marketplace_session::{
    EvmWalletSigner, FileTokenStore, RouteGate, SessionClient, SessionCookie, SessionSnapshot,
    WalletSigner,
};

use crate::config::CliConfig;

fn build_client(config: &CliConfig) -> Result<SessionClient> {
    let store_path = config.store_path()?;
    info!(store_path = %store_path.display(), api = %config.api.api_base_url, "building session client");

    let client = SessionClient::from_config(
        config.api.clone(),
        Arc::new(FileTokenStore::new(&store_path)),
        config.session,
    )
    .context("create session client")?;
    Ok(client.with_cookie(SessionCookie::from_config(&config.gate)))
}

fn print_snapshot(snapshot: &SessionSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("serialize session snapshot")?;
    println!("{json}");
    Ok(())
}

pub async fn status(config: &CliConfig) -> Result<()> {
    let client = build_client(config)?;
    let authenticated = client.check_auth().await;
    info!(authenticated, "session checked");
    print_snapshot(&client.snapshot())
}

pub async fn login(config: &CliConfig, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact()?,
    };

    let client = build_client(config)?;
    let user = client
        .login_with_password(email, &password)
        .await
        .context("login")?;

    println!("{} signed in as {}", style("✓").green(), style(&user.id).cyan());
    print_snapshot(&client.snapshot())
}

pub async fn logout(config: &CliConfig, revoke: bool) -> Result<()> {
    let client = build_client(config)?;
    if revoke {
        client.logout_and_revoke().await.context("logout")?;
    } else {
        client.logout().context("logout")?;
    }
    println!("{} signed out", style("✓").green());
    Ok(())
}

pub async fn refresh(config: &CliConfig) -> Result<()> {
    let client = build_client(config)?;
    if client.refresh_access_token().await {
        println!("{} tokens rotated", style("✓").green());
        return print_snapshot(&client.snapshot());
    }

    let snapshot = client.snapshot();
    print_snapshot(&snapshot)?;
    match snapshot.last_error {
        Some(error) => Err(anyhow!("refresh failed ({:?}): {}", error.kind, error.message)),
        None => Err(anyhow!("no session to refresh")),
    }
}

pub async fn link_wallet(
    config: &CliConfig,
    private_key: Option<String>,
    chain_id: Option<u64>,
) -> Result<()> {
    let private_key = match private_key {
        Some(key) => key,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("EVM private key (hex)")
            .interact()?,
    };
    let chain_id = chain_id.unwrap_or(config.wallet.chain_id);
    let signer = Arc::new(EvmWalletSigner::new(&private_key, chain_id).context("load wallet key")?);
    let address = signer.address().to_string();

    let client = build_client(config)?.with_wallet(signer);
    if !client.check_auth().await {
        warn!("no backend session; the wallet link will open a new one");
    }

    let identity = client.link_wallet(&address).await.context("link wallet")?;
    println!(
        "{} linked {} on chain {}",
        style("✓").green(),
        style(&identity.address).cyan(),
        identity.chain_id
    );
    print_snapshot(&client.snapshot())
}

pub async fn google_url(config: &CliConfig) -> Result<()> {
    let client = build_client(config)?;
    let url = client.google_auth_url().await.context("fetch Google auth URL")?;
    println!("{url}");
    Ok(())
}

pub fn gate(config: &CliConfig, path: &str, cookie: bool) -> Result<()> {
    let gate = RouteGate::new(config.gate.clone());
    let class = gate.classify(path);
    let decision = gate.evaluate(path, cookie);
    let requirement = gate.requirement_for(path);

    println!("class:       {class:?}");
    match decision.redirect_location() {
        Some(location) => println!("decision:    redirect -> {location}"),
        None => println!("decision:    allow"),
    }
    println!(
        "client-side: session={} wallet={}",
        requirement.backend_session, requirement.wallet
    );
    Ok(())
}
