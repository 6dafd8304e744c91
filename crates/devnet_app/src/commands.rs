//! CLI command implementations.

use anyhow::{Context, Result, bail};
use devnet_chain::{
    AccountStore, GenesisParams, RpcClient, TransferRequest, create_accounts, run_report,
    send_transfer, write_genesis_files,
};
use devnet_core::{DevnetConfig, DevnetError, Mode};
use devnet_docker::{
    DockerClient, LaunchOptions, ensure_image, import_accounts, launch_node, node_status, stop_node,
};
use tracing::info;

/// Docker client for the configured executable, failing early if it cannot run.
async fn docker(config: &DevnetConfig) -> Result<DockerClient> {
    let client = DockerClient::with_docker_path(&config.docker_path);
    if !client.is_available().await {
        bail!("docker is not available at `{}`", client.docker_path());
    }
    Ok(client)
}

/// RPC client for the local node container's published port.
fn node_client(config: &DevnetConfig) -> Result<RpcClient> {
    RpcClient::new(config.node_rpc_url())
}

/// Generate accounts and write `accounts.json` plus both genesis files.
pub fn genesis(config: &DevnetConfig, count: Option<usize>) -> Result<()> {
    let count = count.unwrap_or(config.account_count);
    if count == 0 {
        return Err(DevnetError::Config("account count must be at least 1".into()).into());
    }

    info!(count, data_dir = %config.data_dir.display(), "generating accounts");
    let accounts = create_accounts(count);
    let params = GenesisParams::from(&config.genesis);
    write_genesis_files(&config.data_dir, &accounts, &params)?;

    println!("Generated {count} accounts");
    println!("  Accounts: {}", config.accounts_path().display());
    for mode in Mode::ALL {
        println!("  {mode} genesis: {}", mode.genesis_path(&config.data_dir).display());
    }
    Ok(())
}

/// Pull the mode image if needed and import every stored key.
pub async fn import(config: &DevnetConfig, mode: Mode) -> Result<()> {
    let store = AccountStore::load(&config.accounts_path())?;
    let docker = docker(config).await?;

    ensure_image(&docker, mode, config.node.upstream_image(mode)).await?;
    let summary = import_accounts(&docker, store.accounts(), &config.data_dir, mode).await?;

    println!("Import into {mode}: {summary}");
    Ok(())
}

/// Initialize chain data and start the node, proposing the validator in PoS.
pub async fn start(config: &DevnetConfig, mode: Mode) -> Result<()> {
    let store = AccountStore::load(&config.accounts_path())?;
    let etherbase = store
        .first()
        .ok_or_else(|| DevnetError::EmptyAccounts(mode.to_string()))?;

    let docker = docker(config).await?;
    ensure_image(&docker, mode, config.node.upstream_image(mode)).await?;

    let probe = node_client(config)?;
    let opts = LaunchOptions::from_config(config, mode, etherbase.address.as_str());
    let outcome = launch_node(&docker, &probe, &opts).await?;

    println!("Started {} ({})", mode.container_name(), outcome.container_id);
    println!("  Etherbase: {}", etherbase.address);
    println!("  RPC:       {}", probe.url());
    match outcome.validator_proposed {
        Some(true) => println!("  Validator proposed: {}", etherbase.address),
        Some(false) => println!("  Validator proposal failed; see the log for details"),
        None => {}
    }
    Ok(())
}

pub async fn stop(config: &DevnetConfig, mode: Mode) -> Result<()> {
    if stop_node(&docker(config).await?, mode).await? {
        println!("Stopped {}", mode.container_name());
    } else {
        println!("No {} container", mode.container_name());
    }
    Ok(())
}

pub async fn status(config: &DevnetConfig, mode: Mode) -> Result<()> {
    let status = node_status(&docker(config).await?, mode).await?;
    let name = mode.container_name();
    let state = match (status.exists, status.running) {
        (false, _) => "absent",
        (true, false) => "stopped",
        (true, true) => "running",
    };
    println!("{name}: {state}");

    if status.running {
        let client = node_client(config)?;
        let reachable = client.is_connected().await;
        let rpc = if reachable { "reachable" } else { "unreachable" };
        println!("  RPC {}: {rpc}", client.url());
    }
    Ok(())
}

/// Print the node report and, with `send`, submit one transfer.
pub async fn smoke(config: &DevnetConfig, send: bool) -> Result<()> {
    let client = RpcClient::new(config.rpc_url.as_str())?;
    let report = run_report(&client).await?;
    print!("{report}");

    if send {
        if !report.connected {
            println!("Transfer skipped: node not reachable");
            return Ok(());
        }
        let request = TransferRequest::from_settings(&config.smoke)?;
        let hash = send_transfer(&client, &request)
            .await
            .context("transfer failed")?;
        println!("Transaction sent: {hash}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devnet_chain::GenesisConfig;

    fn config_in(dir: &std::path::Path) -> DevnetConfig {
        DevnetConfig {
            data_dir: dir.to_path_buf(),
            ..DevnetConfig::default()
        }
    }

    #[test]
    fn genesis_writes_accounts_and_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        genesis(&config, Some(4)).unwrap();

        let store = AccountStore::load(&config.accounts_path()).unwrap();
        assert_eq!(store.len(), 4);
        let pow = GenesisConfig::load(&Mode::Pow.genesis_path(tmp.path())).unwrap();
        let pos = GenesisConfig::load(&Mode::Pos.genesis_path(tmp.path())).unwrap();
        assert!(!pow.is_clique());
        assert!(pos.is_clique());
        assert_eq!(pos.alloc.len(), 4);
    }

    #[test]
    fn genesis_uses_configured_count() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.account_count = 2;

        genesis(&config, None).unwrap();
        assert_eq!(AccountStore::load(&config.accounts_path()).unwrap().len(), 2);
    }

    #[test]
    fn genesis_rejects_zero_accounts() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(genesis(&config_in(tmp.path()), Some(0)).is_err());
        assert!(!tmp.path().join("accounts.json").exists());
    }

    #[tokio::test]
    async fn start_without_accounts_points_at_genesis() {
        let tmp = tempfile::tempdir().unwrap();
        let err = start(&config_in(tmp.path()), Mode::Pos).await.unwrap_err();
        assert!(format!("{err:#}").contains("devnet genesis"));
    }

    #[tokio::test]
    async fn smoke_against_closed_port_reports_disconnected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.rpc_url = "http://127.0.0.1:1".into();
        smoke(&config, false).await.unwrap();
    }

    #[tokio::test]
    async fn smoke_send_skips_transfer_when_disconnected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.rpc_url = "http://127.0.0.1:1".into();
        smoke(&config, true).await.unwrap();
    }

    #[test]
    fn node_client_uses_published_port() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.node.http_port = 18545;
        assert_eq!(node_client(&config).unwrap().url(), "http://127.0.0.1:18545");
    }

    #[tokio::test]
    async fn missing_docker_binary_fails_early() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.docker_path = "/nonexistent/docker-binary".into();
        let err = stop(&config, Mode::Pow).await.unwrap_err();
        assert!(err.to_string().contains("docker is not available"));
    }
}
