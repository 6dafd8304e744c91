use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use devnet_chain::RpcClient;
use devnet_core::{DevnetConfig, Mode};
use serde::Serialize;
use tracing::{info, warn};

use crate::docker::{ContainerRuntime, RunContainerRequest};
use crate::importer::{CONTAINER_DATA_DIR, mode_dir};

/// HTTP-RPC port the node listens on inside its container.
pub const CONTAINER_HTTP_PORT: u16 = 8545;

const IPC_PATH: &str = "/root/.ethereum/geth.ipc";

// ── Readiness ──────────────────────────────────────────────────────

/// Something that can tell when a freshly started node answers requests.
#[async_trait]
pub trait NodeProbe: Send + Sync {
    async fn wait_ready(&self, timeout: Duration, interval: Duration) -> Result<()>;
}

#[async_trait]
impl NodeProbe for RpcClient {
    async fn wait_ready(&self, timeout: Duration, interval: Duration) -> Result<()> {
        self.wait_until_ready(timeout, interval).await
    }
}

// ── Options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub mode: Mode,
    /// Shared data directory; the node mounts `<data_dir>/<mode>`.
    pub data_dir: PathBuf,
    /// Miner reward address, and the clique validator in PoS.
    pub etherbase: String,
    pub network_id: u64,
    pub http_port: u16,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
}

impl LaunchOptions {
    pub fn from_config(config: &DevnetConfig, mode: Mode, etherbase: impl Into<String>) -> Self {
        Self {
            mode,
            data_dir: config.data_dir.clone(),
            etherbase: etherbase.into(),
            network_id: config.node.network_id,
            http_port: config.node.http_port,
            readiness_timeout: Duration::from_secs(config.node.readiness_timeout_secs),
            poll_interval: Duration::from_millis(config.node.readiness_poll_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchOutcome {
    pub container_id: String,
    /// `None` in PoW; in PoS whether the validator proposal went through.
    pub validator_proposed: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub exists: bool,
    pub running: bool,
}

// ── Commands ───────────────────────────────────────────────────────

/// Client flags for the long-running node.
pub fn node_command(mode: Mode, etherbase: &str, network_id: u64) -> Vec<String> {
    let network_id = network_id.to_string();
    let http_port = CONTAINER_HTTP_PORT.to_string();
    let mut args = vec![
        "--datadir",
        CONTAINER_DATA_DIR,
        "--networkid",
        network_id.as_str(),
        "--mine",
    ];
    match mode {
        Mode::Pow => {
            args.extend(["--miner.threads", "1", "--miner.etherbase", etherbase]);
        }
        Mode::Pos => {
            args.extend([
                "--miner.etherbase",
                etherbase,
                "--unlock",
                etherbase,
                "--password",
                "/dev/null",
                "--allow-insecure-unlock",
                "--syncmode",
                "full",
                "--gcmode",
                "archive",
            ]);
        }
    }
    args.extend([
        "--http",
        "--http.addr",
        "0.0.0.0",
        "--http.port",
        http_port.as_str(),
        "--http.api",
        mode.http_api(),
    ]);
    args.into_iter().map(String::from).collect()
}

fn init_command() -> Vec<String> {
    vec![
        "init".into(),
        "--datadir".into(),
        CONTAINER_DATA_DIR.into(),
        format!("{CONTAINER_DATA_DIR}/genesis.json"),
    ]
}

fn propose_command(validator: &str) -> Vec<String> {
    vec![
        "geth".into(),
        "attach".into(),
        "--exec".into(),
        format!("clique.propose('{validator}', true)"),
        IPC_PATH.into(),
    ]
}

/// Remove a container of `name` if one exists. Returns whether it did.
async fn remove_if_present(runtime: &dyn ContainerRuntime, name: &str) -> Result<bool> {
    if !runtime.container_exists(name).await? {
        return Ok(false);
    }
    runtime.remove_container(name).await?;
    Ok(true)
}

// ── Operations ─────────────────────────────────────────────────────

/// Initialize chain data from the mode's genesis file and start the node.
///
/// Any previous node container is replaced. In PoS the etherbase is then
/// proposed as a clique validator once the node answers RPC; a readiness
/// timeout or a failed proposal is logged and the node is left running.
pub async fn launch_node(
    runtime: &dyn ContainerRuntime,
    probe: &dyn NodeProbe,
    opts: &LaunchOptions,
) -> Result<LaunchOutcome> {
    let mode = opts.mode;
    let genesis = mode.genesis_path(&opts.data_dir);
    if !genesis.is_file() {
        bail!(
            "genesis file {} not found; run `devnet genesis` first",
            genesis.display()
        );
    }
    let host_dir = mode_dir(&opts.data_dir, mode)?.to_string_lossy().into_owned();
    let name = mode.container_name();

    if remove_if_present(runtime, &name).await? {
        info!(container = %name, "removed previous node container");
    }

    let init = RunContainerRequest {
        image: mode.image_tag(),
        remove: true,
        volumes: vec![(host_dir.clone(), CONTAINER_DATA_DIR.into())],
        command: init_command(),
        ..RunContainerRequest::default()
    };
    runtime.run_container(&init).await?;
    info!(%mode, "chain data initialized");

    let node = RunContainerRequest {
        image: mode.image_tag(),
        name: Some(name.clone()),
        detach: true,
        remove: false,
        ports: vec![(opts.http_port, CONTAINER_HTTP_PORT)],
        volumes: vec![(host_dir, CONTAINER_DATA_DIR.into())],
        command: node_command(mode, &opts.etherbase, opts.network_id),
    };
    let container_id = runtime.run_container(&node).await?;
    info!(container = %name, id = %container_id, port = opts.http_port, "node started");

    let validator_proposed = if mode.is_pos() {
        if let Err(e) = probe.wait_ready(opts.readiness_timeout, opts.poll_interval).await {
            warn!(error = %e, "proposing validator without a ready node");
        }
        match runtime.exec(&name, &propose_command(&opts.etherbase)).await {
            Ok(output) => {
                info!(validator = %opts.etherbase, output = %output.trim(), "validator proposed");
                Some(true)
            }
            Err(e) => {
                warn!(validator = %opts.etherbase, error = %e, "validator proposal failed");
                Some(false)
            }
        }
    } else {
        None
    };

    Ok(LaunchOutcome {
        container_id,
        validator_proposed,
    })
}

/// Stop and remove the mode's node container. Returns whether one existed.
pub async fn stop_node(runtime: &dyn ContainerRuntime, mode: Mode) -> Result<bool> {
    let name = mode.container_name();
    if !runtime.container_exists(&name).await? {
        return Ok(false);
    }
    if runtime.container_running(&name).await? {
        runtime.stop_container(&name).await?;
    }
    runtime.remove_container(&name).await?;
    info!(container = %name, "node stopped");
    Ok(true)
}

pub async fn node_status(runtime: &dyn ContainerRuntime, mode: Mode) -> Result<NodeStatus> {
    let name = mode.container_name();
    if !runtime.container_exists(&name).await? {
        return Ok(NodeStatus::default());
    }
    Ok(NodeStatus {
        exists: true,
        running: runtime.container_running(&name).await?,
    })
}
