use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::DevnetError;
use crate::mode::Mode;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "devnet.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Parameters baked into both genesis files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisSettings {
    pub chain_id: u64,
    /// Clique block period in seconds.
    pub clique_period: u64,
    pub clique_epoch: u64,
    pub gas_limit: String,
    pub difficulty: String,
    /// Lower bound (inclusive) of the per-account balance, in whole ether.
    pub min_balance_eth: u64,
    /// Upper bound (exclusive) of the per-account balance, in whole ether.
    pub max_balance_eth: u64,
}

impl Default for GenesisSettings {
    fn default() -> Self {
        Self {
            chain_id: 193_284_561_987_324,
            clique_period: 15,
            clique_epoch: 30_000,
            gas_limit: "8000000".into(),
            difficulty: "1".into(),
            min_balance_eth: 100_000,
            max_balance_eth: 200_000,
        }
    }
}

/// Container and node launch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub network_id: u64,
    /// Host port published for the node's HTTP-RPC endpoint.
    pub http_port: u16,
    /// Upper bound on waiting for the node to answer RPC before the
    /// validator proposal is sent anyway.
    pub readiness_timeout_secs: u64,
    pub readiness_poll_ms: u64,
    /// Upstream image pulled and tagged as `geth:pow`.
    pub pow_image: String,
    /// Upstream image pulled and tagged as `geth:pos`.
    pub pos_image: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            network_id: 12345,
            http_port: 8545,
            readiness_timeout_secs: 30,
            readiness_poll_ms: 500,
            pow_image: "ethereum/client-go:v1.10.26".into(),
            pos_image: "ethereum/client-go:v1.13.8".into(),
        }
    }
}

impl NodeSettings {
    /// Upstream image for the given mode.
    pub fn upstream_image(&self, mode: Mode) -> &str {
        match mode {
            Mode::Pow => &self.pow_image,
            Mode::Pos => &self.pos_image,
        }
    }
}

/// Smoke-test transfer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeSettings {
    /// Key that signs the test transfer. Devnet-only funds.
    pub sender_key: String,
    pub recipient: String,
    /// Amount in ether, as a decimal string.
    pub value_eth: String,
    pub gas_limit: u64,
}

impl Default for SmokeSettings {
    fn default() -> Self {
        Self {
            sender_key: "0x739fbd2341afef96bc9eb223c2bb7a657f66093faf848c2e3794a24990e77c98"
                .into(),
            recipient: "0xe136eADEd3e05D98CeFd285E82F173C3132703C5".into(),
            value_eth: "0.1".into(),
            gas_limit: 2_000_000,
        }
    }
}

// ---------------------------------------------------------------------------
// DevnetConfig
// ---------------------------------------------------------------------------

/// Operator configuration, read from `devnet.toml`.
///
/// Every field has a default, so a partial file (or no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    /// Shared directory for `accounts.json`, per-mode chain data and logs.
    pub data_dir: PathBuf,
    /// Number of accounts `devnet genesis` creates.
    pub account_count: usize,
    pub docker_path: String,
    pub rpc_url: String,

    pub genesis: GenesisSettings,
    pub node: NodeSettings,
    pub smoke: SmokeSettings,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            account_count: 100,
            docker_path: "docker".into(),
            rpc_url: "http://127.0.0.1:8545".into(),
            genesis: GenesisSettings::default(),
            node: NodeSettings::default(),
            smoke: SmokeSettings::default(),
        }
    }
}

impl DevnetConfig {
    /// Path of the shared account list.
    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }

    /// Endpoint of the locally launched node, on its published host port.
    ///
    /// `rpc_url` may point elsewhere; readiness and status checks of the
    /// container always go through this one.
    pub fn node_rpc_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.node.http_port)
    }

    /// Directory receiving rolling log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings that would only fail later, halfway through a run.
    pub fn validate(&self) -> Result<(), DevnetError> {
        if self.account_count == 0 {
            return Err(DevnetError::Config("account_count must be at least 1".into()));
        }
        if !validate_url(&self.rpc_url) {
            return Err(DevnetError::Config(format!("invalid rpc_url: {}", self.rpc_url)));
        }
        if self.genesis.min_balance_eth == 0
            || self.genesis.min_balance_eth >= self.genesis.max_balance_eth
        {
            return Err(DevnetError::Config(format!(
                "balance range [{}, {}) is empty or starts at zero",
                self.genesis.min_balance_eth, self.genesis.max_balance_eth
            )));
        }
        if self.docker_path.trim().is_empty() {
            return Err(DevnetError::Config("docker_path is empty".into()));
        }
        Ok(())
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}
