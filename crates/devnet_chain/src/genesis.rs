//! Genesis file synthesis for both network modes.
//!
//! PoW genesis carries an empty `ethash` section; PoS genesis carries a
//! `clique` section plus `extradata` naming the first account as the sole
//! initial signer. Both allocate a random balance to every account.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use alloy::primitives::U256;
use anyhow::{Context, Result};
use devnet_core::{DevnetError, GenesisSettings, Mode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::account::{Account, AccountStore};

/// Clique vanity prefix length in hex characters (32 bytes).
const EXTRADATA_VANITY_HEX: usize = 64;
/// Clique seal suffix length in hex characters (65 bytes).
const EXTRADATA_SEAL_HEX: usize = 130;

/// One ether in wei.
fn wei_per_ether() -> U256 {
    U256::from(10u64).pow(U256::from(18u64))
}

// ---------------------------------------------------------------------------
// Genesis schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthashConfig {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliqueConfig {
    pub period: u64,
    pub epoch: u64,
}

/// The `config` object: chain id and fork activations (all at block zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub homestead_block: u64,
    pub eip150_block: u64,
    pub eip155_block: u64,
    pub eip158_block: u64,
    pub byzantium_block: u64,
    pub constantinople_block: u64,
    pub petersburg_block: u64,
    pub istanbul_block: u64,
    pub berlin_block: u64,
    pub london_block: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethash: Option<EthashConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clique: Option<CliqueConfig>,
}

impl ChainConfig {
    fn all_forks_at_genesis(chain_id: u64) -> Self {
        Self {
            chain_id,
            homestead_block: 0,
            eip150_block: 0,
            eip155_block: 0,
            eip158_block: 0,
            byzantium_block: 0,
            constantinople_block: 0,
            petersburg_block: 0,
            istanbul_block: 0,
            berlin_block: 0,
            london_block: 0,
            ethash: None,
            clique: None,
        }
    }
}

/// Starting balance of one allocated address, in wei as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAlloc {
    pub balance: String,
}

/// A geth `genesis.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfig {
    pub config: ChainConfig,
    pub difficulty: String,
    pub gas_limit: String,
    #[serde(
        rename = "extradata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extra_data: Option<String>,
    pub alloc: BTreeMap<String, GenesisAlloc>,
}

impl GenesisConfig {
    pub fn is_clique(&self) -> bool {
        self.config.clique.is_some()
    }

    /// Write the document as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize genesis")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Knobs for genesis synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisParams {
    pub chain_id: u64,
    pub clique_period: u64,
    pub clique_epoch: u64,
    pub gas_limit: String,
    pub difficulty: String,
    /// Inclusive lower bound of the balance draw, in ether.
    pub min_balance_eth: u64,
    /// Exclusive upper bound of the balance draw, in ether.
    pub max_balance_eth: u64,
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self::from(&GenesisSettings::default())
    }
}

impl From<&GenesisSettings> for GenesisParams {
    fn from(settings: &GenesisSettings) -> Self {
        Self {
            chain_id: settings.chain_id,
            clique_period: settings.clique_period,
            clique_epoch: settings.clique_epoch,
            gas_limit: settings.gas_limit.clone(),
            difficulty: settings.difficulty.clone(),
            min_balance_eth: settings.min_balance_eth,
            max_balance_eth: settings.max_balance_eth,
        }
    }
}

/// Clique `extradata` electing `validator` as the sole initial signer.
pub fn clique_extradata(validator: &Account) -> String {
    format!(
        "0x{}{}{}",
        "0".repeat(EXTRADATA_VANITY_HEX),
        validator.address_hex(),
        "0".repeat(EXTRADATA_SEAL_HEX)
    )
}

/// Build a genesis document with default parameters and thread-local randomness.
pub fn create_genesis(accounts: &[Account], mode: Mode) -> Result<GenesisConfig, DevnetError> {
    create_genesis_with(accounts, mode, &GenesisParams::default(), &mut rand::rng())
}

/// Build a genesis document for `mode`.
///
/// Fails when PoS has no account to elect as validator, when an address
/// appears twice, or when the balance range is empty or admits zero.
pub fn create_genesis_with<R: Rng>(
    accounts: &[Account],
    mode: Mode,
    params: &GenesisParams,
    rng: &mut R,
) -> Result<GenesisConfig, DevnetError> {
    if params.min_balance_eth == 0 || params.min_balance_eth >= params.max_balance_eth {
        return Err(DevnetError::Config(format!(
            "balance range [{}, {}) is empty or starts at zero",
            params.min_balance_eth, params.max_balance_eth
        )));
    }

    let mut config = ChainConfig::all_forks_at_genesis(params.chain_id);
    let extra_data = match mode {
        Mode::Pow => {
            config.ethash = Some(EthashConfig::default());
            None
        }
        Mode::Pos => {
            let validator = accounts
                .first()
                .ok_or_else(|| DevnetError::EmptyAccounts(mode.to_string()))?;
            config.clique = Some(CliqueConfig {
                period: params.clique_period,
                epoch: params.clique_epoch,
            });
            Some(clique_extradata(validator))
        }
    };

    let mut seen = HashSet::with_capacity(accounts.len());
    let mut alloc = BTreeMap::new();
    for account in accounts {
        if !seen.insert(account.address.to_lowercase()) {
            return Err(DevnetError::DuplicateAddress(account.address.clone()));
        }
        let whole_ether = rng.random_range(params.min_balance_eth..params.max_balance_eth);
        let balance = U256::from(whole_ether) * wei_per_ether();
        alloc.insert(
            account.address.clone(),
            GenesisAlloc {
                balance: balance.to_string(),
            },
        );
    }

    Ok(GenesisConfig {
        config,
        difficulty: params.difficulty.clone(),
        gas_limit: params.gas_limit.clone(),
        extra_data,
        alloc,
    })
}

/// Create `<data_dir>/{pow,pos}`, then write `accounts.json` and one genesis
/// file per mode. Any failed write aborts and is returned to the caller.
pub fn write_genesis_files(
    data_dir: &Path,
    accounts: &[Account],
    params: &GenesisParams,
) -> Result<()> {
    for mode in Mode::ALL {
        let dir = mode.data_dir(data_dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    AccountStore::new(accounts.to_vec()).save(&data_dir.join("accounts.json"))?;

    let mut rng = rand::rng();
    for mode in Mode::ALL {
        let genesis = create_genesis_with(accounts, mode, params, &mut rng)?;
        let path = mode.genesis_path(data_dir);
        genesis.save(&path)?;
        info!(mode = %mode, path = %path.display(), alloc = genesis.alloc.len(), "genesis written");
    }
    Ok(())
}
