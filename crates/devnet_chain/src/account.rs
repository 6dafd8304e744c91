use std::path::Path;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use devnet_core::DevnetError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Length of a bare hex-encoded secp256k1 secret key.
const PRIVATE_KEY_HEX_LEN: usize = 64;

/// A devnet account: checksummed address plus its hex private key.
///
/// Both fields are `0x`-prefixed. The shape matches what `geth account import`
/// consumers and the other commands read back from `accounts.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub private_key: String,
}

impl Account {
    /// Build an account record from a local signer.
    pub fn from_signer(signer: &PrivateKeySigner) -> Self {
        Self {
            address: signer.address().to_checksum(None),
            private_key: format!("0x{}", hex::encode(signer.to_bytes())),
        }
    }

    /// Address hex digits without the `0x` prefix, case preserved.
    pub fn address_hex(&self) -> &str {
        self.address.strip_prefix("0x").unwrap_or(&self.address)
    }

    /// Parsed address.
    pub fn parsed_address(&self) -> Result<Address> {
        self.address
            .parse::<Address>()
            .with_context(|| format!("invalid account address: {}", self.address))
    }

    /// Rebuild the signer from the stored private key.
    pub fn signer(&self) -> Result<PrivateKeySigner, DevnetError> {
        parse_signer(&self.private_key)
    }
}

/// Generate `count` accounts from fresh random keys.
pub fn create_accounts(count: usize) -> Vec<Account> {
    (0..count)
        .map(|_| Account::from_signer(&PrivateKeySigner::random()))
        .collect()
}

/// Normalize a private key for import: trim whitespace, drop an optional `0x`
/// prefix, and require exactly 64 hex characters. Returns lowercase hex.
pub fn clean_private_key(raw: &str) -> Result<String, DevnetError> {
    let trimmed = raw.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if bare.len() != PRIVATE_KEY_HEX_LEN {
        return Err(DevnetError::InvalidPrivateKey(format!(
            "expected {PRIVATE_KEY_HEX_LEN} hex characters, got {}",
            bare.len()
        )));
    }
    if !bare.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DevnetError::InvalidPrivateKey(
            "contains non-hex characters".into(),
        ));
    }
    Ok(bare.to_ascii_lowercase())
}

/// Parse a hex private key (with or without `0x`) into a local signer.
pub fn parse_signer(raw: &str) -> Result<PrivateKeySigner, DevnetError> {
    let bare = clean_private_key(raw)?;
    let bytes = hex::decode(&bare).map_err(|e| DevnetError::InvalidPrivateKey(e.to_string()))?;
    PrivateKeySigner::from_bytes(&B256::from_slice(&bytes))
        .map_err(|e| DevnetError::InvalidPrivateKey(e.to_string()))
}

// ---------------------------------------------------------------------------
// AccountStore
// ---------------------------------------------------------------------------

/// The shared account list, persisted as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountStore {
    accounts: Vec<Account>,
}

impl AccountStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// The account that mines and, in PoS mode, becomes the first validator.
    pub fn first(&self) -> Option<&Account> {
        self.accounts.first()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Persist the account list to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize accounts")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;

        // The file holds raw private keys; keep it owner-only on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .context("failed to set accounts file permissions")?;
        }

        info!(path = %path.display(), count = self.accounts.len(), "accounts saved");
        Ok(())
    }

    /// Load the account list from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).with_context(|| {
            format!(
                "failed to read {} (run `devnet genesis` first)",
                path.display()
            )
        })?;
        let store: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), count = store.accounts.len(), "accounts loaded");
        Ok(store)
    }
}
