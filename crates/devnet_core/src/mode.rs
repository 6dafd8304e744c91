use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DevnetError;

/// Consensus flavour of the local network.
///
/// The mode only selects which genesis file, image tag, container and
/// launch flags are used. Consensus itself runs inside the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Pow,
    Pos,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Pow, Mode::Pos];

    /// Lowercase name used in paths, tags and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Pow => "pow",
            Mode::Pos => "pos",
        }
    }

    /// Local image tag the node runs from, e.g. `geth:pos`.
    pub fn image_tag(&self) -> String {
        format!("geth:{}", self.as_str())
    }

    /// Name of the long-running node container, e.g. `geth-pos`.
    pub fn container_name(&self) -> String {
        format!("geth-{}", self.as_str())
    }

    /// Chain-data directory for this mode under the shared data directory.
    pub fn data_dir(&self, base: &Path) -> PathBuf {
        base.join(self.as_str())
    }

    /// Path of the genesis file for this mode.
    pub fn genesis_path(&self, base: &Path) -> PathBuf {
        self.data_dir(base).join("genesis.json")
    }

    /// RPC namespaces exposed over HTTP.
    pub fn http_api(&self) -> &'static str {
        match self {
            Mode::Pow => "eth,net,web3,personal,miner",
            Mode::Pos => "eth,net,web3,personal",
        }
    }

    pub fn is_pos(&self) -> bool {
        matches!(self, Mode::Pos)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = DevnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pow" => Ok(Mode::Pow),
            "pos" => Ok(Mode::Pos),
            other => Err(DevnetError::InvalidMode(other.to_string())),
        }
    }
}
