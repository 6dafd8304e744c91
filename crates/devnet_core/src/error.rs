use thiserror::Error;

/// Errors with a meaning callers branch on.
///
/// Everything else travels as `anyhow::Error` with context attached.
#[derive(Error, Debug)]
pub enum DevnetError {
    #[error("Invalid mode '{0}': expected 'pow' or 'pos'")]
    InvalidMode(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("No accounts available: {0} mode needs at least one account")]
    EmptyAccounts(String),

    #[error("Duplicate address in account list: {0}")]
    DuplicateAddress(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Docker command failed ({status}): {stderr}")]
    Docker { status: String, stderr: String },
}

impl DevnetError {
    /// Whether the failure concerns a single item of a batch and the batch
    /// may continue past it.
    pub fn is_per_item(&self) -> bool {
        matches!(self, Self::InvalidPrivateKey(_) | Self::Docker { .. })
    }
}
