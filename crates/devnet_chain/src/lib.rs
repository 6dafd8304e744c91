// Accounts, genesis synthesis and the JSON-RPC side of the devnet.

pub mod account;
pub mod genesis;
pub mod rpc;
pub mod smoke;
pub mod transfer;

// Re-export primary types for convenient access.
pub use account::{Account, AccountStore, clean_private_key, create_accounts};
pub use genesis::{
    GenesisConfig, GenesisParams, create_genesis, create_genesis_with, write_genesis_files,
};
pub use rpc::RpcClient;
pub use smoke::{SmokeReport, run_report};
pub use transfer::{TransferRequest, send_transfer};
