pub mod config;
pub mod error;
pub mod logging;
pub mod mode;

pub use config::{DevnetConfig, GenesisSettings, NodeSettings, SmokeSettings, validate_url};
pub use error::DevnetError;
pub use mode::Mode;
