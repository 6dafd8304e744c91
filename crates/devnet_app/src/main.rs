//! `devnet` - set up and drive a local PoW or PoS Ethereum network in Docker.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use devnet_core::config::{DEFAULT_CONFIG_FILE, DevnetConfig};
use devnet_core::{Mode, logging};
use tracing::debug;

mod commands;

/// Local Ethereum devnet tooling
#[derive(Parser, Debug)]
#[command(name = "devnet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: ./devnet.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate accounts and the PoW/PoS genesis files
    Genesis {
        /// Number of accounts (overrides `account_count`)
        #[arg(short, long)]
        accounts: Option<usize>,
    },

    /// Import every generated key into a mode's keystore
    Import {
        #[arg(value_name = "pow|pos")]
        mode: Mode,
    },

    /// Initialize chain data and start the node container
    Start {
        #[arg(value_name = "pow|pos")]
        mode: Mode,
    },

    /// Stop and remove the node container
    Stop {
        #[arg(value_name = "pow|pos")]
        mode: Mode,
    },

    /// Show whether the node container exists and is running
    Status {
        #[arg(value_name = "pow|pos")]
        mode: Mode,
    },

    /// Query the node over RPC, optionally sending a test transfer
    Smoke {
        /// Sign and submit one transfer from the configured sender
        #[arg(long)]
        send: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and are not failures.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = match DevnetConfig::load_from_path(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    let filter = logging::filter_for_verbosity(cli.verbose);
    let _guard = match logging::init_logging(&config.logs_dir(), filter) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {e:#}");
            None
        }
    };
    debug!(config = %config_path.display(), "configuration loaded");

    let result = match cli.command {
        Commands::Genesis { accounts } => commands::genesis(&config, accounts),
        Commands::Import { mode } => commands::import(&config, mode).await,
        Commands::Start { mode } => commands::start(&config, mode).await,
        Commands::Stop { mode } => commands::stop(&config, mode).await,
        Commands::Status { mode } => commands::status(&config, mode).await,
        Commands::Smoke { send } => commands::smoke(&config, send).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_mode_commands() {
        let cli = Cli::try_parse_from(["devnet", "start", "pos"]).unwrap();
        assert!(matches!(cli.command, Commands::Start { mode: Mode::Pos }));

        let cli = Cli::try_parse_from(["devnet", "import", "pow"]).unwrap();
        assert!(matches!(cli.command, Commands::Import { mode: Mode::Pow }));
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = Cli::try_parse_from(["devnet", "start", "poa"]).unwrap_err();
        assert!(err.use_stderr());
        assert!(err.to_string().contains("poa"));
    }

    #[test]
    fn rejects_missing_mode() {
        assert!(Cli::try_parse_from(["devnet", "stop"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["devnet", "smoke", "--send", "-vv", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Commands::Smoke { send: true }));
    }

    #[test]
    fn genesis_account_override() {
        let cli = Cli::try_parse_from(["devnet", "genesis", "--accounts", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Genesis { accounts: Some(3) }
        ));
    }

    #[test]
    fn help_is_not_an_error_exit() {
        let err = Cli::try_parse_from(["devnet", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }
}
