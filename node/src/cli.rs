// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CLI Interface
//!
//! Defines the command-line argument structure for `minichain-node` using
//! `clap` derive. Three subcommands: `run`, `keygen` and `version`.
//!
//! Every `run` flag has a `MINICHAIN_*` environment fallback. Flags and
//! variables override the JSON file given with `--config`, which in turn
//! overrides the built-in defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use minichain_protocol::config::{ConfigError, NodeConfig};

use crate::logging::LogFormat;

/// minichain single-validator node.
#[derive(Parser, Debug)]
#[command(
    name = "minichain-node",
    about = "minichain single-validator blockchain node",
    version,
    propagate_version = true
)]
pub struct MinichainCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "MINICHAIN_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a node.
    Run(RunArgs),
    /// Generate a validator key pair and print it.
    Keygen,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// JSON configuration file. Flags below override its fields.
    #[arg(long, short = 'c', env = "MINICHAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Identifier reported to peers. Defaults to the listen address.
    #[arg(long, env = "MINICHAIN_NODE_ID")]
    pub node_id: Option<String>,

    /// TCP address for peer connections.
    #[arg(long, short = 'l', env = "MINICHAIN_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Peers to dial at startup, comma separated.
    #[arg(long, env = "MINICHAIN_SEEDS", value_delimiter = ',')]
    pub seeds: Vec<String>,

    /// Hex Ed25519 secret. Makes this node the block producer.
    #[arg(long, env = "MINICHAIN_VALIDATOR_KEY", hide_env_values = true)]
    pub validator_key: Option<String>,

    /// Interval between produced blocks, in milliseconds.
    #[arg(long, env = "MINICHAIN_BLOCK_TIME_MS")]
    pub block_time_ms: Option<u64>,

    /// Drop pending transactions that arrive inside a peer's block.
    #[arg(long, env = "MINICHAIN_EVICT_MINED")]
    pub evict_mined: bool,

    /// Address of the status and metrics HTTP endpoint.
    #[arg(long, env = "MINICHAIN_API_ADDR", conflicts_with = "no_api")]
    pub api_addr: Option<String>,

    /// Do not serve the HTTP endpoint.
    #[arg(long)]
    pub no_api: bool,

    /// Directory for the sled block store. Blocks stay in memory without it.
    #[arg(long, short = 'd', env = "MINICHAIN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl RunArgs {
    /// Layers the flags over the config file (or the defaults).
    pub fn node_config(self) -> Result<NodeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_json_file(path)?,
            None => NodeConfig::default(),
        };

        if self.node_id.is_some() {
            config.node_id = self.node_id;
        }
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if !self.seeds.is_empty() {
            config.seeds = self.seeds;
        }
        if self.validator_key.is_some() {
            config.validator_key = self.validator_key;
        }
        if let Some(ms) = self.block_time_ms {
            config.block_time_ms = ms;
        }
        if self.evict_mined {
            config.evict_mined_transactions = true;
        }
        if self.api_addr.is_some() {
            config.api_addr = self.api_addr;
        }
        if self.no_api {
            config.api_addr = None;
        }
        if self.data_dir.is_some() {
            config.data_dir = self.data_dir;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn verify_cli_structure() {
        MinichainCli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = MinichainCli::try_parse_from([
            "minichain-node",
            "--log-format",
            "json",
            "run",
            "--listen-addr",
            "0.0.0.0:4000",
            "--seeds",
            "10.0.0.1:4000,10.0.0.2:4000",
            "--block-time-ms",
            "1000",
            "--no-api",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.node_config().unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:4000");
        assert_eq!(config.seeds.len(), 2);
        assert_eq!(config.block_time_ms, 1000);
        assert_eq!(config.api_addr, None);
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"listen_addr": "127.0.0.1:5000", "block_time_ms": 750, "seeds": ["a:1"]}}"#
        )
        .unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            block_time_ms: Some(300),
            ..RunArgs::default()
        };
        let config = args.node_config().unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:5000");
        assert_eq!(config.block_time_ms, 300);
        assert_eq!(config.seeds, vec!["a:1".to_string()]);
    }

    #[test]
    fn invalid_key_is_rejected() {
        let args = RunArgs {
            validator_key: Some("zz".into()),
            ..RunArgs::default()
        };
        assert!(matches!(args.node_config(), Err(ConfigError::ValidatorKey(_))));
    }
}
