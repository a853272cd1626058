// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Protocol Configuration & Constants
//!
//! Every tunable number in minichain lives here, together with the
//! [`NodeConfig`] a node is started from.
//!
//! `NodeConfig` is plain serde data. The binary fills it from CLI flags and
//! environment variables, optionally layered over a JSON file loaded with
//! [`NodeConfig::from_json_file`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::keys::{KeyError, PrivateKey};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version advertised in `Status` replies.
pub const PROTOCOL_VERSION: &str = "0.0.1";

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Interval between validator block productions.
pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(5);

/// [`DEFAULT_BLOCK_TIME`] as milliseconds, for serde defaults.
pub const DEFAULT_BLOCK_TIME_MS: u64 = 5_000;

/// How long a dial to a seed may take before it is given up.
pub const PEER_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Wire and Channel Limits
// ---------------------------------------------------------------------------

/// Largest frame a TCP peer may send. Bigger frames close the connection.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Capacity of each transport's inbound RPC queue.
pub const RPC_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid validator key: {0}")]
    ValidatorKey(#[from] KeyError),

    #[error("block time must be positive")]
    ZeroBlockTime,
}

/// Everything needed to start a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier reported in `Status`. Defaults to the listen address.
    pub node_id: Option<String>,

    pub listen_addr: String,

    /// Peers dialed at startup. Failures are logged and skipped.
    pub seeds: Vec<String>,

    /// Hex Ed25519 secret. Its presence makes this node the validator.
    pub validator_key: Option<String>,

    pub block_time_ms: u64,

    /// Drop mempool entries that arrive inside a block from the network.
    pub evict_mined_transactions: bool,

    /// Status and metrics HTTP endpoint. `None` disables it.
    pub api_addr: Option<String>,

    /// sled directory for blocks. `None` keeps blocks in memory.
    pub data_dir: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            seeds: Vec::new(),
            validator_key: None,
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            evict_mined_transactions: false,
            api_addr: Some(DEFAULT_API_ADDR.to_string()),
            data_dir: None,
        }
    }
}

impl NodeConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_time_ms == 0 {
            return Err(ConfigError::ZeroBlockTime);
        }
        self.validator()?;
        Ok(())
    }

    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| self.listen_addr.clone())
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    /// The parsed validator key, if one is configured.
    pub fn validator(&self) -> Result<Option<PrivateKey>, ConfigError> {
        self.validator_key
            .as_deref()
            .map(PrivateKey::from_hex)
            .transpose()
            .map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.block_time(), DEFAULT_BLOCK_TIME);
        assert!(!cfg.evict_mined_transactions);
        assert_eq!(cfg.node_id(), DEFAULT_LISTEN_ADDR);
        assert!(cfg.validator().unwrap().is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let key = PrivateKey::from_seed(&[4u8; 32]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"listen_addr": "0.0.0.0:4000", "seeds": ["10.0.0.2:4000"], "validator_key": "{}"}}"#,
            key.to_hex()
        )
        .unwrap();

        let cfg = NodeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:4000");
        assert_eq!(cfg.seeds, vec!["10.0.0.2:4000".to_string()]);
        assert_eq!(cfg.block_time_ms, DEFAULT_BLOCK_TIME_MS);
        assert_eq!(
            cfg.validator().unwrap().map(|k| k.public_key()),
            Some(key.public_key())
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        let cfg = NodeConfig {
            block_time_ms: 0,
            ..NodeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroBlockTime)));

        let cfg = NodeConfig {
            validator_key: Some("nothex".into()),
            ..NodeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidatorKey(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = NodeConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
