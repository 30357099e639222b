//! Top-level configuration for a ledger node.
//!
//! Aggregates configuration for:
//!
//! - storage (where account chain files live),
//! - the node's signing key pair (PEM file paths),
//! - consensus parameters (`ConsensusConfig`),
//! - networking (ports, fallback, entrypoints, public-IP discovery),
//! - the metrics exporter (enable flag + listen address).
//!
//! `node`'s binary constructs a `ChainConfig` from defaults overridden
//! by environment variables; see `node::config` for that layer.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::consensus::ConsensusConfig;

/// Where account chain files are persisted.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Directory holding one `Accounts/{hash}.jsonl` file per account.
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("Accounts"),
        }
    }
}

/// Paths to this node's own signing keypair, PEM-encoded.
#[derive(Clone, Debug)]
pub struct KeyConfig {
    pub public_key_path: PathBuf,
    pub private_key_path: PathBuf,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            public_key_path: PathBuf::from("public_key.pem"),
            private_key_path: PathBuf::from("private_key.pem"),
        }
    }
}

/// Networking: ports, fallback behavior, and bootstrap peers.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Client + peer JSON/WebSocket control port.
    pub primary_port: u16,
    /// Used instead of `primary_port` if another node already answers
    /// there on this host's public IP.
    pub fallback_port: u16,
    /// Hardcoded bootstrap URL list; any reachable one is contacted in
    /// order until peer discovery succeeds.
    pub entrypoints: Vec<String>,
    /// Endpoint used to discover this node's own public IP.
    pub ipify_url: String,
}

impl NetworkConfig {
    /// Ledger-sync port, always `primary_port + 1` (or `fallback_port + 1`
    /// if the node fell back).
    pub fn sync_port(&self) -> u16 {
        self.primary_port + 1
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            primary_port: 6969,
            fallback_port: 5858,
            entrypoints: Vec::new(),
            ipify_url: "https://api.ipify.org".to_string(),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a ledger node.
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub storage: StorageConfig,
    pub keys: KeyConfig,
    pub consensus: ConsensusConfig,
    pub network: NetworkConfig,
    pub metrics: MetricsConfig,
}
