//! Node process configuration: environment overrides on top of
//! `chain::ChainConfig`'s defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use chain::ChainConfig;

fn env_u16(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name).map(PathBuf::from).unwrap_or(default)
}

/// Builds a [`ChainConfig`] from defaults overridden by environment
/// variables, mirroring the original process's reliance on env vars
/// and a working-directory-relative `Accounts/` folder and key files.
///
/// Recognized variables: `NODE_PRIMARY_PORT`, `NODE_FALLBACK_PORT`,
/// `NODE_LEDGER_DIR`, `NODE_PUBLIC_KEY_PATH`, `NODE_PRIVATE_KEY_PATH`,
/// `NODE_ENTRYPOINTS` (comma-separated URLs), `NODE_METRICS_ADDR`.
pub fn load_chain_config() -> ChainConfig {
    let mut cfg = ChainConfig::default();

    cfg.network.primary_port = env_u16("NODE_PRIMARY_PORT", cfg.network.primary_port);
    cfg.network.fallback_port = env_u16("NODE_FALLBACK_PORT", cfg.network.fallback_port);
    cfg.storage.base_dir = env_path("NODE_LEDGER_DIR", cfg.storage.base_dir);
    cfg.keys.public_key_path = env_path("NODE_PUBLIC_KEY_PATH", cfg.keys.public_key_path);
    cfg.keys.private_key_path = env_path("NODE_PRIVATE_KEY_PATH", cfg.keys.private_key_path);

    if let Ok(list) = std::env::var("NODE_ENTRYPOINTS") {
        cfg.network.entrypoints = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Ok(addr) = std::env::var("NODE_METRICS_ADDR") {
        if let Ok(parsed) = addr.parse::<SocketAddr>() {
            cfg.metrics.listen_addr = parsed;
        }
    }

    cfg
}
