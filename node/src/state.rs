//! Shared application state for the node's request router.

use std::collections::HashSet;
use std::sync::Arc;

use chain::{
    ChainConfig, FileBlockStore, KeyPair, MetricsRegistry, PeerRegistry, StateMachine,
    Subscriptions, VotingCoordinator,
};

/// Everything a connection handler needs to answer a request.
pub struct AppState {
    pub config: ChainConfig,
    pub store: Arc<FileBlockStore>,
    pub state_machine: StateMachine,
    pub peers: Arc<PeerRegistry>,
    pub subscriptions: Arc<Subscriptions>,
    pub coordinator: Arc<VotingCoordinator>,
    pub keys: KeyPair,
    pub metrics: Arc<MetricsRegistry>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Builds the self-identification URL set used for peer
    /// self-detection: localhost, loopback, and (if known) the node's
    /// public IP, each combined with its listening port.
    pub fn self_urls(port: u16, public_ip: Option<&str>) -> HashSet<String> {
        let mut urls = HashSet::new();
        urls.insert(format!("ws://localhost:{port}"));
        urls.insert(format!("ws://127.0.0.1:{port}"));
        if let Some(ip) = public_ip {
            urls.insert(format!("ws://{ip}:{port}"));
        }
        urls
    }
}
