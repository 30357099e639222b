//! A known remote node, as tracked by the peer registry.

use serde::{Deserialize, Serialize};

/// One entry in a node's peer table.
///
/// `weight` drives the quorum threshold in vote tallying: a vote round
/// is decided once the summed weight of peers voting one way crosses
/// `consensus_percent` of the summed weight of all `live` peers at the
/// time the round opened (see `consensus::config::ConsensusConfig`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peer {
    /// `ws://host:port` (or `http://host:port` for the legacy registration
    /// handshake) address of the remote node.
    pub url: String,
    /// Whether the most recent liveness probe succeeded.
    pub live: bool,
    /// Voting weight. Nodes default to `1` unless configured otherwise;
    /// the protocol does not currently expose a way to change a peer's
    /// own advertised weight, so this is locally assigned.
    pub weight: u32,
}

impl Peer {
    pub fn new(url: impl Into<String>) -> Self {
        Peer {
            url: url.into(),
            live: true,
            weight: 1,
        }
    }
}
