use std::time::Duration;

/// Weighted-quorum voting parameters.
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Fraction of live-peer weight that must approve (or reject) a
    /// block for its vote round to resolve.
    pub consensus_percent: f64,
    /// How long to wait for a peer's ack after sending it a vote packet.
    pub vote_ack_timeout: Duration,
    /// How long to wait for a peer's `ping` reply during live-set
    /// discovery at the start of a vote round.
    pub peer_liveness_timeout: Duration,
    /// How long an open vote round may stay unresolved before it is
    /// abandoned.
    pub vote_round_timeout: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            consensus_percent: 0.65,
            vote_ack_timeout: Duration::from_secs(5),
            peer_liveness_timeout: Duration::from_secs(3),
            vote_round_timeout: Duration::from_secs(15),
        }
    }
}
