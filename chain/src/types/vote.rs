//! In-flight weighted-quorum vote round state.

use super::{Address, Block};
use std::collections::HashMap;
use std::time::Instant;

/// Tracks tallies for a single block's confirmation vote.
///
/// A round is opened when `VotingCoordinator::broadcast` sends a
/// candidate block to every live peer, and is closed either by reaching
/// `threshold` summed weight of `approve` tallies, or by timing out
/// (see `consensus::config::ConsensusConfig::vote_round_timeout`).
#[derive(Clone, Debug)]
pub struct VoteRound {
    pub vote_id: String,
    pub subject: Block,
    /// Summed weight of live peers required to approve before the round
    /// is considered confirmed (`consensus_percent` of live peer weight
    /// at round-open time).
    pub threshold: u64,
    /// Per-peer vote, keyed by the peer's advertised address (not URL):
    /// `true` for approve, `false` for reject.
    pub tallies: HashMap<Address, bool>,
    /// Summed weight of `tallies` entries, kept incrementally so tally
    /// checks don't need to recompute a weight lookup every time.
    pub approve_weight: u64,
    pub reject_weight: u64,
    /// When this round was opened, for timing `vote_round_seconds` once
    /// it resolves.
    pub started_at: Instant,
}

impl VoteRound {
    pub fn new(vote_id: String, subject: Block, threshold: u64) -> Self {
        VoteRound {
            vote_id,
            subject,
            threshold,
            tallies: HashMap::new(),
            approve_weight: 0,
            reject_weight: 0,
            started_at: Instant::now(),
        }
    }

    /// Records one peer's vote. Returns `false` if this address already
    /// voted in this round (duplicate votes are ignored, not re-tallied).
    pub fn record(&mut self, voter: Address, weight: u32, approve: bool) -> bool {
        if self.tallies.contains_key(&voter) {
            return false;
        }
        self.tallies.insert(voter, approve);
        if approve {
            self.approve_weight += weight as u64;
        } else {
            self.reject_weight += weight as u64;
        }
        true
    }

    pub fn is_confirmed(&self) -> bool {
        self.approve_weight >= self.threshold
    }

    pub fn is_rejected(&self) -> bool {
        self.reject_weight >= self.threshold
    }

    pub fn is_resolved(&self) -> bool {
        self.is_confirmed() || self.is_rejected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, BlockId, BlockType};
    use rust_decimal::Decimal;

    fn sample_block() -> Block {
        Block {
            kind: BlockType::Send,
            address: Address("A".into()),
            id: BlockId("00000000000000000001".into()),
            previous: BlockId::zero(),
            balance: Amount(Decimal::new(10, 0)),
            link: "B".into(),
            signature: Some("sig".into()),
        }
    }

    #[test]
    fn duplicate_vote_from_same_peer_is_ignored() {
        let mut round = VoteRound::new("v1".into(), sample_block(), 10);
        assert!(round.record(Address("peer1".into()), 5, true));
        assert!(!round.record(Address("peer1".into()), 5, true));
        assert_eq!(round.approve_weight, 5);
    }

    #[test]
    fn confirms_once_threshold_reached() {
        let mut round = VoteRound::new("v1".into(), sample_block(), 10);
        assert!(!round.is_confirmed());
        round.record(Address("peer1".into()), 6, true);
        assert!(!round.is_confirmed());
        round.record(Address("peer2".into()), 6, true);
        assert!(round.is_confirmed());
    }
}
