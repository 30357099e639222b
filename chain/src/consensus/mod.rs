//! Weighted-quorum vote broadcast and tallying.
//!
//! - [`config::ConsensusConfig`] — threshold and timeout parameters.
//! - [`coordinator::VotingCoordinator`] — broadcasts local confirmations,
//!   tallies incoming votes, resolves rounds.
//! - [`error::ConsensusError`] — errors surfaced by the above.

pub mod config;
pub mod coordinator;
pub mod error;

pub use config::ConsensusConfig;
pub use coordinator::{VoteOutcome, VotingCoordinator};
pub use error::ConsensusError;
