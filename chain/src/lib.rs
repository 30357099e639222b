//! Block-lattice ledger core.
//!
//! This crate provides the building blocks for a peer-to-peer
//! cryptocurrency-style ledger node:
//!
//! - strongly-typed domain types (`types`): addresses, block ids,
//!   amounts, blocks, peers, vote rounds.
//! - ECDSA signing/verification over the wire protocol's address and
//!   signature encodings (`crypto`).
//! - per-account append-only block storage (`storage`).
//! - single-block and whole-ledger recursive validation (`validation`).
//! - per-request dispatch: send/receive/open/balance/pending (`state_machine`).
//! - weighted-quorum vote broadcast and tallying (`consensus`).
//! - peer discovery, liveness, and send-subscriptions (`peers`).
//! - whole-ledger snapshot transfer for new joiners (`sync`).
//! - the wire-level JSON request/response schema (`protocol`).
//! - Prometheus-based metrics (`metrics`).
//! - top-level node configuration (`config`).
//!
//! `node` composes these into a running process.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod metrics;
pub mod peers;
pub mod protocol;
pub mod state_machine;
pub mod storage;
pub mod sync;
pub mod types;
pub mod validation;

pub use config::ChainConfig;
pub use consensus::{ConsensusConfig, ConsensusError, VoteOutcome, VotingCoordinator};
pub use crypto::{CryptoError, KeyPair};
pub use metrics::{LedgerMetrics, MetricsRegistry, run_prometheus_http_server};
pub use peers::{PeerLink, PeerRegistry, Subscriptions};
pub use protocol::{Request, Response};
pub use state_machine::StateMachine;
pub use storage::{BlockStore, FileBlockStore, InMemoryBlockStore, StorageError};
pub use validation::{LedgerVerifier, RejectionReason, ValidationError, verify_ledger};

// Re-export domain types at the crate root for convenience.
pub use types::*;
