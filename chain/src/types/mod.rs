//! Core domain types for the block-lattice ledger.
//!
//! This module defines strongly-typed account addresses, block
//! identifiers, and balances so the rest of the crate never passes
//! naked `String`/`f64` values across API boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod block;
pub mod peer;
pub mod vote;

pub use block::{Block, BlockType, G0};
pub use peer::Peer;
pub use vote::VoteRound;

/// Number of decimal digits in a [`BlockId`].
pub const BLOCK_ID_LEN: usize = 20;

/// Account identifier.
///
/// Per the protocol, an account's address *is* its ECDSA public key,
/// carried as the space-separated PEM body used throughout the wire
/// protocol (header/footer stripped, internal newlines replaced by
/// spaces). This is not a hash of the key: `Crypto::verify` is called
/// with the address directly as the public key material.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

/// A 20-character, zero-padded decimal block (or vote-round) identifier.
///
/// Uniqueness is only required within a single account's chain
/// (the anti-fork rule forbids two blocks in the same chain from
/// sharing a `previous`; `BlockId` uniqueness is just the wire encoding).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl BlockId {
    /// The sentinel `previous` value for the first block of any chain.
    pub fn zero() -> Self {
        BlockId("0".repeat(BLOCK_ID_LEN))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0".repeat(BLOCK_ID_LEN)
    }

    /// Generates a fresh random 20-digit decimal id.
    ///
    /// Mirrors the original node's `voteID`/block-id generation: a
    /// random non-negative integer, zero-padded on the left to
    /// [`BLOCK_ID_LEN`] digits.
    pub fn random() -> Self {
        use rand::Rng;
        let n: u64 = rand::thread_rng().gen_range(0..10_u64.pow(18));
        BlockId(format!("{n:0width$}", width = BLOCK_ID_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-negative rational account balance / transfer amount.
///
/// Backed by [`rust_decimal::Decimal`] for exact arithmetic (the
/// original implementation compared IEEE-754 `float` balances
/// directly, which is unsound for a ledger; see DESIGN.md). Serialized
/// as a JSON string, matching the wire-level `"balance": "10.5"` shape
/// used by the original's `balance` response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(#[serde(with = "rust_decimal::serde::str")] pub rust_decimal::Decimal);

impl Amount {
    pub fn zero() -> Self {
        Amount(rust_decimal::Decimal::ZERO)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
