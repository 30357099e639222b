//! Per-account block storage.
//!
//! Each account owns an independent, append-only chain of [`Block`]s.
//! Implementations provide an in-memory store ([`mem::InMemoryBlockStore`])
//! for tests and a newline-delimited-JSON file store
//! ([`file::FileBlockStore`]) for real nodes, one file per account.

pub mod file;
pub mod mem;

pub use file::FileBlockStore;
pub use mem::InMemoryBlockStore;

use crate::types::{Address, Block, BlockId};
use std::fmt;

#[derive(Debug)]
pub enum StorageError {
    /// The account has no chain yet.
    NoSuchAccount(Address),
    /// Underlying filesystem error, with the path that failed.
    Io { path: String, source: std::io::Error },
    /// A stored block failed to deserialize; the chain file is corrupt.
    Corrupt { address: Address, detail: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NoSuchAccount(addr) => write!(f, "no chain for account {addr}"),
            StorageError::Io { path, source } => write!(f, "I/O error at {path}: {source}"),
            StorageError::Corrupt { address, detail } => {
                write!(f, "corrupted chain for {address}: {detail}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Append-only, per-account block storage.
///
/// Every implementation must guarantee that `append` is the only
/// mutating operation, and that it rejects a block whose `previous`
/// does not match the account's current head (callers are expected to
/// have already validated the block; this is a last-line consistency
/// check, not the validation layer).
pub trait BlockStore: Send + Sync {
    /// Returns the most recently appended block for `address`, if any.
    fn head(&self, address: &Address) -> Option<Block>;

    /// Looks up one block by account and id, regardless of position.
    fn get(&self, address: &Address, id: &BlockId) -> Option<Block>;

    /// Returns `address`'s full chain, oldest (open) block first.
    fn chain(&self, address: &Address) -> Vec<Block>;

    /// Appends a new block to `address`'s chain.
    ///
    /// Returns [`StorageError`] if `block.previous` does not match the
    /// current head's id (or, for the first block, is not the zero id).
    fn append(&self, block: Block) -> Result<(), StorageError>;

    /// `true` if any blocks exist for `address`.
    fn exists(&self, address: &Address) -> bool {
        self.head(address).is_some()
    }

    /// Every account with at least one block.
    fn accounts(&self) -> Vec<Address>;
}
