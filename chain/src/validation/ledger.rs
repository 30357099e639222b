//! Recursive whole-ledger re-verification, run once at cold start.
//!
//! Builds an `accounts: address -> id -> block` view of everything on
//! disk and verifies every block against it, memoizing a tri-state
//! (`unvisited | true | false`) result per block and tracking which
//! `(address, previous)` pairs have already been claimed by a valid
//! block, per the anti-fork invariant. Recursion terminates because
//! `previous` strictly shortens the chain within any one account, so
//! the relation is acyclic; the memo additionally guarantees each
//! block is only ever verified once.

use std::collections::{HashMap, HashSet};

use super::error::{RejectionReason as R, ValidationError};
use super::single::parse_link;
use crate::crypto;
use crate::storage::BlockStore;
use crate::types::{Address, Block, BlockId, BlockType, G0};

pub struct LedgerVerifier {
    accounts: HashMap<Address, HashMap<BlockId, Block>>,
    status: HashMap<(Address, BlockId), bool>,
    used_as_previous: HashSet<(Address, BlockId)>,
    claimed_links: HashSet<String>,
}

impl LedgerVerifier {
    pub fn build(store: &dyn BlockStore) -> Self {
        let mut accounts = HashMap::new();
        for address in store.accounts() {
            let mut by_id = HashMap::new();
            for block in store.chain(&address) {
                by_id.insert(block.id.clone(), block);
            }
            accounts.insert(address, by_id);
        }
        LedgerVerifier {
            accounts,
            status: HashMap::new(),
            used_as_previous: HashSet::new(),
            claimed_links: HashSet::new(),
        }
    }

    /// Verifies every known block, returning `true` for each block id
    /// whose chain of custody back to a genesis/open block holds.
    pub fn verify_all(&mut self) -> HashMap<(Address, BlockId), bool> {
        let keys: Vec<(Address, BlockId)> = self
            .accounts
            .iter()
            .flat_map(|(addr, blocks)| blocks.keys().map(move |id| (addr.clone(), id.clone())))
            .collect();
        for (addr, id) in keys {
            self.verify(&addr, &id);
        }
        self.status.clone()
    }

    /// `true` if every block belonging to `address` verified true.
    pub fn account_is_valid(&self, address: &Address) -> bool {
        match self.accounts.get(address) {
            None => false,
            Some(blocks) => blocks
                .keys()
                .all(|id| self.status.get(&(address.clone(), id.clone())).copied().unwrap_or(false)),
        }
    }

    fn lookup(&self, address: &Address, id: &BlockId) -> Option<Block> {
        self.accounts.get(address)?.get(id).cloned()
    }

    fn verify(&mut self, address: &Address, id: &BlockId) -> bool {
        let key = (address.clone(), id.clone());
        if let Some(&cached) = self.status.get(&key) {
            return cached;
        }

        let block = match self.lookup(address, id) {
            Some(b) => b,
            None => {
                self.status.insert(key, false);
                return false;
            }
        };

        let fork_key = (address.clone(), block.previous.clone());
        if self.used_as_previous.contains(&fork_key) {
            self.status.insert(key, false);
            return false;
        }

        if block.kind == BlockType::Genesis {
            let ok = block.signature.as_deref() == Some(G0);
            self.status.insert(key, ok);
            if ok {
                self.used_as_previous.insert(fork_key);
            }
            return ok;
        }

        if crypto::verify_block(&block).is_err() {
            self.status.insert(key, false);
            return false;
        }

        let type_ok = match block.kind {
            BlockType::Open => self.check_open(address, &block),
            BlockType::Send => self.check_send(address, &block),
            BlockType::Receive => self.check_receive(address, &block),
            BlockType::Genesis => unreachable!("handled above"),
        };

        let prev_ok = if block.previous.is_zero() {
            true
        } else {
            self.verify(address, &block.previous)
        };

        let overall = type_ok && prev_ok;
        self.status.insert(key, overall);
        if overall {
            self.used_as_previous.insert(fork_key);
            if matches!(block.kind, BlockType::Receive | BlockType::Open) {
                self.claimed_links.insert(block.link.clone());
            }
        }
        overall
    }

    fn check_send(&self, address: &Address, block: &Block) -> bool {
        if block.previous.is_zero() {
            return false;
        }
        match self.lookup(address, &block.previous) {
            Some(prev) => block.balance < prev.balance,
            None => false,
        }
    }

    fn resolve_send_delta(&self, link: &str) -> Option<crate::types::Amount> {
        let (source_addr, source_id) = parse_link(link)?;
        let send = self.lookup(&source_addr, &source_id)?;
        if crypto::verify_block(&send).is_err() {
            return None;
        }
        let prev_balance = if send.previous.is_zero() {
            crate::types::Amount::zero()
        } else {
            self.lookup(&source_addr, &send.previous)?.balance
        };
        Some(prev_balance - send.balance)
    }

    fn check_open(&self, _address: &Address, block: &Block) -> bool {
        if !block.previous.is_zero() {
            return false;
        }
        if self.claimed_links.contains(&block.link) {
            return false;
        }
        match self.resolve_send_delta(&block.link) {
            Some(delta) => block.balance == delta,
            None => false,
        }
    }

    fn check_receive(&self, address: &Address, block: &Block) -> bool {
        if block.previous.is_zero() {
            return false;
        }
        if self.claimed_links.contains(&block.link) {
            return false;
        }
        let prev = match self.lookup(address, &block.previous) {
            Some(p) => p,
            None => return false,
        };
        match self.resolve_send_delta(&block.link) {
            Some(delta) => block.balance == prev.balance + delta,
            None => false,
        }
    }
}

/// Convenience entry point: verifies the whole ledger and returns an
/// error for the first invalid account encountered, in account-table
/// iteration order.
pub fn verify_ledger(store: &dyn BlockStore) -> Result<(), ValidationError> {
    let mut verifier = LedgerVerifier::build(store);
    verifier.verify_all();
    for address in store.accounts() {
        if !verifier.account_is_valid(&address) {
            return Err(ValidationError::new(
                R::Signature,
                format!("ledger verification failed for account {address}"),
            ));
        }
    }
    Ok(())
}
