//! In-memory block store, for tests and short-lived demos.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{BlockStore, StorageError};
use crate::types::{Address, Block, BlockId};

/// In-memory implementation of [`BlockStore`].
///
/// Chains are kept in append order per account; lookups by id are a
/// linear scan, which is fine for tests but not for a real node (see
/// [`super::file::FileBlockStore`] for the indexed on-disk version).
#[derive(Default)]
pub struct InMemoryBlockStore {
    chains: Mutex<HashMap<Address, Vec<Block>>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn head(&self, address: &Address) -> Option<Block> {
        self.chains.lock().unwrap().get(address)?.last().cloned()
    }

    fn get(&self, address: &Address, id: &BlockId) -> Option<Block> {
        self.chains
            .lock()
            .unwrap()
            .get(address)?
            .iter()
            .find(|b| &b.id == id)
            .cloned()
    }

    fn chain(&self, address: &Address) -> Vec<Block> {
        self.chains
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    fn append(&self, block: Block) -> Result<(), StorageError> {
        let mut chains = self.chains.lock().unwrap();
        let entry = chains.entry(block.address.clone()).or_default();
        let expected_previous = entry.last().map(|b| b.id.clone()).unwrap_or_else(BlockId::zero);
        if block.previous != expected_previous {
            return Err(StorageError::Corrupt {
                address: block.address.clone(),
                detail: format!(
                    "block.previous {} does not match current head {}",
                    block.previous, expected_previous
                ),
            });
        }
        entry.push(block);
        Ok(())
    }

    fn accounts(&self) -> Vec<Address> {
        self.chains.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, BlockType};
    use rust_decimal::Decimal;

    fn open_block(address: &str) -> Block {
        Block {
            kind: BlockType::Open,
            address: Address(address.to_string()),
            id: BlockId("00000000000000000001".into()),
            previous: BlockId::zero(),
            balance: Amount(Decimal::new(10, 0)),
            link: "funding-send".into(),
            signature: Some("sig".into()),
        }
    }

    #[test]
    fn append_then_head_roundtrip() {
        let store = InMemoryBlockStore::new();
        let block = open_block("addr-1");
        store.append(block.clone()).unwrap();
        assert_eq!(store.head(&block.address).unwrap().id, block.id);
    }

    #[test]
    fn append_rejects_wrong_previous() {
        let store = InMemoryBlockStore::new();
        let mut block = open_block("addr-1");
        block.previous = BlockId("not-zero-id-000000000".into());
        assert!(store.append(block).is_err());
    }

    #[test]
    fn accounts_lists_every_chain() {
        let store = InMemoryBlockStore::new();
        store.append(open_block("addr-1")).unwrap();
        store.append(open_block("addr-2")).unwrap();
        let mut accounts: Vec<_> = store.accounts().into_iter().map(|a| a.0).collect();
        accounts.sort();
        assert_eq!(accounts, vec!["addr-1", "addr-2"]);
    }
}
