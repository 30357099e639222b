//! The single block type shared by every chain in the lattice.

use super::{Address, Amount, BlockId};
use serde::{Deserialize, Serialize};

/// Protocol-fixed signature string carried by the single canonical
/// `genesis` block. Any other block claiming `kind: genesis` without
/// this exact signature is forged and must be rejected.
pub const G0: &str = "0xc9052f33ef7690bf24171ec5c4f506caeee1ab88419dc6abc0644e6033f6c526ccff87f6bc8096b0463e38e3221c054b88938408fbaada4a6148d46d38daa52b";

/// Discriminant for the four block kinds a chain can contain.
///
/// Serialized in lowercase to match the wire protocol's `"type"` field
/// (`"open"`, `"send"`, `"receive"`, `"genesis"`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// The very first block of an account's chain.
    Open,
    /// Debits `balance` from the sender's chain, earmarked for `link`.
    Send,
    /// Credits the account for a prior, unclaimed `send` identified by `link`.
    Receive,
    /// A synthetic genesis block recognized only by its fixed `G0` signature.
    Genesis,
}

/// One block in a per-account chain.
///
/// This mirrors the wire schema field-for-field: there is no enum
/// carrying kind-specific payloads, because the protocol always sends
/// and receives this exact flat shape. Kind-specific interpretation
/// (what `link` means, whether `balance` is a delta or an absolute
/// value) lives in the validation layer, not in this type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub address: Address,
    pub id: BlockId,
    pub previous: BlockId,
    pub balance: Amount,
    /// For `send`: the recipient's address. For `receive`: the id of the
    /// `send` block being claimed. For `open`: the id of the `send`
    /// block that funds the new account.
    pub link: String,
    /// Absent only for look-ahead/preview blocks that are never appended.
    pub signature: Option<String>,
}

impl Block {
    /// Bytes signed by `address`'s private key: this block with
    /// `signature` stripped, serialized as canonical JSON.
    ///
    /// Field order matches struct declaration order because `serde_json`
    /// preserves it for non-map types by default; both signer and
    /// verifier go through this same method so the exact byte layout
    /// never needs to be documented beyond "this function".
    pub fn signing_payload(&self) -> Vec<u8> {
        let unsigned = Block {
            kind: self.kind,
            address: self.address.clone(),
            id: self.id.clone(),
            previous: self.previous.clone(),
            balance: self.balance,
            link: self.link.clone(),
            signature: None,
        };
        serde_json::to_vec(&unsigned).expect("Block serializes infallibly")
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.kind, BlockType::Genesis) && self.signature.as_deref() == Some(G0)
    }
}
