//! Single-block validation for `send`/`receive`/`open` requests.
//!
//! These are the checks the StateMachine runs against one incoming
//! block before it is appended to the store. Whole-ledger
//! re-verification (`validation::ledger`) implements the same rules a
//! second time over the `accounts` view built at cold start, since
//! there the head isn't simply "whatever `BlockStore::head` returns".

use super::error::{RejectionReason as R, ValidationError};
use crate::crypto;
use crate::storage::BlockStore;
use crate::types::{Address, Amount, Block, BlockId};

/// Splits a `receive`/`open` block's `link` field (`"{address}/{id}"`)
/// into its source address and source block id.
pub fn parse_link(link: &str) -> Option<(Address, BlockId)> {
    let (addr, id) = link.rsplit_once('/')?;
    if addr.is_empty() || id.is_empty() {
        return None;
    }
    Some((Address(addr.to_string()), BlockId(id.to_string())))
}

fn err(reason: R, detail: impl Into<String>) -> ValidationError {
    ValidationError::new(reason, detail)
}

/// Validates an incoming `send` block against the sender's current head.
pub fn validate_send(store: &dyn BlockStore, block: &Block) -> Result<(), ValidationError> {
    crypto::verify_block(block).map_err(|e| err(R::Signature, e.to_string()))?;

    if block.balance.is_negative() {
        return Err(err(R::InvalidBalance, "balance must be non-negative"));
    }

    let head = store
        .head(&block.address)
        .ok_or_else(|| err(R::AddressNonExistent, block.address.to_string()))?;

    if head.id != block.previous {
        return Err(err(
            R::InvalidPrevious,
            format!("expected previous {}, got {}", head.id, block.previous),
        ));
    }

    if block.balance >= head.balance {
        return Err(err(
            R::Balance,
            format!(
                "send balance {} must be less than current balance {}",
                block.balance, head.balance
            ),
        ));
    }

    Ok(())
}

/// Looks up and verifies the `send` block pointed at by a `receive`/`open`
/// block's `link`, returning the send's delta (`prev(send).balance -
/// send.balance`, the amount transferred).
fn resolve_send(store: &dyn BlockStore, link: &str) -> Result<(Block, Amount), ValidationError> {
    let (source_addr, source_id) =
        parse_link(link).ok_or_else(|| err(R::SendSignature, format!("malformed link {link}")))?;

    let send_block = store
        .get(&source_addr, &source_id)
        .ok_or_else(|| err(R::SendSignature, format!("no such send block {link}")))?;

    crypto::verify_block(&send_block).map_err(|e| err(R::SendSignature, e.to_string()))?;

    let prev_balance = if send_block.previous.is_zero() {
        Amount::zero()
    } else {
        store
            .get(&source_addr, &send_block.previous)
            .ok_or_else(|| err(R::SendSignature, "send's predecessor is missing"))?
            .balance
    };

    Ok((send_block.clone(), prev_balance - send_block.balance))
}

/// Validates an incoming `receive` block: the recipient account already
/// has a chain, and the paired `send` has not already been claimed.
pub fn validate_receive(store: &dyn BlockStore, block: &Block) -> Result<(), ValidationError> {
    crypto::verify_block(block).map_err(|e| err(R::Signature, e.to_string()))?;

    let head = store
        .head(&block.address)
        .ok_or_else(|| err(R::AddressNonExistent, block.address.to_string()))?;

    if head.id != block.previous {
        return Err(err(
            R::InvalidPrevious,
            format!("expected previous {}, got {}", head.id, block.previous),
        ));
    }

    if already_received(store, &block.link) {
        return Err(err(R::DoubleReceive, block.link.clone()));
    }

    let (_, delta) = resolve_send(store, &block.link)?;
    let expected = head.balance + delta;
    if block.balance != expected {
        return Err(err(
            R::InvalidBalance,
            format!("expected balance {expected}, got {}", block.balance),
        ));
    }

    Ok(())
}

/// Validates an incoming `open` block: the account has no prior chain.
pub fn validate_open(store: &dyn BlockStore, block: &Block) -> Result<(), ValidationError> {
    crypto::verify_block(block).map_err(|e| err(R::Signature, e.to_string()))?;

    if store.head(&block.address).is_some() {
        return Err(err(
            R::InvalidPrevious,
            "account already has a chain, cannot re-open",
        ));
    }

    if !block.previous.is_zero() {
        return Err(err(
            R::InvalidPrevious,
            "open block must have the zero previous id",
        ));
    }

    if already_received(store, &block.link) {
        return Err(err(R::DoubleReceive, block.link.clone()));
    }

    let (_, delta) = resolve_send(store, &block.link)?;
    if block.balance != delta {
        return Err(err(
            R::InvalidBalance,
            format!("expected balance {delta}, got {}", block.balance),
        ));
    }

    Ok(())
}

/// `true` if any block in any chain already claims `link` (Invariant 6:
/// a `send` is consumed by at most one `receive`/`open` across the
/// whole ledger, not just within one chain).
fn already_received(store: &dyn BlockStore, link: &str) -> bool {
    store
        .accounts()
        .iter()
        .any(|addr| store.chain(addr).iter().any(|b| b.link == link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::storage::InMemoryBlockStore;
    use crate::types::BlockType;
    use p256::ecdsa::SigningKey;
    use rust_decimal::Decimal;

    fn keypair() -> KeyPair {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = p256::ecdsa::VerifyingKey::from(&signing_key);
        let address = crypto::address_from_verifying_key(&verifying_key).unwrap();
        KeyPair {
            signing_key,
            address,
        }
    }

    fn open_chain(store: &InMemoryBlockStore, kp: &KeyPair, balance: i64) -> Block {
        let mut block = Block {
            kind: BlockType::Open,
            address: kp.address.clone(),
            id: BlockId("00000000000000000001".into()),
            previous: BlockId::zero(),
            balance: Amount(Decimal::new(balance, 0)),
            link: "seed".into(),
            signature: None,
        };
        kp.sign(&mut block);
        store.append(block.clone()).unwrap();
        block
    }

    #[test]
    fn send_overdraft_is_rejected_with_balance_reason() {
        let store = InMemoryBlockStore::new();
        let kp = keypair();
        let head = open_chain(&store, &kp, 10);

        let mut send = Block {
            kind: BlockType::Send,
            address: kp.address.clone(),
            id: BlockId("00000000000000000002".into()),
            previous: head.id.clone(),
            balance: Amount(Decimal::new(12, 0)),
            link: "recipient".into(),
            signature: None,
        };
        kp.sign(&mut send);

        let err = validate_send(&store, &send).unwrap_err();
        assert_eq!(err.reason, R::Balance);
    }

    #[test]
    fn send_with_stale_previous_is_rejected() {
        let store = InMemoryBlockStore::new();
        let kp = keypair();
        open_chain(&store, &kp, 10);

        let mut send = Block {
            kind: BlockType::Send,
            address: kp.address.clone(),
            id: BlockId("00000000000000000002".into()),
            previous: BlockId("99999999999999999999".into()),
            balance: Amount(Decimal::new(5, 0)),
            link: "recipient".into(),
            signature: None,
        };
        kp.sign(&mut send);

        let err = validate_send(&store, &send).unwrap_err();
        assert_eq!(err.reason, R::InvalidPrevious);
    }

    #[test]
    fn open_then_double_receive_is_rejected() {
        let store = InMemoryBlockStore::new();
        let sender = keypair();
        let recipient = keypair();
        let sender_head = open_chain(&store, &sender, 10);

        let mut send = Block {
            kind: BlockType::Send,
            address: sender.address.clone(),
            id: BlockId("00000000000000000002".into()),
            previous: sender_head.id.clone(),
            balance: Amount(Decimal::new(4, 0)),
            link: recipient.address.to_string(),
            signature: None,
        };
        sender.sign(&mut send);
        store.append(send.clone()).unwrap();

        let link = format!("{}/{}", sender.address, send.id);
        let mut open = Block {
            kind: BlockType::Open,
            address: recipient.address.clone(),
            id: BlockId("00000000000000000001".into()),
            previous: BlockId::zero(),
            balance: Amount(Decimal::new(6, 0)),
            link: link.clone(),
            signature: None,
        };
        recipient.sign(&mut open);

        validate_open(&store, &open).unwrap();
        store.append(open.clone()).unwrap();

        let second_receiver = keypair();
        let mut bad_open = Block {
            kind: BlockType::Open,
            address: second_receiver.address.clone(),
            id: BlockId("00000000000000000001".into()),
            previous: BlockId::zero(),
            balance: Amount(Decimal::new(6, 0)),
            link,
            signature: None,
        };
        second_receiver.sign(&mut bad_open);
        let err = validate_open(&store, &bad_open).unwrap_err();
        assert_eq!(err.reason, R::DoubleReceive);
    }
}
