//! Per-request acceptance: `send`/`receive`/`open`/`balance`/`pendingSend`/
//! `getPrevious`.
//!
//! Pure dispatch over the store plus validation — no networking here.
//! The external router decides whether to persist on `confirm`; in this
//! implementation persistence, vote broadcast, and subscriber
//! notification all happen inside [`StateMachine::accept`] so a caller
//! can't forget one of the three steps §2's data flow requires.

use std::sync::Arc;

use crate::consensus::VotingCoordinator;
use crate::metrics::MetricsRegistry;
use crate::peers::Subscriptions;
use crate::protocol::{Request, Response};
use crate::storage::BlockStore;
use crate::types::{Address, Amount, Block, BlockType};
use crate::validation::error::RejectionReason;
use crate::validation::single;

pub struct StateMachine {
    store: Arc<dyn BlockStore>,
    subscriptions: Arc<Subscriptions>,
    coordinator: Arc<VotingCoordinator>,
    metrics: Arc<MetricsRegistry>,
}

impl StateMachine {
    pub fn new(
        store: Arc<dyn BlockStore>,
        subscriptions: Arc<Subscriptions>,
        coordinator: Arc<VotingCoordinator>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        StateMachine {
            store,
            subscriptions,
            coordinator,
            metrics,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::confirm_ping(),
            Request::Balance { address } => self.balance(&address),
            Request::PendingSend { address } => self.pending_send(&address),
            Request::GetPrevious { address } => self.get_previous(&address),
            Request::Send { .. } | Request::Receive { .. } | Request::Open { .. } => {
                self.accept(request).await
            }
            _ => Response::rejection(RejectionReason::UnknownRequest),
        }
    }

    fn balance(&self, address: &Address) -> Response {
        match self.store.head(address) {
            Some(head) => Response::Info {
                address: address.clone(),
                balance: head.balance,
            },
            None => Response::rejection_for(
                address.clone(),
                String::new(),
                RejectionReason::AddressNonExistent,
            ),
        }
    }

    /// First unreceived `send` targeting `address`: every send in any
    /// account whose `link == address`, minus whichever of those
    /// `address`'s own chain already claims via a `receive`/`open`
    /// block's `link`.
    fn pending_send(&self, address: &Address) -> Response {
        let already_claimed: std::collections::HashSet<String> = self
            .store
            .chain(address)
            .into_iter()
            .filter(|b| matches!(b.kind, BlockType::Receive | BlockType::Open))
            .map(|b| b.link)
            .collect();

        for account in self.store.accounts() {
            for block in self.store.chain(&account) {
                if block.kind != BlockType::Send || block.link != address.as_str() {
                    continue;
                }
                let claim = format!("{}/{}", account, block.id);
                if already_claimed.contains(&claim) {
                    continue;
                }
                let prev_balance = if block.previous.is_zero() {
                    Amount::zero()
                } else {
                    self.store
                        .get(&account, &block.previous)
                        .map(|b| b.balance)
                        .unwrap_or_else(Amount::zero)
                };
                return Response::PendingSend {
                    link: claim,
                    send_amount: prev_balance - block.balance,
                };
            }
        }

        Response::PendingSend {
            link: String::new(),
            send_amount: Amount::zero(),
        }
    }

    fn get_previous(&self, address: &Address) -> Response {
        let id = self
            .store
            .head(address)
            .map(|b| b.id.0)
            .unwrap_or_else(|| "0".repeat(crate::types::BLOCK_ID_LEN));
        Response::Previous {
            address: address.clone(),
            link: id,
        }
    }

    async fn accept(&self, request: Request) -> Response {
        let Some(block) = request.into_block() else {
            return Response::rejection(RejectionReason::UnknownRequest);
        };

        let result = match block.kind {
            BlockType::Send => single::validate_send(self.store.as_ref(), &block),
            BlockType::Receive => single::validate_receive(self.store.as_ref(), &block),
            BlockType::Open => single::validate_open(self.store.as_ref(), &block),
            BlockType::Genesis => {
                self.metrics
                    .ledger
                    .blocks_rejected
                    .with_label_values(&[RejectionReason::Signature.to_string().as_str()])
                    .inc();
                return Response::rejection_for(
                    block.address,
                    block.id.0,
                    RejectionReason::Signature,
                )
            }
        };

        if let Err(e) = result {
            self.metrics
                .ledger
                .blocks_rejected
                .with_label_values(&[e.reason.to_string().as_str()])
                .inc();
            return Response::rejection_for(block.address, block.id.0, e.reason);
        }

        let sendlink_target = if block.kind == BlockType::Send {
            Some(block.link.clone())
        } else {
            None
        };

        if let Err(e) = self.store.append(block.clone()) {
            tracing::error!(error = %e, "failed to persist accepted block");
            self.metrics
                .ledger
                .blocks_rejected
                .with_label_values(&[RejectionReason::InvalidBalance.to_string().as_str()])
                .inc();
            return Response::rejection_for(
                block.address,
                block.id.0,
                RejectionReason::InvalidBalance,
            );
        }

        self.metrics
            .ledger
            .blocks_accepted
            .with_label_values(&[kind_label(block.kind)])
            .inc();

        if let Err(e) = self.coordinator.broadcast(block.clone()).await {
            tracing::warn!(error = %e, "vote broadcast failed");
        }

        if let Some(recipient) = sendlink_target {
            let recipient = Address(recipient);
            self.subscriptions.notify(
                &recipient,
                Response::SendAlert {
                    address: recipient.clone(),
                    send_amount: block.balance,
                    link: format!("{}/{}", block.address, block.id),
                },
            );
        }

        Response::confirm_block(block.address, block.id.0)
    }
}

fn kind_label(kind: BlockType) -> &'static str {
    match kind {
        BlockType::Open => "open",
        BlockType::Send => "send",
        BlockType::Receive => "receive",
        BlockType::Genesis => "genesis",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ConsensusConfig;
    use crate::crypto::KeyPair;
    use crate::peers::PeerRegistry;
    use crate::storage::InMemoryBlockStore;
    use crate::types::BlockId;
    use p256::ecdsa::{SigningKey, VerifyingKey};
    use rust_decimal::Decimal;

    fn keypair() -> KeyPair {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = crate::crypto::address_from_verifying_key(&verifying_key).unwrap();
        KeyPair {
            signing_key,
            address,
        }
    }

    fn machine() -> (StateMachine, Arc<dyn BlockStore>) {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let subs = Arc::new(Subscriptions::new());
        let registry = Arc::new(PeerRegistry::new(Default::default()));
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let coordinator = Arc::new(VotingCoordinator::new(
            ConsensusConfig::default(),
            registry,
            keypair(),
            metrics.clone(),
        ));
        (
            StateMachine::new(store.clone(), subs, coordinator, metrics),
            store,
        )
    }

    #[tokio::test]
    async fn balance_on_unknown_address_is_rejected() {
        let (sm, _store) = machine();
        let resp = sm.balance(&Address("nobody".into()));
        match resp {
            Response::Rejection { reason, .. } => {
                assert_eq!(reason, RejectionReason::AddressNonExistent)
            }
            _ => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn open_then_balance_round_trips() {
        let (sm, store) = machine();
        let kp = keypair();
        let mut open = Block {
            kind: BlockType::Open,
            address: kp.address.clone(),
            id: BlockId("00000000000000000001".into()),
            previous: BlockId::zero(),
            balance: Amount(Decimal::new(5, 0)),
            link: "seed".into(),
            signature: None,
        };
        kp.sign(&mut open);
        store.append(open).unwrap();

        let resp = sm.balance(&kp.address);
        match resp {
            Response::Info { balance, .. } => assert_eq!(balance, Amount(Decimal::new(5, 0))),
            _ => panic!("expected info"),
        }
    }

    #[tokio::test]
    async fn pending_send_returns_empty_when_none_outstanding() {
        let (sm, _store) = machine();
        let resp = sm.pending_send(&Address("nobody".into()));
        match resp {
            Response::PendingSend { link, .. } => assert!(link.is_empty()),
            _ => panic!("expected pendingSend"),
        }
    }
}
