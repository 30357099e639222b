//! `watchForSends` subscriptions.
//!
//! Process-lifetime only, by design (spec §9: `sendSubscriptions` has
//! no teardown and is lost on restart).

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::Response;
use crate::types::Address;

#[derive(Default)]
pub struct Subscriptions {
    subs: Mutex<HashMap<Address, Vec<UnboundedSender<Response>>>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&self, address: Address, sender: UnboundedSender<Response>) {
        self.subs.lock().unwrap().entry(address).or_default().push(sender);
    }

    /// Notifies every channel subscribed to `address`, dropping any
    /// that have since closed.
    pub fn notify(&self, address: &Address, response: Response) {
        let mut subs = self.subs.lock().unwrap();
        if let Some(channels) = subs.get_mut(address) {
            channels.retain(|ch| ch.send(response.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Amount;

    #[test]
    fn closed_channel_is_dropped_silently() {
        let subs = Subscriptions::new();
        let addr = Address("A".into());
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        subs.watch(addr.clone(), tx);
        drop(rx);
        subs.notify(
            &addr,
            Response::Info {
                address: addr.clone(),
                balance: Amount::zero(),
            },
        );
        assert!(subs.subs.lock().unwrap().get(&addr).unwrap().is_empty());
    }
}
