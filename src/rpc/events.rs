//! Push notifications for the wallet UI.
//!
//! State transitions fan out on a broadcast channel; the RPC server holds
//! the sender and every connected UI task a receiver. Lagging or absent
//! receivers are not an error.

use crate::wallet::registry::WalletId;
use serde_json::{json, Value};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Value>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.tx.subscribe()
    }

    /// Announce a wallet state transition. `wallet_id` scopes the event to
    /// one wallet when it concerns one.
    pub fn state_changed(&self, state: &str, wallet_id: Option<WalletId>) {
        let mut data = json!({ "state": state });
        if let Some(id) = wallet_id {
            data["wallet_id"] = json!(id);
        }
        let payload = json!({
            "command": "state_changed",
            "data": data,
            "origin": "walletd",
            "destination": "wallet_ui",
        });
        // No receivers is fine; the UI may not be connected.
        let _ = self.tx.send(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        hub.state_changed("coin_added", Some(2));

        let event = rx.recv().await.unwrap();
        assert_eq!(event["command"], "state_changed");
        assert_eq!(event["data"]["state"], "coin_added");
        assert_eq!(event["data"]["wallet_id"], 2);
        assert_eq!(event["origin"], "walletd");
        assert_eq!(event["destination"], "wallet_ui");
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        let hub = EventHub::new();
        hub.state_changed("sync_changed", None);
    }
}
