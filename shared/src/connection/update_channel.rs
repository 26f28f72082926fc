use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use crate::{Change, ConnectionError, Message, MessageSender, UpdateKey};

/// Per-connection filter that keeps a change received from the peer from
/// being sent straight back to it.
///
/// The latest value received for each key is remembered until the next send
/// on that key, whether or not the send is suppressed.
#[derive(Debug, Default)]
pub struct UpdateChannel {
    received: HashMap<UpdateKey, Value>,
}

impl UpdateChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the value of a change received from the peer
    pub fn add_received(&mut self, change: &Change) {
        self.received.insert(change.update_key(), change.payload());
    }

    pub fn has_received(&self, key: &UpdateKey) -> bool {
        self.received.contains_key(key)
    }

    /// Sends `change` unless it carries the value last received for its key.
    /// Returns whether the change went out.
    pub fn send(
        &mut self,
        sender: &mut dyn MessageSender,
        change: &Change,
    ) -> Result<bool, ConnectionError> {
        let key = change.update_key();
        if let Some(received) = self.received.remove(&key) {
            if received == change.payload() {
                debug!("Suppressed send of {:?}, peer already has it", key);
                return Ok(false);
            }
        }
        let payload = Message::Change(change.clone()).to_bytes()?;
        sender.send(&payload)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{EntityId, TransportError};

    #[derive(Default)]
    struct Outbox {
        sent: Vec<Vec<u8>>,
    }

    impl MessageSender for Outbox {
        fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            self.sent.push(payload.to_vec());
            Ok(())
        }
    }

    #[test]
    fn suppresses_the_received_value_once() {
        let mut channel = UpdateChannel::new();
        let mut outbox = Outbox::default();
        let change = Change::item_update(&EntityId::new("Browser-1"), "x", json!(0.3));

        channel.add_received(&change);
        assert!(!channel.send(&mut outbox, &change).unwrap());
        assert!(outbox.sent.is_empty());

        // the record is one-shot
        assert!(channel.send(&mut outbox, &change).unwrap());
        assert_eq!(outbox.sent.len(), 1);
    }

    #[test]
    fn different_value_clears_the_record() {
        let mut channel = UpdateChannel::new();
        let mut outbox = Outbox::default();
        let browser = EntityId::new("Browser-1");

        channel.add_received(&Change::item_update(&browser, "x", json!(0.3)));
        assert!(channel
            .send(&mut outbox, &Change::item_update(&browser, "x", json!(0.4)))
            .unwrap());
        assert!(!channel.has_received(&Change::item_update(&browser, "x", json!(0.3)).update_key()));
    }

    #[test]
    fn keys_include_the_container_key() {
        let mut channel = UpdateChannel::new();
        let mut outbox = Outbox::default();
        let browser = EntityId::new("Browser-1");

        channel.add_received(&Change::container_add(&browser, "plugins", &EntityId::new("Plugin-7"), None));
        let other = Change::container_add(&browser, "plugins", &EntityId::new("Plugin-8"), None);
        assert!(channel.send(&mut outbox, &other).unwrap());
    }
}
