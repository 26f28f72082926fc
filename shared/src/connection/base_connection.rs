use log::warn;

use crate::{
    Change, ConnectionConfig, ConnectionError, Message, MessageReceiver, MessageSender,
    UpdateChannel,
};

/// Represents a connection to a remote coordinator, and provides
/// functionality to exchange messages with it
pub struct BaseConnection {
    sender: Box<dyn MessageSender>,
    receiver: Box<dyn MessageReceiver>,
    update_channel: UpdateChannel,
    max_messages_per_receive: usize,
}

impl BaseConnection {
    /// Create a new BaseConnection over the given transport halves
    pub fn new(
        connection_config: &ConnectionConfig,
        sender: Box<dyn MessageSender>,
        receiver: Box<dyn MessageReceiver>,
    ) -> Self {
        Self {
            sender,
            receiver,
            update_channel: UpdateChannel::new(),
            max_messages_per_receive: connection_config.max_messages_per_receive,
        }
    }

    /// Encodes and sends a message as is
    pub fn send(&mut self, message: &Message) -> Result<(), ConnectionError> {
        let payload = message.to_bytes()?;
        self.sender.send(&payload)?;
        Ok(())
    }

    /// Sends a change through the Update Channel. Returns whether it was
    /// actually sent.
    pub fn send_change(&mut self, change: &Change) -> Result<bool, ConnectionError> {
        self.update_channel.send(self.sender.as_mut(), change)
    }

    /// Records a change as received from the peer, so the same value is not
    /// sent back to it
    pub fn add_received(&mut self, change: &Change) {
        self.update_channel.add_received(change);
    }

    pub fn update_channel(&self) -> &UpdateChannel {
        &self.update_channel
    }

    /// Drains the messages that have arrived, in order. Changes are recorded
    /// in the Update Channel. Payloads that do not decode are logged and
    /// dropped.
    pub fn receive(&mut self) -> Result<Vec<Message>, ConnectionError> {
        let mut messages = Vec::new();
        while messages.len() < self.max_messages_per_receive {
            let Some(payload) = self.receiver.receive()? else {
                break;
            };
            match Message::from_bytes(&payload) {
                Ok(message) => {
                    if let Message::Change(change) = &message {
                        self.update_channel.add_received(change);
                    }
                    messages.push(message);
                }
                Err(error) => {
                    warn!("Dropping message: {}", error);
                }
            }
        }
        Ok(messages)
    }
}
