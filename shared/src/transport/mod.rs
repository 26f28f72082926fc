pub mod error;

use error::TransportError;

/// Sends whole message payloads to the peer of a connection. The channel is
/// expected to be reliable and ordered.
pub trait MessageSender: Send {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Receives whole message payloads from the peer of a connection
pub trait MessageReceiver: Send {
    /// Returns the next payload, or `None` if nothing has arrived yet
    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}
