use thiserror::Error;

/// Errors raised by a transport implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The other end of the channel is gone
    #[error("Transport channel is closed. The peer has disconnected")]
    Closed,

    /// The underlying channel failed
    #[error("Transport failure: {reason}")]
    Io {
        reason: String,
    },
}
