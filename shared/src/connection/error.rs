use thiserror::Error;

use crate::{MessageError, TransportError};

/// Errors that can occur while exchanging messages over a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Message codec error
    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}
