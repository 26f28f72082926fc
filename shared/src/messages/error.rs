use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The message could not be serialized
    #[error("Failed to encode {kind} message: {reason}")]
    Encode {
        kind: &'static str,
        reason: String,
    },

    /// The payload is not a well-formed message
    #[error("Failed to decode message of {payload_size} bytes: {reason}. The peer sent a malformed payload")]
    Decode {
        payload_size: usize,
        reason: String,
    },
}
