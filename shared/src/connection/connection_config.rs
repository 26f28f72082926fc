use std::default::Default;

/// Contains Config properties which will be used by a Connection
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum number of messages drained from the transport by a single
    /// `receive` call
    pub max_messages_per_receive: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_messages_per_receive: 256,
        }
    }
}
