use std::default::Default;

use graft_shared::{constants::FULL_DEPTH, ConnectionConfig};

/// Contains Config properties which will be used by a Dependent
#[derive(Clone, Debug)]
pub struct DependentConfig {
    /// Whether singletons rebuilt because storage has no record for them, or
    /// only an unparsable one, are written back to storage
    pub persist_recovered_singletons: bool,
    /// Depth used by `Dependent::get` when none is given
    pub default_depth: i32,
    /// Used to configure the connection with the Authority
    pub connection: ConnectionConfig,
}

impl Default for DependentConfig {
    fn default() -> Self {
        Self {
            persist_recovered_singletons: true,
            default_depth: FULL_DEPTH,
            connection: ConnectionConfig::default(),
        }
    }
}
