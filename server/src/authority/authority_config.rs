use std::default::Default;

use graft_shared::ConnectionConfig;

/// Contains Config properties which will be used by the Authority
#[derive(Clone, Debug)]
pub struct AuthorityConfig {
    /// Whether a second `init` handshake replaces the tree instead of being
    /// rejected
    pub allow_reinit: bool,
    /// Whether `volatile` properties are written to storage
    pub persist_volatile: bool,
    /// Whether a corrupt singleton record is recreated from schema defaults
    /// while loading
    pub recover_singletons: bool,
    /// Used to configure the connections with Dependents
    pub connection: ConnectionConfig,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            allow_reinit: false,
            persist_volatile: false,
            recover_singletons: true,
            connection: ConnectionConfig::default(),
        }
    }
}
