//! An Authority and any number of Dependents wired through local links

use graft_client::{Dependent, DependentConfig, DependentError};
use graft_server::{
    Authority, AuthorityConfig, AuthorityError, ChangeEvent, ConnectionKey, ErrorEvent,
};
use graft_shared::{Change, MemoryStore, PersistenceAdapter};
use serde_json::Value;

use crate::{fixtures, LocalLink, LocalTransportPair};

const MAX_ROUNDS: usize = 32;

pub struct TestDependent {
    pub dependent: Dependent,
    pub key: ConnectionKey,
    pub link: LocalLink,
    pub store: MemoryStore,
}

/// What happened during one `TestNetwork::exchange`
#[derive(Default)]
pub struct Exchange {
    pub authority_changes: Vec<(ConnectionKey, Change)>,
    pub authority_errors: Vec<AuthorityError>,
    pub dependent_changes: Vec<Vec<Change>>,
    pub dependent_errors: Vec<Vec<DependentError>>,
    pub rounds: usize,
}

pub struct TestNetwork {
    pub authority: Authority,
    pub store: MemoryStore,
    dependents: Vec<TestDependent>,
}

impl TestNetwork {
    /// An Authority booted over an empty store
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// An Authority booted over a store holding `fixtures::tree()`
    pub fn seeded() -> Self {
        let store = MemoryStore::new();
        seed(&store, &fixtures::tree());
        Self::with_store(store)
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self::with_config(AuthorityConfig::default(), store)
    }

    pub fn with_config(config: AuthorityConfig, store: MemoryStore) -> Self {
        let _ = env_logger::try_init();
        let authority = Authority::new(config, fixtures::context(), store.clone()).unwrap();
        Self {
            authority,
            store,
            dependents: Vec::new(),
        }
    }

    /// Connects a Dependent reading from the Authority's own store
    pub fn add_shared_dependent(&mut self) -> usize {
        self.add_dependent(self.store.clone())
    }

    /// Connects a Dependent reading from `store`. Returns its index.
    pub fn add_dependent(&mut self, store: MemoryStore) -> usize {
        let pair = LocalTransportPair::new();
        let key = self
            .authority
            .connect(pair.authority_sender, pair.authority_receiver);
        let dependent = Dependent::new(
            DependentConfig::default(),
            fixtures::context(),
            store.clone(),
            pair.dependent_sender,
            pair.dependent_receiver,
        );
        self.dependents.push(TestDependent {
            dependent,
            key,
            link: pair.link,
            store,
        });
        self.dependents.len() - 1
    }

    pub fn dependent(&mut self, index: usize) -> &mut Dependent {
        &mut self.dependents[index].dependent
    }

    pub fn test_dependent(&self, index: usize) -> &TestDependent {
        &self.dependents[index]
    }

    /// Lets every process receive until no payload is left in flight
    pub fn exchange(&mut self) -> Exchange {
        let mut exchange = Exchange {
            dependent_changes: vec![Vec::new(); self.dependents.len()],
            dependent_errors: vec![Vec::new(); self.dependents.len()],
            ..Default::default()
        };
        while exchange.rounds < MAX_ROUNDS {
            exchange.rounds += 1;

            let mut events = self.authority.receive();
            exchange
                .authority_changes
                .extend(events.read::<ChangeEvent>());
            exchange.authority_errors.extend(events.read::<ErrorEvent>());

            for (index, test_dependent) in self.dependents.iter_mut().enumerate() {
                let mut events = test_dependent.dependent.receive();
                exchange.dependent_changes[index]
                    .extend(events.read::<graft_client::ChangeEvent>());
                exchange.dependent_errors[index]
                    .extend(events.read::<graft_client::ErrorEvent>());
            }

            let in_flight: usize = self
                .dependents
                .iter()
                .map(|test_dependent| test_dependent.link.pending())
                .sum();
            if in_flight == 0 {
                break;
            }
        }
        exchange
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `record` and everything nested in it to `store`
pub fn seed(store: &MemoryStore, record: &Value) {
    let ctx = fixtures::context();
    PersistenceAdapter::new(store.clone())
        .persist(&ctx.schemas, record)
        .unwrap();
}

/// Reads the raw stored record of `key`
pub fn stored(store: &MemoryStore, key: &str) -> Option<Value> {
    use graft_shared::Store;

    store
        .get(key)
        .unwrap()
        .map(|data| serde_json::from_slice(&data).unwrap())
}
