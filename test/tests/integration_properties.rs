use futures::FutureExt;
use graft_client::DependentError;
use graft_shared::{
    Change, ChangeEffects, Coordinator, EntityError, EntityId, Graph, GraphContext, MemoryStore,
    SyncError, SyncHandler,
};
use graft_server::{Authority, AuthorityConfig};
use graft_test::{fixtures, seed, TestNetwork};
use proptest::prelude::*;
use serde_json::{json, Value};

fn id(value: &str) -> EntityId {
    EntityId::new(value)
}

// Coordinator handler that neither loads nor forwards anything
struct Isolated;

impl SyncHandler for Isolated {
    fn load(&mut self, _ctx: &GraphContext, _id: &EntityId) -> Result<Option<Value>, SyncError> {
        Ok(None)
    }

    fn propagate(&mut self, _graph: &Graph, _change: &Change) -> Result<(), SyncError> {
        Ok(())
    }

    fn persist(
        &mut self,
        _graph: &Graph,
        _ctx: &GraphContext,
        _change: &Change,
        _effects: &ChangeEffects,
    ) -> Result<(), SyncError> {
        Ok(())
    }
}

fn listening_network(dependents: usize) -> TestNetwork {
    let mut network = TestNetwork::seeded();
    for _ in 0..dependents {
        let index = network.add_shared_dependent();
        network.dependent(index).get_entity(&id("Root"), -1).unwrap();
    }
    network.exchange();
    network
}

#[test]
fn concurrent_writers_converge_without_echoes() {
    let mut network = listening_network(2);

    network
        .dependent(0)
        .set(&id("Browser-1"), "x", json!(0.75))
        .unwrap();
    network
        .dependent(1)
        .set(&id("Browser-1"), "visible", json!(false))
        .unwrap();
    let exchange = network.exchange();

    assert_eq!(exchange.authority_changes.len(), 2);
    assert_eq!(exchange.dependent_changes[0].len(), 1);
    assert_eq!(exchange.dependent_changes[1].len(), 1);
    for index in 0..2 {
        let browser = network.dependent(index).entity(&id("Browser-1")).unwrap();
        assert_eq!(browser.value("x"), Some(&json!(0.75)));
        assert_eq!(browser.value("visible"), Some(&json!(false)));
    }

    let quiet = network.exchange();
    assert_eq!(quiet.rounds, 1);
    assert!(quiet.authority_changes.is_empty());
}

#[test]
fn fetch_resolves_exactly_the_requested_depth() {
    let mut network = TestNetwork::seeded();
    let index = network.add_shared_dependent();

    let future = network.dependent(index).get_entity(&id("Screen"), 1).unwrap();

    assert!(future.now_or_never().unwrap().is_ok());
    let graph = network.dependent(index).graph();
    assert!(graph.satisfies(&id("Screen"), 1));
    assert!(!graph.satisfies(&id("Screen"), 2));
    assert!(graph.contains(&id("Display-1")));
    assert!(!graph.contains(&id("Browser-1")));
    let browsers = graph
        .get(&id("Display-1"))
        .unwrap()
        .container("browsers")
        .unwrap();
    assert!(browsers.contains(&id("Browser-1")));
    assert!(!browsers.is_loaded(&id("Browser-1")));
}

#[test]
fn parent_loads_after_its_nested_child() {
    let mut network = TestNetwork::seeded();
    let index = network.add_shared_dependent();

    let screen = network.dependent(index).get_entity(&id("Screen"), 0).unwrap();
    assert!(screen.now_or_never().unwrap().is_ok());
    let root = network.dependent(index).get_entity(&id("Root"), 0).unwrap();

    let root = root.now_or_never().unwrap().unwrap();
    assert_eq!(root.child("screen"), Some(&id("Screen")));
    assert!(network.dependent(index).graph().satisfies(&id("Root"), 0));
    let exchange = network.exchange();
    assert!(exchange.dependent_errors.iter().all(Vec::is_empty));
    assert!(exchange.authority_errors.is_empty());
}

#[test]
fn nested_entity_shares_its_parents_level() {
    let mut network = TestNetwork::seeded();
    let index = network.add_shared_dependent();

    let future = network.dependent(index).get_entity(&id("Root"), 1).unwrap();

    assert!(future.now_or_never().unwrap().is_ok());
    let graph = network.dependent(index).graph();
    assert!(graph.satisfies(&id("Root"), 1));
    assert!(!graph.satisfies(&id("Root"), 2));
    assert!(graph.contains(&id("Display-1")));
    assert!(!graph.contains(&id("Browser-1")));
}

#[test]
fn live_ids_cannot_be_reused() {
    let mut network = listening_network(1);

    let result = network.dependent(0).container_insert(
        &id("Browser-1"),
        "plugins",
        fixtures::clock("Display-1", "Browser-1", "#000000"),
    );

    match result {
        Err(DependentError::Sync(SyncError::Entity(EntityError::DuplicateId { id }))) => {
            assert_eq!(id, "Display-1");
        }
        _ => panic!("Expected DuplicateId error"),
    }
    let exchange = network.exchange();
    assert!(exchange.authority_changes.is_empty());
}

#[test]
fn repeated_registration_is_idempotent() {
    let mut network = listening_network(1);
    let key = network.test_dependent(0).key;
    let before = network.authority.listeners(&key).unwrap().len();

    network.dependent(0).get_entity(&id("Root"), -1).unwrap();
    network.exchange();

    assert_eq!(network.authority.listeners(&key).unwrap().len(), before);
}

fn ticker_coordinator(headlines: &[String]) -> Coordinator {
    let mut ctx = fixtures::context();
    ctx.add_schema(fixtures::ticker()).unwrap();
    let mut tree = fixtures::tree();
    tree["screen"]["displays"]["Display-1"]["browsers"]["Browser-1"]["plugins"]["Plugin-1"] = json!({
        "id": "Plugin-1", "parentId": "Browser-1", "parentProperty": "plugins",
        "className": "Ticker", "headlines": headlines
    });
    let mut coordinator = Coordinator::new(ctx);
    coordinator.insert_record(tree).unwrap();
    coordinator
}

proptest! {
    #[test]
    fn splice_matches_vec_splice(
        initial in proptest::collection::vec("[a-z]{1,6}", 0..8),
        index in 0usize..8,
        removed_count in 0usize..8,
        added in proptest::collection::vec("[a-z]{1,6}", 0..4),
    ) {
        let mut coordinator = ticker_coordinator(&initial);
        let plugin = id("Plugin-1");

        let result = coordinator.list_splice(
            &mut Isolated,
            &plugin,
            "headlines",
            index,
            removed_count,
            added.iter().map(|headline| json!(headline)).collect(),
        );

        if index > initial.len() {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
            let mut expected = initial.clone();
            let end = (index + removed_count).min(expected.len());
            expected.splice(index..end, added.iter().cloned());
            let actual = coordinator.graph().property_value(&plugin, "headlines").unwrap();
            prop_assert_eq!(actual, json!(expected));
        }
    }

    #[test]
    fn persisted_tree_loads_back_unchanged(
        browsers in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0, "[a-z]{0,8}"), 1..4),
        width in 1.0f64..4000.0,
    ) {
        let mut tree = fixtures::tree();
        let display = &mut tree["screen"]["displays"]["Display-1"];
        display["width"] = json!(width);
        for (index, (x, y, name)) in browsers.iter().enumerate() {
            let browser_id = format!("Browser-{}", index + 2);
            let mut browser = fixtures::browser(&browser_id, "Display-1", *x, *y);
            browser["name"] = json!(name);
            display["browsers"][browser_id.as_str()] = browser;
        }
        let mut original = Coordinator::new(fixtures::context());
        original.insert_record(tree).unwrap();
        let plain = original.graph().to_plain(&id("Root")).unwrap();

        let store = MemoryStore::new();
        seed(&store, &plain);
        let authority =
            Authority::new(AuthorityConfig::default(), fixtures::context(), store).unwrap();

        prop_assert_eq!(authority.graph().to_plain(&id("Root")).unwrap(), plain);
    }
}
