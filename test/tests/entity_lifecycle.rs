use serde_json::{json, Value};

use replicant_client::{ConnectorConfig, ConnectorError, ConnectorEvent, EntityChangeError};
use replicant_test::{entity_key, entity_removal, entity_update, room, test_config, TestHarness};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn in_rooms(id: i32, rooms: &[i32], data: Value) -> Value {
    let channels: Vec<Value> = rooms
        .iter()
        .map(|room| json!({"cid": 1, "scid": room}))
        .collect();
    json!({"id": id, "type": 0, "channels": channels, "data": data})
}

fn apply(harness: &mut TestHarness, changes: Vec<Value>) -> Result<usize, ConnectorError> {
    harness.deliver(json!({"last_id": harness.next_sequence(), "changes": changes}));
    harness.run_until_idle()
}

#[test]
fn entity_created_updated_and_removed() {
    init_logging();
    let mut harness = TestHarness::connected();
    harness
        .subscribe(room(5), None, vec![entity_update(1, room(5), json!({"name": "a"}))])
        .unwrap();

    let replica = harness.replica(1).unwrap();
    assert_eq!(replica.data().get("name"), Some(&json!("a")));
    assert_eq!(replica.link_count(), 1);

    apply(&mut harness, vec![entity_update(1, room(5), json!({"name": "b"}))]).unwrap();
    let replica = harness.replica(1).unwrap();
    assert_eq!(replica.data().get("name"), Some(&json!("b")));
    assert_eq!(replica.link_count(), 2);
    harness.take_events();

    apply(&mut harness, vec![entity_removal(1, room(5))]).unwrap();
    assert!(!harness.has_entity(1));
    assert_eq!(harness.disposed_entities(), vec![entity_key(1)]);
    assert!(harness
        .take_events()
        .contains(&ConnectorEvent::EntityDisposed(entity_key(1))));
}

#[test]
fn entity_lives_while_any_channel_holds_it() {
    let mut harness = TestHarness::connected();
    apply(&mut harness, vec![in_rooms(1, &[5, 6], json!({}))]).unwrap();

    let entity = harness.connector.registry().entity(&entity_key(1)).unwrap();
    assert_eq!(entity.subscriptions().len(), 2);

    apply(&mut harness, vec![entity_removal(1, room(5))]).unwrap();
    let entity = harness.connector.registry().entity(&entity_key(1)).unwrap();
    assert_eq!(
        entity.subscriptions().iter().copied().collect::<Vec<_>>(),
        vec![room(6)]
    );
    assert!(harness.disposed_entities().is_empty());

    apply(&mut harness, vec![entity_removal(1, room(6))]).unwrap();
    assert!(!harness.has_entity(1));
}

#[test]
fn removal_without_channels_removes_everywhere() {
    let mut harness = TestHarness::connected();
    apply(&mut harness, vec![in_rooms(1, &[5, 6], json!({}))]).unwrap();

    apply(&mut harness, vec![json!({"id": 1, "type": 0})]).unwrap();
    assert!(!harness.has_entity(1));
    let registry = harness.connector.registry();
    assert!(registry.subscription(&room(5)).unwrap().entities().is_empty());
    assert!(registry.subscription(&room(6)).unwrap().entities().is_empty());
}

#[test]
fn removing_missing_entity_is_fatal_when_checking_invariants() {
    let mut harness = TestHarness::connected();
    assert_eq!(
        apply(&mut harness, vec![entity_removal(3, room(5))]),
        Err(ConnectorError::EntityChange(
            EntityChangeError::RemoveOfMissingEntity {
                key: entity_key(3)
            }
        ))
    );
}

#[test]
fn removing_missing_entity_is_tolerated_otherwise() {
    let mut harness = TestHarness::connected_with_config(ConnectorConfig {
        check_invariants: false,
        ..test_config()
    });
    apply(&mut harness, vec![entity_removal(3, room(5))]).unwrap();
    assert_eq!(harness.connector.last_rx_sequence(), 1);
}

#[test]
fn update_must_name_a_channel() {
    let mut harness = TestHarness::connected();
    assert_eq!(
        apply(&mut harness, vec![json!({"id": 1, "type": 0, "data": {}})]),
        Err(ConnectorError::EntityChange(EntityChangeError::NoChannels {
            key: entity_key(1)
        }))
    );
}

#[test]
fn change_mapper_failure_fails_message() {
    let mut harness = TestHarness::connected();
    assert!(matches!(
        apply(&mut harness, vec![entity_update(1, room(5), json!({"reject": true}))]),
        Err(ConnectorError::EntityChange(EntityChangeError::Mapper { .. }))
    ));
}

#[test]
fn references_resolve_once_whole_message_is_applied() {
    let mut harness = TestHarness::connected();
    apply(
        &mut harness,
        vec![
            entity_update(1, room(5), json!({"ref": {"type": 0, "id": 2}})),
            entity_update(2, room(5), json!({})),
        ],
    )
    .unwrap();
    assert_eq!(harness.replica(1).unwrap().link_count(), 1);
}

#[test]
fn dangling_reference_fails_linking() {
    let mut harness = TestHarness::connected();
    assert!(matches!(
        apply(
            &mut harness,
            vec![entity_update(1, room(5), json!({"ref": {"type": 0, "id": 99}}))]
        ),
        Err(ConnectorError::EntityChange(EntityChangeError::Link { .. }))
    ));
}

#[test]
fn failed_verification_is_fatal_when_validating() {
    let mut harness = TestHarness::connected();
    assert!(matches!(
        apply(&mut harness, vec![entity_update(1, room(5), json!({"valid": false}))]),
        Err(ConnectorError::EntityValidation { .. })
    ));

    let mut harness = TestHarness::connected_with_config(ConnectorConfig {
        validate_on_load: false,
        ..test_config()
    });
    apply(&mut harness, vec![entity_update(1, room(5), json!({"valid": false}))]).unwrap();
    assert!(harness.has_entity(1));
}

#[test]
fn server_removing_channel_disposes_only_orphans() {
    let mut harness = TestHarness::connected();
    apply(
        &mut harness,
        vec![
            in_rooms(1, &[5, 6], json!({})),
            in_rooms(2, &[5], json!({})),
        ],
    )
    .unwrap();
    harness.take_events();

    harness.deliver(json!({"last_id": harness.next_sequence(), "channel_actions": ["-1.5"]}));
    harness.run_until_idle().unwrap();

    assert!(harness.has_entity(1));
    assert!(!harness.has_entity(2));
    assert!(!harness.connector.registry().has_subscription(&room(5)));
    let events = harness.take_events();
    assert!(events.contains(&ConnectorEvent::EntityDisposed(entity_key(2))));
    assert!(events.contains(&ConnectorEvent::SubscriptionDisposed(room(5))));
}

#[test]
fn entity_recreated_within_one_message_links_once() {
    let mut harness = TestHarness::connected();
    apply(
        &mut harness,
        vec![
            entity_update(1, room(5), json!({"name": "first"})),
            entity_removal(1, room(5)),
            entity_update(1, room(5), json!({"name": "second"})),
        ],
    )
    .unwrap();

    let replica = harness.replica(1).unwrap();
    assert_eq!(replica.data().get("name"), Some(&json!("second")));
    assert_eq!(replica.link_count(), 1);
    assert_eq!(harness.disposed_entities(), vec![entity_key(1)]);
}
