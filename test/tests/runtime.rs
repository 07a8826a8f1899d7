use replicant_client::{
    ConnectorError, RateLimitConfig, Runtime, RuntimeConfig, RuntimeError, RuntimeEvent,
};
use replicant_shared::{ConnectorState, RateLimitError};
use replicant_test::{build_connector, test_config, TestTransport, TransportCall};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn runtime_with(systems: &[(i32, bool)]) -> (Runtime, Vec<TestTransport>) {
    let mut runtime = Runtime::default();
    let mut transports = Vec::new();
    for (system_id, required) in systems {
        let (connector, transport) = build_connector(*system_id, test_config());
        runtime.register_connector(connector, *required).unwrap();
        transports.push(transport);
    }
    (runtime, transports)
}

fn connect_count(transport: &TestTransport) -> usize {
    transport
        .calls()
        .into_iter()
        .filter(|call| *call == TransportCall::Connect)
        .count()
}

#[test]
fn registering_a_system_twice_fails() {
    let (mut runtime, _) = runtime_with(&[(1, true)]);
    let (duplicate, _) = build_connector(1, test_config());
    assert_eq!(
        runtime.register_connector(duplicate, false),
        Err(RuntimeError::DuplicateConnector { system_id: 1 })
    );
}

#[test]
fn invalid_limiter_is_rejected() {
    let mut runtime = Runtime::new(RuntimeConfig {
        required_limiter: RateLimitConfig {
            tokens_per_second: 1.0,
            max_tokens: 0.0,
        },
        ..RuntimeConfig::default()
    });
    let (connector, _) = build_connector(1, test_config());
    assert!(matches!(
        runtime.register_connector(connector, true),
        Err(RuntimeError::RateLimit {
            system_id: 1,
            source: RateLimitError::InvalidMaxTokens { .. }
        })
    ));
    assert!(runtime.connector(1).is_none());
}

#[test]
fn state_follows_required_connectors_only() {
    init_logging();
    let (mut runtime, transports) = runtime_with(&[(1, true), (2, false)]);
    assert_eq!(runtime.state(), ConnectorState::Disconnected);

    runtime.activate().unwrap();
    assert!(runtime.is_active());
    assert_eq!(runtime.state(), ConnectorState::Connecting);

    transports[0].complete_connect("c-1");
    runtime.tick().unwrap();
    assert_eq!(runtime.state(), ConnectorState::Connected);
    assert_eq!(
        runtime.connector(2).unwrap().state(),
        ConnectorState::Connecting
    );

    assert_eq!(
        runtime.take_events(),
        vec![
            RuntimeEvent::StateChanged(ConnectorState::Disconnected),
            RuntimeEvent::StateChanged(ConnectorState::Connecting),
            RuntimeEvent::StateChanged(ConnectorState::Connected),
        ]
    );
}

#[test]
fn lost_connection_is_retried_while_active() {
    let (mut runtime, transports) = runtime_with(&[(1, true)]);
    runtime.activate().unwrap();
    transports[0].complete_connect("c-1");
    runtime.tick().unwrap();

    transports[0].complete_disconnect();
    assert_eq!(runtime.tick(), Ok(true));

    assert_eq!(connect_count(&transports[0]), 2);
    assert_eq!(runtime.state(), ConnectorState::Connecting);
}

#[test]
fn connectors_in_error_are_not_retried() {
    let (mut runtime, transports) = runtime_with(&[(1, true)]);
    runtime.activate().unwrap();
    transports[0].context().on_connect_failure("refused");
    runtime.tick().unwrap();
    runtime.tick().unwrap();

    assert_eq!(runtime.state(), ConnectorState::Error);
    assert_eq!(connect_count(&transports[0]), 1);
}

#[test]
fn retries_wait_for_limiter_tokens() {
    let (mut runtime, transports) = runtime_with(&[(1, true)]);
    runtime.activate().unwrap();
    transports[0].complete_connect("c-1");
    runtime.tick().unwrap();

    runtime.entry_mut(1).unwrap().limiter_mut().set_token_count(0.0);
    transports[0].complete_disconnect();
    runtime.tick().unwrap();
    assert_eq!(connect_count(&transports[0]), 1);
    assert_eq!(runtime.state(), ConnectorState::Disconnected);

    runtime.entry_mut(1).unwrap().limiter_mut().fill_bucket();
    runtime.tick().unwrap();
    assert_eq!(connect_count(&transports[0]), 2);
}

#[test]
fn deactivate_disconnects_and_stops_retrying() {
    let (mut runtime, transports) = runtime_with(&[(1, true)]);
    runtime.activate().unwrap();
    transports[0].complete_connect("c-1");
    runtime.tick().unwrap();

    runtime.deactivate().unwrap();
    assert!(!runtime.is_active());
    assert_eq!(runtime.state(), ConnectorState::Disconnecting);
    assert!(transports[0].calls().contains(&TransportCall::Disconnect));

    transports[0].complete_disconnect();
    runtime.tick().unwrap();
    runtime.tick().unwrap();
    assert_eq!(runtime.state(), ConnectorState::Disconnected);
    assert_eq!(connect_count(&transports[0]), 1);
}

#[test]
fn tick_reports_failing_connector_and_ticks_the_rest() {
    let (mut runtime, transports) = runtime_with(&[(1, true), (2, true)]);
    runtime.activate().unwrap();
    transports[0].complete_connect("c-1");
    transports[1].complete_connect("c-2");
    runtime.tick().unwrap();

    transports[0].deliver_raw("garbage");
    transports[1].deliver(&serde_json::json!({"last_id": 1}));
    // parse fails for the first system while the second one advances
    let result = runtime.tick();
    assert!(matches!(
        result,
        Err(RuntimeError::Connector {
            system_id: 1,
            source: ConnectorError::MessageRead(_)
        })
    ));
    while runtime.tick().unwrap() {}
    assert_eq!(runtime.connector(2).unwrap().last_rx_sequence(), 1);
}

#[test]
fn disposed_connectors_are_left_alone() {
    let (mut runtime, transports) = runtime_with(&[(1, true)]);
    runtime.connector_mut(1).unwrap().dispose();
    runtime.activate().unwrap();
    runtime.tick().unwrap();
    assert!(transports[0].calls().is_empty());
}
