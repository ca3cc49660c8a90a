//! End-to-end lifecycle behavior of a managed connection over the local transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use chatlink::chat::{Composer, status_label};
use chatlink::config::{ClientConfig, DEFAULT_ENDPOINT};
use chatlink::protocol::{ClientEvent, SendMessage, ServerEvent};
use chatlink::realtime::Transport;
use chatlink::realtime::local::LocalConnector;
use chatlink::session::{ConnectionManager, ConnectionState, ConnectionStatus, ScopeError};

fn setup() -> (ConnectionManager<LocalConnector>, LocalConnector) {
    let connector = LocalConnector::new();
    let config = ClientConfig::from_lookup(|_| None);
    (ConnectionManager::new(connector.clone(), config), connector)
}

#[test]
fn at_most_one_live_instance_across_cycles() {
    let (manager, connector) = setup();

    for cycle in 0..5 {
        let first = manager.activate();
        let second = manager.activate();
        assert!(Arc::ptr_eq(first.transport(), second.transport()));

        let live = connector
            .created()
            .iter()
            .filter(|transport| !transport.is_terminated())
            .count();
        assert_eq!(live, 1, "cycle {cycle}");

        drop(second);
        drop(first);
        assert!(connector.created().iter().all(|t| t.is_terminated()));
    }
    assert_eq!(connector.created().len(), 5);
}

#[test]
fn teardown_clears_instance_and_silences_observers() {
    let (manager, connector) = setup();
    let accessor = manager.accessor();
    let activation = manager.activate();
    let transport = connector.latest().unwrap();
    transport.accept("abc123");

    activation.release();

    let current = accessor.current().unwrap();
    assert!(current.transport().is_none());
    assert_eq!(current.state(), &ConnectionState::released());
    assert_eq!(transport.listener_count("connect"), 0);
    assert_eq!(transport.listener_count("disconnect"), 0);
    assert_eq!(transport.listener_count("connect_error"), 0);

    transport.accept("stale");
    transport.drop_connection("stale");
    assert_eq!(manager.state(), ConnectionState::released());
}

#[test]
fn accessor_scoping() {
    let (manager, _) = setup();
    let accessor = manager.accessor();
    assert_eq!(accessor.current().unwrap_err(), ScopeError);

    let activation = manager.activate();
    let current = accessor.current().unwrap();
    assert!(current.transport().is_some());
    assert_eq!(current.state().status(), ConnectionStatus::Connecting);

    activation.release();
    let current = accessor.current().unwrap();
    assert!(current.transport().is_none());
    assert_eq!(current.state().status(), ConnectionStatus::Released);
}

#[test]
fn consumer_listeners_survive_manager_observers() {
    let (manager, connector) = setup();
    let _activation = manager.activate();
    let current = manager.accessor().current().unwrap();
    let transport = Arc::clone(current.transport().unwrap());

    let received = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&received);
    let id = transport.on(
        "receive:message",
        Arc::new(move |payload: &Value| {
            if let Ok(ServerEvent::ReceiveMessage(message)) =
                ServerEvent::decode("receive:message", payload.clone())
            {
                assert_eq!(message.text, "hello");
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }),
    );

    let remote = connector.latest().unwrap();
    remote.accept("abc123");
    remote.deliver("receive:message", json!({ "text": "hello" }));
    transport.off("receive:message", Some(id));
    remote.deliver("receive:message", json!({ "text": "hello" }));

    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert!(manager.state().is_connected());
}

#[test]
fn consumer_can_read_accessor_during_teardown() {
    let (manager, connector) = setup();
    let activation = manager.activate();
    let accessor = activation.accessor();
    let transport = connector.latest().unwrap();
    transport.accept("abc123");

    let outcome = Arc::new(std::sync::Mutex::new(None));
    let sink = Arc::clone(&outcome);
    transport.on(
        "disconnect",
        Arc::new(move |_: &Value| {
            *sink.lock().unwrap() = Some(
                accessor
                    .current()
                    .map(|c| (c.transport().is_none(), c.state().status())),
            );
        }),
    );

    activation.release();
    assert_eq!(
        *outcome.lock().unwrap(),
        Some(Ok((true, ConnectionStatus::Released)))
    );
}

#[test]
fn mount_unmount_remount_scenario() {
    let (manager, connector) = setup();

    let activation = manager.activate();
    let first = connector.latest().unwrap();
    assert_eq!(first.endpoint(), DEFAULT_ENDPOINT);

    first.accept("abc123");
    let state = manager.accessor().current().unwrap().state().clone();
    assert!(state.is_connected());
    assert_eq!(state.session_id(), Some("abc123"));
    assert_eq!(status_label(&state), "Connected (abc123)");

    activation.release();
    assert_eq!(manager.state().session_id(), None);
    first.accept("abc123");
    assert_eq!(manager.state().status(), ConnectionStatus::Released);

    let _activation = manager.activate();
    let second = connector.latest().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    let state = manager.accessor().current().unwrap().state().clone();
    assert_eq!(state.status(), ConnectionStatus::Connecting);
    assert_eq!(state.session_id(), None);
}

#[test]
fn composer_gates_on_connection_and_does_not_transmit() {
    let (manager, connector) = setup();
    let _activation = manager.activate();
    let remote = connector.latest().unwrap();
    let mut composer = Composer::new();
    composer.set_draft("hello");

    assert!(!composer.input_enabled(manager.accessor().current().unwrap().state()));
    remote.accept("abc123");

    let current = manager.accessor().current().unwrap();
    let text = composer.submit(current.state()).unwrap();
    assert_eq!(composer.draft(), "");
    assert!(remote.outbox().is_empty());

    current
        .emit(&ClientEvent::MessageSend(SendMessage::text("general", text)))
        .unwrap();
    assert_eq!(remote.outbox()[0].0, "message:send");
}

#[tokio::test]
async fn reconnect_is_reflected_not_driven() {
    let (manager, connector) = setup();
    let _activation = manager.activate();
    let mut rx = manager.accessor().subscribe().unwrap();
    let remote = connector.latest().unwrap();

    remote.accept("first");
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_connected());

    remote.drop_connection("transport close");
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().reason(), Some("transport close"));
    assert_eq!(remote.connect_calls(), 1);
    assert!(remote.next_reconnect_delay().is_some());

    remote.accept("second");
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().session_id(), Some("second"));
}
