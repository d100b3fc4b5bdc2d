#![allow(non_snake_case)]

use super::*;
use crate::connection::ConnectionCallbacks;
use crate::scripted::{REJECTED, ScriptedEngine, Wrapper, log_of, on_engine_thread};
use crate::tracker::BindingTracker;
use hostbridge_core::BindingOptions;

fn operational(host: &Host, engine: &Arc<ScriptedEngine>) -> Connection<ScriptedEngine, ()> {
    let connection =
        Connection::create(host, Arc::clone(engine), BindingOptions::new("conn"), ()).unwrap();
    connection.connect(host, ConnectionCallbacks::new()).unwrap();
    let sink = engine.connection_sink(0);
    let handle = engine.handle();
    on_engine_thread(move || sink.on_setup(Some(handle), 0));
    host.run_until_idle();
    connection
}

fn recording() -> StreamCallbacks<Wrapper> {
    StreamCallbacks::new()
        .on_body(|_, wrapper: &Wrapper, chunk| {
            wrapper.record(format!("body:{}", String::from_utf8_lossy(&chunk)))
        })
        .on_complete(|_, wrapper: &Wrapper, result| match result {
            Ok(()) => wrapper.record("complete:ok"),
            Err(BridgeError::Engine { code, .. }) => wrapper.record(format!("complete:{code}")),
            Err(other) => wrapper.record(format!("complete:{other}")),
        })
}

fn open(host: &Host, connection: &Connection<ScriptedEngine, ()>) -> Stream<ScriptedEngine, Wrapper> {
    Stream::open(host, connection, b"GET /", recording(), Wrapper::default()).unwrap()
}

#[test]
fn Stream___open___requires_operational_connection() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection =
        Connection::create(&host, Arc::clone(&engine), BindingOptions::new("conn"), ()).unwrap();

    let result = Stream::open(&host, &connection, b"", recording(), Wrapper::default());

    assert!(matches!(result, Err(BridgeError::InvalidState { .. })));
}

#[test]
fn Stream___open___created_until_activated() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);

    let stream = open(&host, &connection);

    assert_eq!(stream.state(&host), BindingState::Created);
    assert!(engine.calls().iter().any(|call| call.starts_with("open_stream:")));
}

#[test]
fn Stream___open___engine_rejection_leaves_nothing_tracked() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let objects = host.live_objects();
    engine.reject_calls(true);

    let result = Stream::open(&host, &connection, b"", recording(), Wrapper::default());

    match result {
        Err(BridgeError::ConstructionFailed(message)) => {
            assert_eq!(message, format!("engine error {REJECTED}: open_stream:100 rejected"))
        }
        other => panic!("expected construction failure, got {other:?}"),
    }
    assert_eq!(host.live_objects(), objects);
    let connection_id = connection.binding_id().unwrap();
    assert_eq!(BindingTracker::global().kind_of(connection_id), Some(BindingKind::Connection));
}

#[test]
fn Stream___activate___becomes_operational() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let stream = open(&host, &connection);

    stream.activate(&host).unwrap();

    assert_eq!(stream.state(&host), BindingState::Operational);
    assert!(engine.calls().iter().any(|call| call.starts_with("activate:")));
}

#[test]
fn Stream___activate___twice_is_invalid_state() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let stream = open(&host, &connection);
    stream.activate(&host).unwrap();

    assert!(matches!(stream.activate(&host), Err(BridgeError::InvalidState { .. })));
}

#[test]
fn Stream___activate___engine_failure_reverts_to_created() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let stream = open(&host, &connection);
    engine.reject_calls(true);

    let result = stream.activate(&host);

    assert!(matches!(result, Err(BridgeError::Engine { .. })));
    assert_eq!(stream.state(&host), BindingState::Created);
    engine.reject_calls(false);
    stream.activate(&host).unwrap();
}

#[test]
fn Stream___body_then_complete___delivered_in_order_and_closes() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let stream = open(&host, &connection);
    stream.activate(&host).unwrap();
    let sink = engine.stream_sink(0);

    on_engine_thread(move || {
        sink.on_body(b"one");
        sink.on_body(b"two");
        sink.on_complete(0);
        sink.on_body(b"late");
    });
    host.run_until_idle();

    assert_eq!(
        log_of(&host, stream.host_object()),
        vec!["body:one", "body:two", "complete:ok"]
    );
    assert!(stream.is_closed(&host));
    assert_eq!(engine.released().iter().filter(|(kind, _)| *kind == "stream").count(), 1);
}

#[test]
fn Stream___complete___error_code_reported() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let stream = open(&host, &connection);
    stream.activate(&host).unwrap();

    engine.stream_sink(0).on_complete(13);
    host.run_until_idle();

    assert_eq!(log_of(&host, stream.host_object()), vec!["complete:13"]);
}

#[test]
fn Stream___close___discards_pending_body() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let stream = open(&host, &connection);
    stream.activate(&host).unwrap();
    let sink = engine.stream_sink(0);
    on_engine_thread(move || {
        sink.on_body(b"queued");
        sink.on_complete(0);
    });

    stream.close(&host);
    stream.close(&host);
    host.run_until_idle();

    assert!(log_of(&host, stream.host_object()).is_empty());
    assert_eq!(stream.state(&host), BindingState::Closed);
    assert!(!engine.stream_sink(0).is_live());
}

#[test]
fn Stream___close___keeps_connection_binding_alive_until_released() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let stream = open(&host, &connection);
    let connection_id = connection.binding_id().unwrap();

    connection.close(&host);
    assert!(BindingTracker::global().contains(connection_id));
    stream.close(&host);

    assert!(!BindingTracker::global().contains(connection_id));
    assert_eq!(engine.released(), vec![("connection", 100), ("stream", 101)]);
}

#[test]
fn Stream___drop___gives_back_connection_reference() {
    let host = Host::new();
    let engine = ScriptedEngine::new();
    let connection = operational(&host, &engine);
    let connection_binding = connection.binding().unwrap();
    let before = connection_binding.ref_count();
    let stream = open(&host, &connection);
    assert_eq!(connection_binding.ref_count(), before + 1);

    drop(stream);

    assert_eq!(connection_binding.ref_count(), before);
    assert_eq!(engine.released(), vec![("stream", 101)]);
}
