//! Every teardown path must give back the engine handle and free the binding

mod support;

use hostbridge_binding::{BindingTracker, Connection, ConnectionCallbacks};
use hostbridge_core::BindingOptions;
use hostbridge_dispatch::Host;
use std::sync::Arc;
use support::ThreadedEngine;

fn connect(host: &Host, engine: &Arc<ThreadedEngine>) -> Connection<ThreadedEngine, u32> {
    let connection =
        Connection::create(host, Arc::clone(engine), BindingOptions::new("leak"), 0).unwrap();
    connection.connect(host, ConnectionCallbacks::new()).unwrap();
    connection
}

#[test]
fn test_connect_close_cycles_leave_no_live_bindings() {
    let host = Host::new();
    let engine = ThreadedEngine::new();

    let mut ids = Vec::new();
    for _ in 0..50 {
        let connection = connect(&host, &engine);
        engine.join();
        host.run_until_idle();
        ids.push(connection.binding_id().unwrap());
        connection.close(&host);
    }
    host.run_until_idle();

    assert_eq!(engine.released(), 50);
    assert_eq!(host.live_objects(), 0);
    assert!(ids.iter().all(|id| !BindingTracker::global().contains(*id)));
}

#[test]
fn test_engine_shutdown_then_drop_releases_everything() {
    let host = Host::new();
    let engine = ThreadedEngine::new();
    let connection = connect(&host, &engine);
    engine.join();
    host.run_until_idle();
    let id = connection.binding_id().unwrap();

    let sink = engine.sink(0);
    engine.spawn(move || sink.on_shutdown(0));
    engine.join();
    host.run_until_idle();
    assert_eq!(engine.released(), 1);
    assert!(BindingTracker::global().contains(id));

    drop(connection);

    assert!(!BindingTracker::global().contains(id));
    assert_eq!(host.live_objects(), 0);
}

#[test]
fn test_finalized_without_close() {
    let host = Host::new();
    let engine = ThreadedEngine::new();
    let connection = connect(&host, &engine);
    let id = connection.binding_id().unwrap();

    drop(connection);
    engine.join();
    host.run_until_idle();

    assert_eq!(engine.released(), 1);
    assert_eq!(host.live_objects(), 0);
    assert!(!BindingTracker::global().contains(id));
}

#[test]
fn test_in_flight_sends_hold_binding_until_completed() {
    let host = Host::new();
    let engine = ThreadedEngine::new();
    let connection = connect(&host, &engine);
    engine.join();
    host.run_until_idle();
    let id = connection.binding_id().unwrap();

    for _ in 0..10 {
        connection.send(&host, b"x", |_, _: &u32, _| {}).unwrap();
    }
    connection.close(&host);
    drop(connection);
    engine.join();
    host.run_until_idle();

    assert!(!BindingTracker::global().contains(id));
    assert_eq!(engine.released(), 1);
}

#[test]
fn test_host_value_collected_first_then_connection_dropped() {
    let host = Host::new();
    let engine = ThreadedEngine::new();
    let connection = connect(&host, &engine);
    engine.join();
    host.run_until_idle();
    let id = connection.binding_id().unwrap();

    assert!(host.collect(connection.host_object()));
    drop(connection);
    host.run_until_idle();

    assert_eq!(engine.released(), 1);
    assert!(!BindingTracker::global().contains(id));
}

#[test]
fn test_connection_keeps_engine_alive_until_released() {
    let host = Host::new();
    let engine = ThreadedEngine::new();
    let connection = connect(&host, &engine);
    engine.join();
    host.run_until_idle();
    let id = connection.binding_id().unwrap();
    let weak = Arc::downgrade(&engine);

    drop(engine);
    let engine = weak.upgrade().unwrap();
    drop(connection);

    assert_eq!(engine.released(), 1);
    drop(engine);
    assert!(weak.upgrade().is_none());
    assert!(!BindingTracker::global().contains(id));
}
