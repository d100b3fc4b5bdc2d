#![allow(non_snake_case)]

use super::*;
use hostbridge_core::BridgeError;
use hostbridge_runtime::StaticCredentialsProvider;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn config(json: &str) -> BridgeConfig {
    BridgeConfig::from_json(json.as_bytes()).unwrap()
}

fn runtime() -> Arc<EngineRuntime> {
    Arc::new(EngineRuntime::with_defaults().unwrap())
}

#[test]
fn init___unknown_level___config_error() {
    let result = init(&config(r#"{"log_level": "chatty"}"#));

    assert!(matches!(result, Err(BridgeError::ConfigError(_))));
}

#[test]
fn init___called_twice___succeeds() {
    init(&config(r#"{"log_level": "warn"}"#)).unwrap();
    init(&config(r#"{"log_level": "info"}"#)).unwrap();

    assert_eq!(LogSinkManager::global().level(), LogLevel::Info);
}

#[test]
fn Bridge___with_runtime___rejects_bad_level() {
    let result = Bridge::with_runtime(&config(r#"{"log_level": "loud"}"#), runtime());

    assert!(matches!(result, Err(BridgeError::ConfigError(_))));
}

#[test]
fn Bridge___new___runtime_uses_configured_threads() {
    let bridge = Bridge::new(&config(r#"{"engine_threads": 2, "thread_name": "facade"}"#)).unwrap();

    assert_eq!(bridge.runtime().config().worker_threads, Some(2));
    assert_eq!(bridge.runtime().config().thread_name, "facade");
    assert_eq!(bridge.config().engine_threads, Some(2));
}

#[test]
fn Bridge___fetch_credentials___uses_provider() {
    let bridge = Bridge::with_runtime(&BridgeConfig::default(), runtime()).unwrap();
    let provider = Arc::new(StaticCredentialsProvider::new(Credentials::new("id", "key")));

    let credentials = bridge.fetch_credentials(provider).unwrap();

    assert_eq!(credentials.access_key_id, "id");
}

#[test]
fn Bridge___shutdown___drains_runtime() {
    let bridge = Bridge::with_runtime(&config(r#"{"drain_timeout_ms": 2000}"#), runtime()).unwrap();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    bridge.runtime().spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.store(true, Ordering::SeqCst);
    });

    bridge.shutdown().unwrap();

    assert!(finished.load(Ordering::SeqCst));

    assert!(bridge.blocking().is_shutting_down());
    assert_eq!(bridge.runtime().in_flight(), 0);
}
