#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

// ============================================================================
// Parameterized config JSON parsing tests
// ============================================================================

#[test_case(r#"{"log_level": "info"}"#, LogLevel::Info)]
#[test_case(r#"{"log_level": "debug"}"#, LogLevel::Debug)]
#[test_case(r#"{"log_level": "WARN"}"#, LogLevel::Warn)]
#[test_case(r#"{"log_level": "error"}"#, LogLevel::Error)]
#[test_case(r#"{"log_level": "trace"}"#, LogLevel::Trace)]
#[test_case(r#"{"log_level": "off"}"#, LogLevel::Off)]
fn BridgeConfig___log_level_json___parses_correctly(json: &str, expected_level: LogLevel) {
    let config = BridgeConfig::from_json(json.as_bytes()).unwrap();
    assert_eq!(config.level().unwrap(), expected_level);
}

#[test_case(r#"{"engine_threads": 1}"#, Some(1))]
#[test_case(r#"{"engine_threads": 2}"#, Some(2))]
#[test_case(r#"{"engine_threads": 8}"#, Some(8))]
#[test_case(r#"{}"#, None)]
fn BridgeConfig___engine_threads_json___parses_correctly(
    json: &str,
    expected_threads: Option<usize>,
) {
    let config = BridgeConfig::from_json(json.as_bytes()).unwrap();
    assert_eq!(config.engine_threads, expected_threads);
}

#[test_case(r#"{"drain_timeout_ms": 0}"#, 0)]
#[test_case(r#"{"drain_timeout_ms": 1000}"#, 1000)]
#[test_case(r#"{"drain_timeout_ms": 30000}"#, 30000)]
fn BridgeConfig___drain_timeout_json___parses_correctly(json: &str, expected: u64) {
    let config = BridgeConfig::from_json(json.as_bytes()).unwrap();
    assert_eq!(config.drain_timeout_ms, expected);
}

#[test_case(r#"{"thread_name": "io"}"#, "io")]
#[test_case(r#"{"thread_name": "crt-event-loop"}"#, "crt-event-loop")]
#[test_case(r#"{}"#, "hostbridge-engine")]
fn BridgeConfig___thread_name_json___parses_correctly(json: &str, expected: &str) {
    let config = BridgeConfig::from_json(json.as_bytes()).unwrap();
    assert_eq!(config.thread_name, expected);
}

// ============================================================================
// Parameterized binding option lookups
// ============================================================================

#[test_case("setup_delay_ms", serde_json::json!(25))]
#[test_case("reject_connect", serde_json::json!(true))]
#[test_case("endpoint", serde_json::json!("127.0.0.1:8883"))]
#[test_case("topics", serde_json::json!(["a/b", "c/#"]))]
fn BindingOptions___set_value___stored_in_data(key: &str, value: serde_json::Value) {
    let mut options = BindingOptions::default();

    options.set(key, value.clone()).unwrap();

    assert_eq!(options.data[key], value);
}
