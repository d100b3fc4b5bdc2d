#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

#[test_case(LogLevel::Trace, LevelFilter::TRACE ; "trace")]
#[test_case(LogLevel::Debug, LevelFilter::DEBUG ; "debug")]
#[test_case(LogLevel::Info, LevelFilter::INFO ; "info")]
#[test_case(LogLevel::Warn, LevelFilter::WARN ; "warn")]
#[test_case(LogLevel::Error, LevelFilter::ERROR ; "error")]
#[test_case(LogLevel::Off, LevelFilter::OFF ; "off")]
fn convert_level_to_filter___maps_level(level: LogLevel, expected: LevelFilter) {
    assert_eq!(convert_level_to_filter(level), expected);
}

#[test]
fn ReloadHandle___reload_level___fails_before_handle_set() {
    let handle = ReloadHandle::new();

    let result = handle.reload_level(LogLevel::Debug);

    assert!(matches!(result, Err(BridgeError::InvalidState { .. })));
    assert!(!handle.is_initialized());
}

#[test]
fn ReloadHandle___reload_level___succeeds_once_handle_set() {
    let (_filter, inner) = reload::Layer::<LevelFilter, Registry>::new(LevelFilter::ERROR);
    let handle = ReloadHandle::new();
    handle.set_handle(inner);

    handle.reload_level(LogLevel::Trace).unwrap();

    assert!(handle.is_initialized());
}
