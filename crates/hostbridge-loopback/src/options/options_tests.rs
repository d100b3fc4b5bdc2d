#![allow(non_snake_case)]

use super::*;
use serde_json::json;

#[test]
fn LoopbackOptions___from_options___empty_data_uses_defaults() {
    let options = LoopbackOptions::from_options(&BindingOptions::new("plain"));

    assert_eq!(options, LoopbackOptions::default());
    assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
}

#[test]
fn LoopbackOptions___from_options___reads_every_key() {
    let binding_options = BindingOptions {
        label: "faulty".to_string(),
        data: json!({
            "reject_connect": true,
            "setup_delay_ms": 25,
            "setup_error_code": 61,
            "operation_delay_ms": 5,
            "reject_operations": true,
            "chunk_size": 3,
        }),
    };

    let options = LoopbackOptions::from_options(&binding_options);

    assert!(options.reject_connect);
    assert_eq!(options.setup_delay(), Duration::from_millis(25));
    assert_eq!(options.setup_error_code, 61);
    assert_eq!(options.operation_delay(), Duration::from_millis(5));
    assert!(options.reject_operations);
    assert_eq!(options.chunk_size, 3);
}

#[test]
fn LoopbackOptions___from_options___zero_chunk_size_falls_back() {
    let binding_options = BindingOptions::new("zero").with("chunk_size", 0).unwrap();

    let options = LoopbackOptions::from_options(&binding_options);

    assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
}

#[test]
fn LoopbackOptions___from_options___ill_typed_value_falls_back() {
    let binding_options = BindingOptions::new("typo")
        .with("setup_error_code", "sixty-one")
        .unwrap();

    let options = LoopbackOptions::from_options(&binding_options);

    assert_eq!(options.setup_error_code, 0);
}

#[test]
fn LoopbackOptions___deserialize___partial_object() {
    let options: LoopbackOptions = serde_json::from_value(json!({ "reject_operations": true })).unwrap();

    assert!(options.reject_operations);
    assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
}
