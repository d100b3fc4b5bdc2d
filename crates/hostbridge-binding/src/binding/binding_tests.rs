#![allow(non_snake_case)]

use super::*;
use crate::native::NativeHandle;
use hostbridge_dispatch::DispatchChannel;
use parking_lot::Mutex;

fn releasing_handle(handle: u32, released: &Arc<Mutex<Vec<u32>>>) -> NativeHandle<u32> {
    let released = Arc::clone(released);
    NativeHandle::new(handle, Arc::new(move |h| released.lock().push(h)))
}

fn new_binding(host: &Host) -> Binding<NativeHandle<u32>> {
    let wrapper = host.register_value(String::from("wrapper"));
    Binding::new(host, BindingKind::Connection, wrapper)
}

#[test]
fn Binding___new___registers_with_tracker_in_created_state() {
    let host = Host::new();

    let binding = new_binding(&host);

    assert!(BindingTracker::global().contains(binding.id()));
    assert_eq!(binding.state(&host), BindingState::Created);
    assert_eq!(binding.ref_count(), 1);
    assert!(!binding.is_closed(&host));
}

#[test]
fn Binding___drop_last_reference___unregisters_after_teardown_released_native() {
    let host = Host::new();
    let released = Arc::new(Mutex::new(Vec::new()));
    let binding = new_binding(&host);
    let id = binding.id();
    binding.with_core(&host, |core| core.native = Some(releasing_handle(5, &released)));
    let engine_ref = binding.acquire();

    binding.teardown(&host, RetireMode::Abort);
    assert_eq!(*released.lock(), vec![5]);
    drop(binding);
    std::thread::spawn(move || drop(engine_ref)).join().unwrap();

    assert!(!BindingTracker::global().contains(id));
    assert_eq!(*released.lock(), vec![5]);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "still holding its engine handle")]
fn Binding___drop_last_reference___with_native_handle_is_fatal() {
    let host = Host::new();
    let released = Arc::new(Mutex::new(Vec::new()));
    let binding = new_binding(&host);
    binding.with_core(&host, |core| core.native = Some(releasing_handle(6, &released)));

    drop(binding);
}

#[test]
fn Binding___drop_last_reference___can_happen_on_engine_thread() {
    let host = Host::new();
    let binding = new_binding(&host);
    let id = binding.id();
    let engine_ref = binding.acquire();
    drop(binding);

    std::thread::spawn(move || drop(engine_ref)).join().unwrap();

    assert!(!BindingTracker::global().contains(id));
}

#[test]
fn Binding___teardown___closes_and_revokes_wrapper() {
    let host = Host::new();
    let binding = new_binding(&host);

    assert!(binding.teardown(&host, RetireMode::Abort));

    assert!(binding.is_closed(&host));
    assert_eq!(binding.state(&host), BindingState::Closed);
    assert!(binding.resolve::<String>(&host).is_none());
}

#[test]
fn Binding___teardown___second_call_is_noop() {
    let host = Host::new();
    let released = Arc::new(Mutex::new(Vec::new()));
    let binding = new_binding(&host);
    binding.with_core(&host, |core| core.native = Some(releasing_handle(9, &released)));

    assert!(binding.teardown(&host, RetireMode::Abort));
    assert!(!binding.teardown(&host, RetireMode::Drain));

    assert_eq!(*released.lock(), vec![9]);
}

#[test]
fn Binding___teardown___without_native_handle_releases_interval_directly() {
    let host = Host::new();
    let binding = new_binding(&host);
    let latch = binding.arm_interval(&host);
    assert_eq!(binding.ref_count(), 2);

    binding.teardown(&host, RetireMode::Abort);

    assert!(latch.is_released());
    assert_eq!(binding.ref_count(), 1);
}

#[test]
fn Binding___teardown___retires_attached_channels() {
    let host = Host::new();
    let binding = new_binding(&host);
    let channel = DispatchChannel::create(&host, "test", |_: &Host, _: u8| {}).unwrap();
    binding.attach(&host, Box::new(channel.clone()));
    channel.enqueue(1).unwrap();

    binding.teardown(&host, RetireMode::Abort);
    host.run_until_idle();

    assert_eq!(channel.state(), ChannelState::Destroyed);
    assert_eq!(channel.stats().discarded, 1);
    assert_eq!(binding.channel_count(&host), 0);
}

#[test]
fn Binding___attach___prunes_destroyed_channels() {
    let host = Host::new();
    let binding = new_binding(&host);
    let first = DispatchChannel::create(&host, "first", |_: &Host, _: u8| {}).unwrap();
    binding.attach(&host, Box::new(first.clone()));
    first.retire(RetireMode::Drain);

    let second = DispatchChannel::create(&host, "second", |_: &Host, _: u8| {}).unwrap();
    binding.attach(&host, Box::new(second));

    assert_eq!(binding.with_core(&host, |core| core.channels.len()), 1);
}

#[test]
fn BindingCore___transition___rejects_illegal_edge() {
    let host = Host::new();
    let binding = new_binding(&host);

    let result = binding.with_core(&host, |core| core.transition(BindingState::Operational));

    assert!(matches!(result, Err(BridgeError::InvalidState { .. })));
    assert_eq!(binding.state(&host), BindingState::Created);
}

#[test]
fn BindingCore___expect_operational___reports_closed_binding() {
    let host = Host::new();
    let binding = new_binding(&host);
    binding.teardown(&host, RetireMode::Abort);

    let result = binding.with_core(&host, |core| core.expect_operational(BindingKind::Connection));

    assert_eq!(result.unwrap_err().to_string(), BridgeError::closed("connection").to_string());
}

#[test]
fn BindingOwner___close___tears_down_and_releases_allocation_reference() {
    let host = Host::new();
    let owner: BindingOwner<NativeHandle<u32>> =
        BindingOwner::new(&host, BindingKind::Stream, String::from("v"));
    let id = owner.binding_id().unwrap();

    assert!(owner.close());
    assert!(!owner.close());

    assert!(!BindingTracker::global().contains(id));
    assert!(owner.is_closed(&host));
    assert_eq!(owner.state(&host), BindingState::Closed);
    assert!(matches!(owner.binding(), Err(BridgeError::InvalidState { .. })));
    assert!(host.resolve::<String>(owner.value()).is_some());
}

#[test]
fn BindingOwner___drop___finalizes_and_collects_host_value() {
    let host = Host::new();
    let owner: BindingOwner<NativeHandle<u32>> =
        BindingOwner::new(&host, BindingKind::Client, 17_u64);
    let value = owner.value();
    let id = owner.binding_id().unwrap();
    let held = owner.binding().unwrap();

    drop(owner);

    assert!(host.resolve::<u64>(value).is_none());
    assert!(held.is_closed(&host));
    assert!(BindingTracker::global().contains(id));
    drop(held);
    assert!(!BindingTracker::global().contains(id));
}
