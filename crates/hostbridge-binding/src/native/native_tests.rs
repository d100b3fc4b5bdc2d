#![allow(non_snake_case)]

use super::*;
use parking_lot::Mutex;
use std::thread;

fn recording_releaser() -> (Releaser<u32>, Arc<Mutex<Vec<u32>>>) {
    let released = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&released);
    (Arc::new(move |handle| sink.lock().push(handle)), released)
}

#[test]
fn NativeHandle___drop___releases_once() {
    let (release, released) = recording_releaser();
    let handle = NativeHandle::new(11, release);

    assert_eq!(handle.get(), Some(&11));
    drop(handle);

    assert_eq!(*released.lock(), vec![11]);
}

#[test]
fn NativeHandle___drop___on_other_thread_releases_there() {
    let (release, released) = recording_releaser();
    let handle = NativeHandle::new(3, release);

    thread::spawn(move || drop(handle)).join().unwrap();

    assert_eq!(*released.lock(), vec![3]);
}
