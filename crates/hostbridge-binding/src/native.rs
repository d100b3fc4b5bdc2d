//! Owned engine handles

use std::fmt;
use std::sync::Arc;

/// Function handing an engine handle back to its engine
pub type Releaser<T> = Arc<dyn Fn(T) + Send + Sync>;

/// An engine handle that is released back to the engine when dropped
///
/// This is the direct release path: whoever ends up holding the handle
/// last (a binding core, a discarded setup event, a failed construction)
/// releases it simply by dropping it.
pub struct NativeHandle<T> {
    handle: Option<T>,
    release: Releaser<T>,
}

impl<T> NativeHandle<T> {
    pub fn new(handle: T, release: Releaser<T>) -> Self {
        Self {
            handle: Some(handle),
            release,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.handle.as_ref()
    }
}

impl<T> Drop for NativeHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            (self.release)(handle);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeHandle").field(&self.handle).finish()
    }
}

#[cfg(test)]
#[path = "native/native_tests.rs"]
mod native_tests;
