//! Reference-counted handle with a zero-callback
//!
//! [`RefHandle`] keeps a value alive across every interval during which
//! some thread may still touch it. Cloning acquires a reference and
//! dropping releases one. When the last reference is released the
//! registered zero-callback runs synchronously on whichever thread
//! performed that release, so it must only do thread-agnostic cleanup.

use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

type ZeroCallback<T> = Box<dyn FnOnce(&mut T) + Send>;

struct RefInner<T> {
    value: T,
    on_zero: Mutex<Option<ZeroCallback<T>>>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.on_zero.get_mut().take() {
            callback(&mut self.value);
        }
    }
}

/// Owned, cloneable reference to a shared value
pub struct RefHandle<T> {
    inner: Arc<RefInner<T>>,
}

impl<T> RefHandle<T> {
    /// Wrap a value with a reference count of one
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RefInner {
                value,
                on_zero: Mutex::new(None),
            }),
        }
    }

    /// Wrap a value and register the callback run when the count reaches zero
    pub fn with_zero_callback<F>(value: T, on_zero: F) -> Self
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        Self {
            inner: Arc::new(RefInner {
                value,
                on_zero: Mutex::new(Some(Box::new(on_zero))),
            }),
        }
    }

    /// Take another reference to the same value
    pub fn acquire(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Give up this reference
    pub fn release(self) {
        drop(self);
    }

    /// Number of live references
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Non-owning reference that can observe whether the value is still alive
    pub fn downgrade(&self) -> WeakRefHandle<T> {
        WeakRefHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Check whether two handles refer to the same value
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl<T> Deref for RefHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: fmt::Debug> fmt::Debug for RefHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefHandle")
            .field("ref_count", &self.ref_count())
            .field("value", &self.inner.value)
            .finish()
    }
}

/// Non-owning counterpart of [`RefHandle`]
pub struct WeakRefHandle<T> {
    inner: Weak<RefInner<T>>,
}

impl<T> WeakRefHandle<T> {
    /// Acquire a reference if the value is still alive
    pub fn upgrade(&self) -> Option<RefHandle<T>> {
        self.inner.upgrade().map(|inner| RefHandle { inner })
    }

    /// Check whether any strong reference remains
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakRefHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}
