use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Invalidate-on-write cached value.
///
/// `valid` is a lock-free hint read before touching the value mutex. The owner
/// must call [`CachedValue::store`] and [`CachedValue::invalidate`] while holding
/// its own state lock; that single writer-side lock is what keeps a rebuild from
/// publishing a value computed from state that a concurrent write has already
/// replaced. Readers that race a writer see either the previous complete value
/// or nothing, never a partial one.
#[derive(Debug)]
pub(crate) struct CachedValue<T> {
    valid: AtomicBool,
    value: Mutex<Option<T>>,
    rebuilds: AtomicUsize,
}

impl<T: Clone> CachedValue<T> {
    pub(crate) fn new() -> Self {
        Self {
            valid: AtomicBool::new(false),
            value: Mutex::new(None),
            rebuilds: AtomicUsize::new(0),
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Copy of the cached value, or `None` when a rebuild is required.
    pub(crate) fn get(&self) -> Option<T> {
        if !self.is_valid() {
            return None;
        }
        self.lock_value().clone()
    }

    pub(crate) fn store(&self, value: T) {
        *self.lock_value() = Some(value);
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        self.valid.store(true, Ordering::Release);
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
        *self.lock_value() = None;
    }

    pub(crate) fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::Relaxed)
    }

    fn lock_value(&self) -> MutexGuard<'_, Option<T>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
