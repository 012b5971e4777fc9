//! Process-wide serialization of native USB calls
//!
//! The native access layer is not assumed reentrant or thread-safe across
//! arbitrary calls: opening handles, switching configurations and switching
//! alternate settings must never interleave. Every component that performs
//! such a call receives a clone of one [`NativeLock`] at construction and
//! wraps the call in [`NativeLock::with_exclusive`]. Cached-state reads do
//! not take this lock.

use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable handle on the process-wide native-access lock
///
/// All clones share the same underlying mutex; at most one guarded region is
/// in flight anywhere in the process at a time.
#[derive(Clone, Default)]
pub struct NativeLock {
    inner: Arc<Mutex<()>>,
}

impl NativeLock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(())),
        }
    }

    /// Run `f` as the only native-affecting operation in the process
    ///
    /// Blocks until the lock is available, runs `f`, releases. Errors from
    /// `f` pass through untouched; the guard never retries. A poisoned mutex
    /// is recovered rather than propagated: the lock orders calls into a
    /// foreign library and protects no Rust data, so a panic inside one
    /// guarded region must not wedge every later native call.
    pub fn with_exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
