//! Attach/detach notification fan-out
//!
//! Observers register through the service facade and are called back
//! synchronously from the scanner's cycle. One observer's panic must not
//! starve the rest of the fan-out, so every callback runs isolated under
//! `catch_unwind` and a panicking observer is logged and skipped.

use crate::tree::UsbDevice;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

/// Observer of device attach/detach events
///
/// Callbacks run on the scanner thread (or, for the very first scan, on the
/// application thread that forced it); keep them brief and never call back
/// into switch operations from inside one.
pub trait TopologyListener: Send + Sync {
    /// A device appeared in enumeration and joined the root hub's list
    fn device_attached(&self, device: &Arc<UsbDevice>);

    /// A device disappeared from enumeration; it is already marked
    /// disconnected and removed from the root hub's list
    fn device_detached(&self, device: &Arc<UsbDevice>);
}

/// Unordered registry of listeners with identity-based removal
pub(crate) struct ListenerSet {
    listeners: Mutex<Vec<Arc<dyn TopologyListener>>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Arc<dyn TopologyListener>) {
        self.lock().push(listener);
    }

    /// Remove by identity; true if the listener was registered
    pub(crate) fn remove(&self, listener: &Arc<dyn TopologyListener>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|registered| !Arc::ptr_eq(registered, listener));
        listeners.len() != before
    }

    pub(crate) fn notify_attached(&self, device: &Arc<UsbDevice>) {
        self.for_each("attached", device, |listener| {
            listener.device_attached(device)
        });
    }

    pub(crate) fn notify_detached(&self, device: &Arc<UsbDevice>) {
        self.for_each("detached", device, |listener| {
            listener.device_detached(device)
        });
    }

    fn for_each(
        &self,
        event: &str,
        device: &Arc<UsbDevice>,
        callback: impl Fn(&Arc<dyn TopologyListener>),
    ) {
        // Snapshot so a callback can add/remove listeners without deadlock;
        // changes take effect from the next notification on.
        let snapshot = self.lock().clone();
        for listener in &snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| callback(listener)));
            if let Err(panic) = result {
                error!(
                    "listener panicked during {} notification for {}: {:?}",
                    event,
                    device.id(),
                    panic
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn TopologyListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopListener;

    impl TopologyListener for NoopListener {
        fn device_attached(&self, _device: &Arc<UsbDevice>) {}

        fn device_detached(&self, _device: &Arc<UsbDevice>) {}
    }

    #[test]
    fn test_remove_is_identity_based() {
        let set = ListenerSet::new();
        let a: Arc<dyn TopologyListener> = Arc::new(NoopListener);
        let b: Arc<dyn TopologyListener> = Arc::new(NoopListener);

        set.add(a.clone());
        assert!(!set.remove(&b));
        assert!(set.remove(&a));
        assert!(!set.remove(&a));
    }
}
