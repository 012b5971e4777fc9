//! Shared per-device mutable state
//!
//! One `DeviceState` is shared (via `Arc`) between a device node and every
//! configuration and interface node beneath it. It carries exactly the
//! pieces the lower nodes need to perform their own native calls, which is
//! what lets back-references stay non-owning.

use crate::guard::NativeLock;
use hal::{BackendError, DeviceId, TopologyError, UsbBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub(crate) struct DeviceState {
    id: DeviceId,
    backend: Arc<dyn UsbBackend>,
    lock: NativeLock,
    connected: AtomicBool,
    /// Cached active configuration value; `None` until the first native
    /// query or the first successful switch.
    active_config: RwLock<Option<u8>>,
}

impl DeviceState {
    pub(crate) fn new(id: DeviceId, backend: Arc<dyn UsbBackend>, lock: NativeLock) -> Self {
        Self {
            id,
            backend,
            lock,
            connected: AtomicBool::new(true),
            active_config: RwLock::new(None),
        }
    }

    pub(crate) fn id(&self) -> DeviceId {
        self.id
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn check_connected(&self) -> Result<(), TopologyError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TopologyError::DeviceUnavailable { id: self.id })
        }
    }

    /// Scanner-only: the device disappeared from enumeration
    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Cached active configuration value, if any
    ///
    /// A brief shared-lock read; may be stale by at most the duration of one
    /// in-flight guarded switch.
    pub(crate) fn cached_active_configuration(&self) -> Option<u8> {
        *self
            .active_config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_active_configuration(&self, value: u8) {
        *self
            .active_config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    /// Cached value, or a guarded native query that fills the cache
    pub(crate) fn active_configuration_number(&self) -> Result<u8, TopologyError> {
        self.check_connected()?;
        if let Some(value) = self.cached_active_configuration() {
            return Ok(value);
        }
        let value = self
            .lock
            .with_exclusive(|| self.backend.active_configuration(self.id))
            .map_err(|e: BackendError| TopologyError::ConfigurationQueryFailed { status: e.code })?;
        self.cache_active_configuration(value);
        Ok(value)
    }

    /// Guarded SET_CONFIGURATION; cache is updated only on success
    pub(crate) fn set_active_configuration(&self, value: u8) -> Result<(), TopologyError> {
        self.check_connected()?;
        if self.cached_active_configuration() == Some(value) {
            return Ok(());
        }
        self.lock
            .with_exclusive(|| self.backend.set_configuration(self.id, value))
            .map_err(|e| TopologyError::ConfigurationSwitchFailed {
                value,
                status: e.code,
            })?;
        self.cache_active_configuration(value);
        Ok(())
    }

    /// Guarded SET_INTERFACE; the caller owns the active-settings bookkeeping
    pub(crate) fn set_alternate_setting(
        &self,
        interface: u8,
        alternate: u8,
    ) -> Result<(), TopologyError> {
        self.check_connected()?;
        self.lock
            .with_exclusive(|| {
                self.backend
                    .set_alternate_setting(self.id, interface, alternate)
            })
            .map_err(|e| TopologyError::InterfaceSwitchFailed {
                number: interface,
                alternate,
                status: e.code,
            })
    }

    /// Guarded string-descriptor fetch; index 0 is the language-ID table and
    /// short-circuits to `None` without a native call
    pub(crate) fn string_descriptor(&self, index: u8) -> Result<Option<String>, TopologyError> {
        self.check_connected()?;
        if index == 0 {
            return Ok(None);
        }
        self.lock
            .with_exclusive(|| self.backend.string_descriptor(self.id, index))
            .map_err(|e| TopologyError::StringReadFailed {
                index,
                status: e.code,
            })
    }
}
