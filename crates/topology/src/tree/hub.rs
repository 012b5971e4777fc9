//! The virtual root hub

use crate::tree::UsbDevice;
use hal::DeviceId;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Synthetic top-level node standing in for the host controller
///
/// Always present, always "active", never part of attach/detach
/// notifications. The USB topology is flattened to one level beneath it:
/// every enumerated device hangs directly off the root hub. The scanner is
/// the only writer of the device list.
pub struct UsbRootHub {
    devices: RwLock<BTreeMap<DeviceId, Arc<UsbDevice>>>,
}

impl UsbRootHub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            devices: RwLock::new(BTreeMap::new()),
        })
    }

    /// Currently attached devices, ascending by bus/address
    pub fn devices(&self) -> Vec<Arc<UsbDevice>> {
        self.read().values().cloned().collect()
    }

    pub fn device(&self, id: DeviceId) -> Option<Arc<UsbDevice>> {
        self.read().get(&id).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.read().len()
    }

    /// The root hub is synthetic: it cannot be unplugged or deactivated
    pub fn is_connected(&self) -> bool {
        true
    }

    pub fn description(&self) -> &'static str {
        "rust-usb-topology virtual root hub"
    }

    pub(crate) fn insert(&self, device: Arc<UsbDevice>) {
        self.write().insert(device.id(), device);
    }

    pub(crate) fn remove(&self, id: DeviceId) -> Option<Arc<UsbDevice>> {
        self.write().remove(&id)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<DeviceId, Arc<UsbDevice>>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<DeviceId, Arc<UsbDevice>>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }
}
