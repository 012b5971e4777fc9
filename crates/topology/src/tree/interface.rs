//! One alternate setting of one interface

use crate::tree::{DeviceState, UsbConfiguration};
use hal::{InterfaceDescriptor, TopologyError};
use std::sync::{Arc, Weak};

/// One alternate setting of one interface number
///
/// Immutable after construction. Whether this setting is the interface's
/// active one is tracked by the owning configuration, not here.
pub struct UsbInterface {
    descriptor: InterfaceDescriptor,
    configuration: Weak<UsbConfiguration>,
    state: Arc<DeviceState>,
}

impl UsbInterface {
    pub(crate) fn new(
        descriptor: InterfaceDescriptor,
        configuration: Weak<UsbConfiguration>,
        state: Arc<DeviceState>,
    ) -> Self {
        Self {
            descriptor,
            configuration,
            state,
        }
    }

    pub fn descriptor(&self) -> &InterfaceDescriptor {
        &self.descriptor
    }

    /// bInterfaceNumber
    pub fn number(&self) -> u8 {
        self.descriptor.number
    }

    /// bAlternateSetting
    pub fn alternate_setting(&self) -> u8 {
        self.descriptor.alternate_setting
    }

    /// The owning configuration
    ///
    /// `None` only if the configuration has already been dropped, which
    /// cannot happen while the device is still reachable through the tree.
    pub fn configuration(&self) -> Option<Arc<UsbConfiguration>> {
        self.configuration.upgrade()
    }

    /// Whether this setting is currently the active one for its interface
    /// number
    pub fn is_active(self: &Arc<Self>) -> bool {
        match self.configuration.upgrade() {
            Some(configuration) => configuration
                .interface(self.descriptor.number)
                .map(|active| Arc::ptr_eq(&active, self))
                .unwrap_or(false),
            None => false,
        }
    }

    /// The interface name string, if the device provides one
    pub fn description(&self) -> Result<Option<String>, TopologyError> {
        match self.descriptor.string_index {
            Some(index) => self.state.string_descriptor(index),
            None => Ok(None),
        }
    }
}
