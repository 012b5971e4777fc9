//! One attached USB device

use crate::guard::NativeLock;
use crate::tree::{DeviceState, UsbConfiguration};
use hal::{DeviceId, DeviceRecord, DeviceSummary, TopologyError, UsbBackend};
use std::sync::Arc;

/// One attached device and its eagerly built configuration tree
///
/// Created by the scanner when the device first shows up in enumeration and
/// marked disconnected when it disappears; a replug produces a brand-new
/// node. After disconnection every operation that would touch native state
/// fails with `DeviceUnavailable`.
pub struct UsbDevice {
    state: Arc<DeviceState>,
    summary: DeviceSummary,
    configurations: Vec<Arc<UsbConfiguration>>,
}

impl UsbDevice {
    pub(crate) fn from_record(
        record: &DeviceRecord,
        backend: Arc<dyn UsbBackend>,
        lock: NativeLock,
    ) -> Arc<Self> {
        let state = Arc::new(DeviceState::new(record.id, backend, lock));
        let configurations = record
            .configurations
            .iter()
            .map(|config| UsbConfiguration::from_record(config, state.clone()))
            .collect();
        Arc::new(Self {
            state,
            summary: record.summary.clone(),
            configurations,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.state.id()
    }

    pub fn bus_number(&self) -> u8 {
        self.state.id().bus
    }

    pub fn address(&self) -> u8 {
        self.state.id().address
    }

    pub fn summary(&self) -> &DeviceSummary {
        &self.summary
    }

    pub fn vendor_id(&self) -> u16 {
        self.summary.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.summary.product_id
    }

    /// All configurations, in descriptor order; immutable after construction
    pub fn configurations(&self) -> &[Arc<UsbConfiguration>] {
        &self.configurations
    }

    /// Configuration with the given bConfigurationValue
    pub fn configuration(&self, value: u8) -> Option<Arc<UsbConfiguration>> {
        self.configurations
            .iter()
            .find(|config| config.value() == value)
            .cloned()
    }

    /// The active configuration value — cached, or one guarded native query
    pub fn active_configuration_number(&self) -> Result<u8, TopologyError> {
        self.state.active_configuration_number()
    }

    /// The active configuration node
    ///
    /// `Ok(None)` if the native layer reports a configuration value that
    /// does not match any descriptor-listed configuration (seen on devices
    /// in an unconfigured state, where the value is 0).
    pub fn active_configuration(&self) -> Result<Option<Arc<UsbConfiguration>>, TopologyError> {
        let value = self.state.active_configuration_number()?;
        Ok(self.configuration(value))
    }

    /// Switch the device to the given configuration
    ///
    /// No-op (no native call) when `value` is already the cached active
    /// configuration. The cache is updated only after the native call
    /// succeeds; on failure the previous value stays authoritative, since
    /// the hardware state did not change.
    pub fn set_active_configuration(&self, value: u8) -> Result<(), TopologyError> {
        self.state.set_active_configuration(value)
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Fail fast if the scanner has marked this device disconnected
    pub fn check_connected(&self) -> Result<(), TopologyError> {
        self.state.check_connected()
    }

    /// Fetch a string descriptor; index 0 yields `None` without a native call
    pub fn string_descriptor(&self, index: u8) -> Result<Option<String>, TopologyError> {
        self.state.string_descriptor(index)
    }

    pub fn manufacturer(&self) -> Result<Option<String>, TopologyError> {
        self.string_by_index(self.summary.manufacturer_index)
    }

    pub fn product(&self) -> Result<Option<String>, TopologyError> {
        self.string_by_index(self.summary.product_index)
    }

    pub fn serial_number(&self) -> Result<Option<String>, TopologyError> {
        self.string_by_index(self.summary.serial_number_index)
    }

    fn string_by_index(&self, index: Option<u8>) -> Result<Option<String>, TopologyError> {
        match index {
            Some(index) => self.state.string_descriptor(index),
            None => Ok(None),
        }
    }

    /// Scanner-only: the device disappeared from enumeration
    pub(crate) fn mark_disconnected(&self) {
        self.state.mark_disconnected();
    }
}

impl std::fmt::Debug for UsbDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbDevice")
            .field("id", &self.state.id())
            .field("vendor_id", &format_args!("{:04x}", self.summary.vendor_id))
            .field("product_id", &format_args!("{:04x}", self.summary.product_id))
            .field("connected", &self.state.is_connected())
            .finish()
    }
}
