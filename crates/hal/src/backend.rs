//! Native USB access seam
//!
//! The topology engine drives all hardware access through this trait. The
//! production implementation wraps libusb (see `topology::backend`); tests
//! substitute a scripted mock.
//!
//! Implementations are not required to be internally synchronized: the engine
//! serializes every call that touches device state behind its process-wide
//! handle guard, and implementations may rely on that.

use crate::error::BackendError;
use crate::types::{DeviceId, DeviceRecord};

/// Narrow interface to the native USB access layer
pub trait UsbBackend: Send + Sync {
    /// Enumerate the devices currently visible on the bus
    ///
    /// Returns one record per device, each with its complete configuration
    /// and interface descriptor set. A failure to read one device's
    /// descriptors must not fail the whole pass: implementations skip that
    /// device (it is treated as absent for this cycle and picked up on a
    /// later one). Only a whole-bus failure is reported as an error.
    fn enumerate(&self) -> Result<Vec<DeviceRecord>, BackendError>;

    /// Query the device's currently active configuration value
    fn active_configuration(&self, id: DeviceId) -> Result<u8, BackendError>;

    /// Select the device's active configuration
    fn set_configuration(&self, id: DeviceId, value: u8) -> Result<(), BackendError>;

    /// Select the active alternate setting of one interface
    fn set_alternate_setting(
        &self,
        id: DeviceId,
        interface: u8,
        alternate: u8,
    ) -> Result<(), BackendError>;

    /// Fetch and decode a string descriptor
    ///
    /// Index 0 is the language-ID table, not a string; callers are expected
    /// to short-circuit it to `None` without reaching the backend.
    fn string_descriptor(&self, id: DeviceId, index: u8) -> Result<Option<String>, BackendError>;

    /// Drop any session state held for a device that has been detached
    ///
    /// Called by the scanner after a device disappears from enumeration.
    /// Must be infallible: there is nothing useful a caller could do with a
    /// failure to tear down a session for hardware that is already gone.
    fn forget(&self, id: DeviceId);
}
