//! Descriptor record and identity types
//!
//! These are plain data carriers produced by a backend's enumeration pass and
//! consumed by the topology engine when it builds its node tree. They mirror
//! the fields of the standard USB device/configuration/interface descriptors
//! that the tree model needs, already decoded from their wire layout.

use serde::{Deserialize, Serialize};

/// Identity of one attached device: its position on the bus
///
/// Stable for the lifetime of a connection. A device that is unplugged and
/// replugged gets a new address and therefore a new identity, which is what
/// drives the scanner's attach/detach diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId {
    /// Bus number
    pub bus: u8,
    /// Device address on that bus
    pub address: u8,
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bus {:03} addr {:03}", self.bus, self.address)
    }
}

/// Cached device-descriptor fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// USB device class
    pub class: u8,
    /// USB device subclass
    pub subclass: u8,
    /// USB device protocol
    pub protocol: u8,
    /// String-descriptor index of the manufacturer name (if any)
    pub manufacturer_index: Option<u8>,
    /// String-descriptor index of the product name (if any)
    pub product_index: Option<u8>,
    /// String-descriptor index of the serial number (if any)
    pub serial_number_index: Option<u8>,
    /// Number of configurations the device exposes
    pub num_configurations: u8,
}

/// Decoded configuration-descriptor fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDescriptor {
    /// bConfigurationValue, the number passed to SET_CONFIGURATION
    pub value: u8,
    /// Device is self-powered in this configuration
    pub self_powered: bool,
    /// Device supports remote wakeup in this configuration
    pub remote_wakeup: bool,
    /// Maximum bus power draw in milliamps
    pub max_power_ma: u16,
    /// String-descriptor index of the configuration name (if any)
    pub string_index: Option<u8>,
}

/// Decoded interface-descriptor fields for one alternate setting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// bInterfaceNumber
    pub number: u8,
    /// bAlternateSetting
    pub alternate_setting: u8,
    /// USB interface class
    pub class: u8,
    /// USB interface subclass
    pub subclass: u8,
    /// USB interface protocol
    pub protocol: u8,
    /// String-descriptor index of the interface name (if any)
    pub string_index: Option<u8>,
    /// Number of endpoints in this alternate setting (excluding endpoint 0)
    pub endpoint_count: u8,
}

/// One configuration as reported by enumeration
///
/// `interfaces` preserves descriptor order; the engine's default
/// alternate-setting selection depends on that order being stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    pub descriptor: ConfigurationDescriptor,
    pub interfaces: Vec<InterfaceDescriptor>,
}

/// One device as reported by enumeration, with its full configuration set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub summary: DeviceSummary,
    pub configurations: Vec<ConfigurationRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_display() {
        let id = DeviceId { bus: 1, address: 42 };
        assert_eq!(id.to_string(), "bus 001 addr 042");
    }

    #[test]
    fn test_device_id_ordering() {
        let a = DeviceId { bus: 1, address: 9 };
        let b = DeviceId { bus: 2, address: 1 };
        assert!(a < b);
    }
}
