//! Topology and backend error types

use crate::types::DeviceId;
use thiserror::Error;

/// Error returned by a native backend call
///
/// `code` carries the native (libusb-style, negative) status code so callers
/// can distinguish access problems from devices that went away mid-call.
#[derive(Debug, Clone, Error)]
#[error("native call failed with status {code}: {message}")]
pub struct BackendError {
    /// Native status code
    pub code: i32,
    /// Human-readable description from the native layer
    pub message: String,
}

impl BackendError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors surfaced by topology-tree operations
#[derive(Debug, Clone, Error)]
pub enum TopologyError {
    /// Operation attempted on a device the scanner has marked disconnected
    #[error("device {id} is no longer connected")]
    DeviceUnavailable { id: DeviceId },

    /// Native SET_CONFIGURATION call failed; the previous active
    /// configuration is still in effect
    #[error("switching to configuration {value} failed (status {status})")]
    ConfigurationSwitchFailed { value: u8, status: i32 },

    /// Native SET_INTERFACE call failed; the previous alternate setting is
    /// still in effect
    #[error("switching interface {number} to alternate setting {alternate} failed (status {status})")]
    InterfaceSwitchFailed {
        number: u8,
        alternate: u8,
        status: i32,
    },

    /// Native query of the active configuration failed
    #[error("querying the active configuration failed (status {status})")]
    ConfigurationQueryFailed { status: i32 },

    /// Unknown interface number requested on a configuration
    #[error("configuration has no interface {number}")]
    InterfaceNotFound { number: u8 },

    /// Native string-descriptor fetch failed
    #[error("reading string descriptor {index} failed (status {status})")]
    StringReadFailed { index: u8, status: i32 },

    /// Bus enumeration failed as a whole; the scan cycle that hit this is
    /// abandoned and retried on the next tick
    #[error("device enumeration failed: {message}")]
    Enumeration { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new(-4, "no such device");
        let msg = format!("{}", err);
        assert!(msg.contains("-4"));
        assert!(msg.contains("no such device"));
    }

    #[test]
    fn test_topology_error_display() {
        let err = TopologyError::DeviceUnavailable {
            id: DeviceId { bus: 3, address: 7 },
        };
        assert!(format!("{}", err).contains("bus 003 addr 007"));

        let err = TopologyError::InterfaceSwitchFailed {
            number: 1,
            alternate: 2,
            status: -9,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("interface 1"));
        assert!(msg.contains("alternate setting 2"));
        assert!(msg.contains("-9"));
    }
}
