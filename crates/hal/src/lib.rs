//! Hardware abstraction layer for rust-usb-topology
//!
//! This crate defines the data model shared by the topology engine and its
//! native USB backend: device identities, descriptor record types, the
//! `UsbBackend` trait that the engine consumes, and the typed error kinds
//! surfaced to applications.
//!
//! It deliberately has no dependency on any concrete USB library; the
//! `rusb`-backed implementation lives in the `topology` crate and test code
//! substitutes a scripted mock.

pub mod backend;
pub mod error;
pub mod types;

pub use backend::UsbBackend;
pub use error::{BackendError, TopologyError};
pub use types::{
    ConfigurationDescriptor, ConfigurationRecord, DeviceId, DeviceRecord, DeviceSummary,
    InterfaceDescriptor,
};
