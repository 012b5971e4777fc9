//! The topology tree: root hub, devices, configurations, interfaces
//!
//! Ownership flows strictly downward — root hub → device → configuration →
//! interface. Upward references are non-owning: interfaces hold a `Weak`
//! back-reference to their configuration, and configurations reach the
//! device's shared mutable state (connected flag, cached active
//! configuration, backend, handle guard) through a shared `DeviceState`
//! rather than a parent pointer, so the tree never forms a reference cycle.

mod configuration;
mod device;
mod hub;
mod interface;
mod state;

pub use configuration::UsbConfiguration;
pub use device::UsbDevice;
pub use hub::UsbRootHub;
pub use interface::UsbInterface;

pub(crate) use state::DeviceState;
