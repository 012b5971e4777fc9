//! rust-usb-topology engine
//!
//! Presents USB hardware as a hierarchical tree — a virtual root hub, its
//! attached devices, their configurations, interfaces and alternate settings —
//! and keeps that tree consistent while devices are hot-plugged and while
//! application code switches active configurations or interface settings.
//!
//! The entry point is [`UsbServices`]: it owns the virtual root hub, runs the
//! background scanner thread that diffs bus enumerations into attach/detach
//! events, and fans those events out to registered [`TopologyListener`]s.
//! Every native call that touches device state is serialized behind one
//! process-wide [`NativeLock`], because the underlying access layer is treated
//! as a single-threaded resource.

pub mod backend;
pub mod config;
pub mod guard;
pub mod listeners;
pub mod scanner;
pub mod services;
pub mod tree;

pub use backend::LibusbBackend;
pub use config::ServiceConfig;
pub use guard::NativeLock;
pub use listeners::TopologyListener;
pub use scanner::ScannerHandle;
pub use services::UsbServices;
pub use tree::{UsbConfiguration, UsbDevice, UsbInterface, UsbRootHub};
