//! Service facade
//!
//! Owns the virtual root hub, the listener registry and the background
//! scanner. This is the only type applications need to construct; everything
//! else is reached through the tree it exposes.

use crate::config::ServiceConfig;
use crate::guard::NativeLock;
use crate::listeners::{ListenerSet, TopologyListener};
use crate::scanner::{ScannerHandle, TopologyScanner, spawn_scanner};
use crate::tree::UsbRootHub;
use hal::{TopologyError, UsbBackend};
use std::sync::Arc;
use tracing::info;

pub struct UsbServices {
    root: Arc<UsbRootHub>,
    scanner: Arc<TopologyScanner>,
    listeners: Arc<ListenerSet>,
    handle: Option<ScannerHandle>,
}

impl UsbServices {
    /// Start the service on the given backend
    ///
    /// Creates the process-wide native lock, the root hub and the listener
    /// registry, and spawns the background scanner thread at the configured
    /// interval. The tree stays empty until the first cycle runs;
    /// [`UsbServices::root_hub`] forces one synchronously.
    pub fn new(backend: Arc<dyn UsbBackend>, config: &ServiceConfig) -> Self {
        let lock = NativeLock::new();
        let listeners = Arc::new(ListenerSet::new());
        let root = UsbRootHub::new();
        let scanner = TopologyScanner::new(backend, lock, root.clone(), listeners.clone());
        let handle = spawn_scanner(scanner.clone(), config.scan.interval());

        info!(
            "usb-topology services v{} started",
            env!("CARGO_PKG_VERSION")
        );

        Self {
            root,
            scanner,
            listeners,
            handle: Some(handle),
        }
    }

    /// The virtual root hub
    ///
    /// Forces one synchronous scan cycle if none has completed yet, so the
    /// very first caller already sees the devices present at startup.
    pub fn root_hub(&self) -> Arc<UsbRootHub> {
        self.scanner.first_scan();
        self.root.clone()
    }

    /// Force one synchronous scan cycle
    pub fn rescan(&self) -> Result<(), TopologyError> {
        self.scanner.scan()
    }

    pub fn add_listener(&self, listener: Arc<dyn TopologyListener>) {
        self.listeners.add(listener);
    }

    /// Remove a previously registered listener; true if it was registered
    pub fn remove_listener(&self, listener: &Arc<dyn TopologyListener>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn description(&self) -> &'static str {
        "rust-usb-topology topology service"
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Stop the background scanner and wait for its thread to exit
    pub fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
        }
        info!("usb-topology services stopped");
    }
}
