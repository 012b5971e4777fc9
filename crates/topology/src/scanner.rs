//! Background device scanner
//!
//! Periodically re-enumerates the bus, diffs the result against the
//! previously known device set, and turns the delta into attach/detach
//! events: new identities get a fully built device node and an attached
//! notification, vanished identities are marked disconnected, dropped from
//! the root hub and reported detached.
//!
//! The scanner runs on its own dedicated thread for the lifetime of the
//! service and is the sole writer of the root hub's device list. The first
//! access to the tree forces one synchronous cycle so callers never observe
//! an empty tree just because the background task has not ticked yet.

use crate::guard::NativeLock;
use crate::listeners::ListenerSet;
use crate::tree::{UsbDevice, UsbRootHub};
use async_channel::{Receiver, Sender, TryRecvError, bounded};
use hal::{DeviceId, DeviceRecord, TopologyError, UsbBackend};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the sleeping scanner thread checks for a shutdown command
const SHUTDOWN_POLL: Duration = Duration::from_millis(25);

enum ScannerCommand {
    Shutdown,
}

struct ScanState {
    /// Snapshot of the previous cycle's device identities
    known: HashMap<DeviceId, Arc<UsbDevice>>,
}

pub struct TopologyScanner {
    backend: Arc<dyn UsbBackend>,
    lock: NativeLock,
    root: Arc<UsbRootHub>,
    listeners: Arc<ListenerSet>,
    scan_state: Mutex<ScanState>,
    scanned: AtomicBool,
}

impl TopologyScanner {
    pub(crate) fn new(
        backend: Arc<dyn UsbBackend>,
        lock: NativeLock,
        root: Arc<UsbRootHub>,
        listeners: Arc<ListenerSet>,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            lock,
            root,
            listeners,
            scan_state: Mutex::new(ScanState {
                known: HashMap::new(),
            }),
            scanned: AtomicBool::new(false),
        })
    }

    /// Run one synchronous scan cycle if none has completed yet
    ///
    /// Cheap once the first cycle is done. Safe to call from a listener
    /// callback: the completion flag is set before notifications fire, so a
    /// re-entrant call returns without touching the (non-reentrant) cycle
    /// mutex.
    pub(crate) fn first_scan(&self) {
        if self.scanned.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.scan() {
            warn!("initial scan failed: {}", e);
        }
    }

    /// Run one full scan cycle: enumerate, diff, publish, notify
    ///
    /// Cycles never overlap; the whole cycle (including notification
    /// fan-out) runs under one internal mutex, which also gives observers a
    /// totally ordered event stream. Per-device enumeration failures were
    /// already skipped by the backend; only a whole-bus failure lands here,
    /// abandoning this cycle to be retried on the next tick.
    pub fn scan(&self) -> Result<(), TopologyError> {
        let mut state = self
            .scan_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let records = self
            .lock
            .with_exclusive(|| self.backend.enumerate())
            .map_err(|e| TopologyError::Enumeration {
                message: e.to_string(),
            })?;

        let candidates: HashMap<DeviceId, &DeviceRecord> =
            records.iter().map(|record| (record.id, record)).collect();

        let departed: Vec<Arc<UsbDevice>> = state
            .known
            .values()
            .filter(|device| !candidates.contains_key(&device.id()))
            .cloned()
            .collect();

        let arrived: Vec<Arc<UsbDevice>> = records
            .iter()
            .filter(|record| !state.known.contains_key(&record.id))
            .map(|record| UsbDevice::from_record(record, self.backend.clone(), self.lock.clone()))
            .collect();

        for device in &departed {
            device.mark_disconnected();
            // Session teardown reaches the native layer, so it is guarded
            // like every other native call.
            self.lock.with_exclusive(|| self.backend.forget(device.id()));
            self.root.remove(device.id());
            state.known.remove(&device.id());
        }
        for device in &arrived {
            self.root.insert(device.clone());
            state.known.insert(device.id(), device.clone());
        }

        self.scanned.store(true, Ordering::SeqCst);

        for device in &departed {
            debug!("device detached: {:?}", device);
            self.listeners.notify_detached(device);
        }
        for device in &arrived {
            debug!("device attached: {:?}", device);
            self.listeners.notify_attached(device);
        }

        Ok(())
    }
}

/// Handle on the scanner thread
///
/// Dropping the handle without calling [`ScannerHandle::shutdown`] closes
/// the command channel; the thread notices at its next wakeup and exits on
/// its own, just without anyone waiting for it.
pub struct ScannerHandle {
    commands: Sender<ScannerCommand>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl ScannerHandle {
    /// Stop the scanner thread and wait for it to exit
    pub fn shutdown(mut self) {
        let _ = self.commands.send_blocking(ScannerCommand::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the dedicated scanner thread
pub(crate) fn spawn_scanner(scanner: Arc<TopologyScanner>, interval: Duration) -> ScannerHandle {
    let (commands, receiver) = bounded(1);
    let join = std::thread::Builder::new()
        .name("topology-scanner".to_string())
        .spawn(move || run_scanner(scanner, receiver, interval))
        .expect("Failed to spawn topology scanner thread");

    ScannerHandle {
        commands,
        join: Some(join),
    }
}

fn run_scanner(scanner: Arc<TopologyScanner>, commands: Receiver<ScannerCommand>, interval: Duration) {
    info!("topology scanner started (interval {:?})", interval);

    'outer: loop {
        match commands.try_recv() {
            Ok(ScannerCommand::Shutdown) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Empty) => {}
        }

        if let Err(e) = scanner.scan() {
            warn!("scan cycle failed: {}", e);
        }

        // Sleep the interval in short slices so shutdown stays prompt.
        let mut remaining = interval;
        while !remaining.is_zero() {
            match commands.try_recv() {
                Ok(ScannerCommand::Shutdown) | Err(TryRecvError::Closed) => break 'outer,
                Err(TryRecvError::Empty) => {}
            }
            let slice = remaining.min(SHUTDOWN_POLL);
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }

    info!("topology scanner stopped");
}
