//! Test utilities for rust-usb-topology
//!
//! Provides a scripted mock of the native USB backend plus record builders,
//! shared by the test suites of every crate in the workspace.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{MockBackend, mock_configuration, mock_device};
//! use hal::UsbBackend;
//!
//! let backend = MockBackend::new();
//! backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
//!     mock_configuration(1, &[(0, 0), (0, 1)]),
//! ]));
//! assert_eq!(backend.enumerate().unwrap().len(), 1);
//! ```

use hal::{
    BackendError, ConfigurationDescriptor, ConfigurationRecord, DeviceId, DeviceRecord,
    DeviceSummary, InterfaceDescriptor, UsbBackend,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Build a device identity
pub fn mock_device_id(bus: u8, address: u8) -> DeviceId {
    DeviceId { bus, address }
}

/// Build an interface descriptor for one alternate setting
///
/// Vendor-specific class with a single endpoint; enough identity for the
/// topology tests, which only care about number/alternate pairs.
pub fn mock_interface(number: u8, alternate: u8) -> InterfaceDescriptor {
    InterfaceDescriptor {
        number,
        alternate_setting: alternate,
        class: 0xff,
        subclass: 0,
        protocol: 0,
        string_index: None,
        endpoint_count: 1,
    }
}

/// Build a configuration record from (interface number, alternate setting)
/// pairs, preserving the given order
pub fn mock_configuration(value: u8, settings: &[(u8, u8)]) -> ConfigurationRecord {
    ConfigurationRecord {
        descriptor: ConfigurationDescriptor {
            value,
            self_powered: false,
            remote_wakeup: false,
            max_power_ma: 100,
            string_index: None,
        },
        interfaces: settings
            .iter()
            .map(|&(number, alternate)| mock_interface(number, alternate))
            .collect(),
    }
}

/// Build a full device record
pub fn mock_device(
    bus: u8,
    address: u8,
    vendor_id: u16,
    product_id: u16,
    configurations: Vec<ConfigurationRecord>,
) -> DeviceRecord {
    DeviceRecord {
        id: mock_device_id(bus, address),
        summary: DeviceSummary {
            vendor_id,
            product_id,
            class: 0,
            subclass: 0,
            protocol: 0,
            manufacturer_index: Some(1),
            product_index: Some(2),
            serial_number_index: Some(3),
            num_configurations: configurations.len() as u8,
        },
        configurations,
    }
}

/// Per-operation call counters
#[derive(Debug, Default, Clone)]
pub struct CallCounts {
    pub enumerate: u32,
    pub active_configuration: u32,
    pub set_configuration: u32,
    pub set_alternate_setting: u32,
    pub string_descriptor: u32,
}

#[derive(Default)]
struct MockState {
    devices: Vec<DeviceRecord>,
    active: HashMap<DeviceId, u8>,
    strings: HashMap<(DeviceId, u8), String>,
    alternate_calls: Vec<(DeviceId, u8, u8)>,
    forgotten: Vec<DeviceId>,
    fail_enumerate: bool,
    fail_set_configuration: bool,
    fail_set_alternate_setting: bool,
    call_delay: Duration,
    calls: CallCounts,
}

/// Scripted stand-in for the native USB access layer
///
/// Devices are attached/detached by the test between scan cycles; failure
/// flags make the next native calls of a kind fail with a pipe error; call
/// counters let tests assert which operations actually reached the "native"
/// layer.
///
/// The mock also watches for overlapping native calls: every `UsbBackend`
/// method marks an in-flight window (optionally stretched with
/// `set_call_delay`), and two windows open at once trip `overlap_detected`.
/// This is how the handle-guard serialization property is tested.
pub struct MockBackend {
    state: Mutex<MockState>,
    in_flight: AtomicBool,
    overlapped: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            in_flight: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
        }
    }

    /// Plug a device into the scripted bus
    ///
    /// Seeds the native-side active configuration with the device's first
    /// configuration value, as real firmware does after SET_ADDRESS.
    pub fn attach(&self, record: DeviceRecord) {
        let mut state = self.lock_state();
        if let Some(first) = record.configurations.first() {
            state.active.insert(record.id, first.descriptor.value);
        }
        state.devices.retain(|d| d.id != record.id);
        state.devices.push(record);
    }

    /// Unplug a device from the scripted bus
    pub fn detach(&self, id: DeviceId) {
        let mut state = self.lock_state();
        state.devices.retain(|d| d.id != id);
        state.active.remove(&id);
    }

    /// Script a string descriptor
    pub fn set_string(&self, id: DeviceId, index: u8, value: &str) {
        self.lock_state().strings.insert((id, index), value.to_string());
    }

    /// Native-side active configuration, for assertions
    pub fn native_active(&self, id: DeviceId) -> Option<u8> {
        self.lock_state().active.get(&id).copied()
    }

    /// (interface, alternate) pairs that reached the native layer, in order
    pub fn alternate_calls(&self, id: DeviceId) -> Vec<(u8, u8)> {
        self.lock_state()
            .alternate_calls
            .iter()
            .filter(|(d, _, _)| *d == id)
            .map(|&(_, iface, alt)| (iface, alt))
            .collect()
    }

    /// Devices whose sessions were dropped via `forget`
    pub fn forgotten(&self) -> Vec<DeviceId> {
        self.lock_state().forgotten.clone()
    }

    pub fn set_fail_enumerate(&self, fail: bool) {
        self.lock_state().fail_enumerate = fail;
    }

    pub fn set_fail_set_configuration(&self, fail: bool) {
        self.lock_state().fail_set_configuration = fail;
    }

    pub fn set_fail_set_alternate_setting(&self, fail: bool) {
        self.lock_state().fail_set_alternate_setting = fail;
    }

    /// Stretch every native-call window, widening the race for overlap tests
    pub fn set_call_delay(&self, delay: Duration) {
        self.lock_state().call_delay = delay;
    }

    pub fn calls(&self) -> CallCounts {
        self.lock_state().calls.clone()
    }

    /// True if two native-call windows were ever open at the same time
    pub fn overlap_detected(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one scripted native call inside an in-flight window
    ///
    /// The state mutex is held only for the body; the delay runs with the
    /// window open but the mutex released, so an unserialized concurrent call
    /// is actually able to overlap and be detected.
    fn native_call<R>(&self, body: impl FnOnce(&mut MockState) -> R) -> R {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let (result, delay) = {
            let mut state = self.lock_state();
            let delay = state.call_delay;
            (body(&mut state), delay)
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbBackend for MockBackend {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>, BackendError> {
        self.native_call(|state| {
            state.calls.enumerate += 1;
            if state.fail_enumerate {
                return Err(BackendError::new(-1, "scripted enumeration failure"));
            }
            Ok(state.devices.clone())
        })
    }

    fn active_configuration(&self, id: DeviceId) -> Result<u8, BackendError> {
        self.native_call(|state| {
            state.calls.active_configuration += 1;
            state
                .active
                .get(&id)
                .copied()
                .ok_or_else(|| BackendError::new(-4, "no such device"))
        })
    }

    fn set_configuration(&self, id: DeviceId, value: u8) -> Result<(), BackendError> {
        self.native_call(|state| {
            state.calls.set_configuration += 1;
            if state.fail_set_configuration {
                return Err(BackendError::new(-9, "scripted control failure"));
            }
            if !state.devices.iter().any(|d| d.id == id) {
                return Err(BackendError::new(-4, "no such device"));
            }
            state.active.insert(id, value);
            Ok(())
        })
    }

    fn set_alternate_setting(
        &self,
        id: DeviceId,
        interface: u8,
        alternate: u8,
    ) -> Result<(), BackendError> {
        self.native_call(|state| {
            state.calls.set_alternate_setting += 1;
            if state.fail_set_alternate_setting {
                return Err(BackendError::new(-9, "scripted control failure"));
            }
            if !state.devices.iter().any(|d| d.id == id) {
                return Err(BackendError::new(-4, "no such device"));
            }
            state.alternate_calls.push((id, interface, alternate));
            Ok(())
        })
    }

    fn string_descriptor(&self, id: DeviceId, index: u8) -> Result<Option<String>, BackendError> {
        self.native_call(|state| {
            state.calls.string_descriptor += 1;
            Ok(state.strings.get(&(id, index)).cloned())
        })
    }

    fn forget(&self, id: DeviceId) {
        self.lock_state().forgotten.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_and_enumerate() {
        let backend = MockBackend::new();
        backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
            mock_configuration(1, &[(0, 0)]),
        ]));

        let devices = backend.enumerate().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, mock_device_id(1, 4));
        assert_eq!(backend.native_active(mock_device_id(1, 4)), Some(1));
        assert_eq!(backend.calls().enumerate, 1);
    }

    #[test]
    fn test_scripted_failures() {
        let backend = MockBackend::new();
        backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
            mock_configuration(1, &[(0, 0)]),
        ]));

        backend.set_fail_set_configuration(true);
        let err = backend
            .set_configuration(mock_device_id(1, 4), 1)
            .unwrap_err();
        assert_eq!(err.code, -9);
        assert_eq!(backend.native_active(mock_device_id(1, 4)), Some(1));

        backend.set_fail_set_configuration(false);
        backend.set_configuration(mock_device_id(1, 4), 2).unwrap();
        assert_eq!(backend.native_active(mock_device_id(1, 4)), Some(2));
    }

    #[test]
    fn test_overlap_detection_trips_without_serialization() {
        let backend = std::sync::Arc::new(MockBackend::new());
        backend.set_call_delay(Duration::from_millis(50));

        let threads: Vec<_> = (0..2)
            .map(|_| {
                let backend = backend.clone();
                std::thread::spawn(move || {
                    let _ = backend.enumerate();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert!(backend.overlap_detected());
    }
}
