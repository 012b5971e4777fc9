//! libusb-backed implementation of the native access seam
//!
//! Wraps a `rusb::Context` and implements `hal::UsbBackend` on top of it.
//! Sessions (open device handles) are managed internally, keyed by device
//! identity: opened lazily on the first state-touching call, dropped when the
//! scanner reports the device gone. The backend performs no locking of its
//! own — callers hold the process-wide `NativeLock` around every call.

use crate::config::UsbSettings;
use hal::{
    BackendError, ConfigurationDescriptor, ConfigurationRecord, DeviceId, DeviceRecord,
    DeviceSummary, InterfaceDescriptor, UsbBackend,
};
use rusb::{ConfigDescriptor, Context, Device, DeviceHandle, UsbContext};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Linux Foundation vendor id used by host-controller root hubs
const ROOT_HUB_VENDOR: u16 = 0x1d6b;
/// USB hub device class
const CLASS_HUB: u8 = 9;

struct Session {
    handle: DeviceHandle<Context>,
    claimed: Vec<u8>,
}

pub struct LibusbBackend {
    context: Context,
    hide_root_hubs: bool,
    sessions: Mutex<HashMap<DeviceId, Session>>,
}

impl LibusbBackend {
    /// Initialize the native layer
    pub fn new(settings: &UsbSettings) -> Result<Self, BackendError> {
        let context = Context::new().map_err(map_rusb_error)?;
        Ok(Self {
            context,
            hide_root_hubs: settings.hide_root_hubs,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn read_device(&self, device: &Device<Context>) -> Result<Option<DeviceRecord>, rusb::Error> {
        let descriptor = device.device_descriptor()?;

        // Host-controller root hubs are represented by the virtual root hub
        // in the topology model, not as devices beneath it.
        if self.hide_root_hubs
            && descriptor.vendor_id() == ROOT_HUB_VENDOR
            && descriptor.class_code() == CLASS_HUB
        {
            return Ok(None);
        }

        let mut configurations = Vec::with_capacity(descriptor.num_configurations() as usize);
        for index in 0..descriptor.num_configurations() {
            let config = device.config_descriptor(index)?;
            configurations.push(read_configuration(&config));
        }

        Ok(Some(DeviceRecord {
            id: DeviceId {
                bus: device.bus_number(),
                address: device.address(),
            },
            summary: DeviceSummary {
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                class: descriptor.class_code(),
                subclass: descriptor.sub_class_code(),
                protocol: descriptor.protocol_code(),
                manufacturer_index: descriptor.manufacturer_string_index(),
                product_index: descriptor.product_string_index(),
                serial_number_index: descriptor.serial_number_string_index(),
                num_configurations: descriptor.num_configurations(),
            },
            configurations,
        }))
    }

    fn open_session(&self, id: DeviceId) -> Result<Session, rusb::Error> {
        let device = self
            .context
            .devices()?
            .iter()
            .find(|device| device.bus_number() == id.bus && device.address() == id.address)
            .ok_or(rusb::Error::NoDevice)?;
        let handle = device.open()?;
        debug!("opened session for {}", id);
        Ok(Session {
            handle,
            claimed: Vec::new(),
        })
    }

    /// Run `f` against the device's session, opening one if necessary
    fn with_session<R>(
        &self,
        id: DeviceId,
        f: impl FnOnce(&mut Session) -> Result<R, rusb::Error>,
    ) -> Result<R, BackendError> {
        let mut sessions = self.lock_sessions();
        let session = match sessions.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(self.open_session(id).map_err(map_rusb_error)?)
            }
        };
        f(session).map_err(map_rusb_error)
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<DeviceId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UsbBackend for LibusbBackend {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>, BackendError> {
        let devices = self.context.devices().map_err(map_rusb_error)?;
        let mut records = Vec::new();
        for device in devices.iter() {
            match self.read_device(&device) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                // One unreadable device must not abort the pass; it is
                // simply absent this cycle and retried on the next one.
                Err(e) => warn!(
                    "skipping device at bus {:03} addr {:03} during enumeration: {}",
                    device.bus_number(),
                    device.address(),
                    e
                ),
            }
        }
        debug!("enumerated {} devices", records.len());
        Ok(records)
    }

    fn active_configuration(&self, id: DeviceId) -> Result<u8, BackendError> {
        self.with_session(id, |session| session.handle.active_configuration())
    }

    fn set_configuration(&self, id: DeviceId, value: u8) -> Result<(), BackendError> {
        self.with_session(id, |session| {
            session.handle.set_active_configuration(value)
        })
    }

    fn set_alternate_setting(
        &self,
        id: DeviceId,
        interface: u8,
        alternate: u8,
    ) -> Result<(), BackendError> {
        self.with_session(id, |session| {
            ensure_claimed(session, interface)?;
            session.handle.set_alternate_setting(interface, alternate)
        })
    }

    fn string_descriptor(&self, id: DeviceId, index: u8) -> Result<Option<String>, BackendError> {
        self.with_session(id, |session| {
            session.handle.read_string_descriptor_ascii(index).map(Some)
        })
    }

    fn forget(&self, id: DeviceId) {
        let mut sessions = self.lock_sessions();
        if let Some(session) = sessions.remove(&id) {
            release_session(id, session);
        }
    }
}

fn read_configuration(config: &ConfigDescriptor) -> ConfigurationRecord {
    let mut interfaces = Vec::new();
    for interface in config.interfaces() {
        for descriptor in interface.descriptors() {
            interfaces.push(InterfaceDescriptor {
                number: descriptor.interface_number(),
                alternate_setting: descriptor.setting_number(),
                class: descriptor.class_code(),
                subclass: descriptor.sub_class_code(),
                protocol: descriptor.protocol_code(),
                string_index: descriptor.description_string_index(),
                endpoint_count: descriptor.num_endpoints(),
            });
        }
    }
    ConfigurationRecord {
        descriptor: ConfigurationDescriptor {
            value: config.number(),
            self_powered: config.self_powered(),
            remote_wakeup: config.remote_wakeup(),
            max_power_ma: config.max_power(),
            string_index: config.description_string_index(),
        },
        interfaces,
    }
}

/// Claim the interface before switching its alternate setting, detaching a
/// kernel driver first when one is bound
fn ensure_claimed(session: &mut Session, interface: u8) -> Result<(), rusb::Error> {
    if session.claimed.contains(&interface) {
        return Ok(());
    }

    match session.handle.kernel_driver_active(interface) {
        Ok(true) => {
            if let Err(e) = session.handle.detach_kernel_driver(interface) {
                warn!(
                    "failed to detach kernel driver from interface {}: {}",
                    interface, e
                );
            }
        }
        Ok(false) => {}
        Err(e) => {
            debug!(
                "could not check kernel driver status for interface {}: {}",
                interface, e
            );
        }
    }

    session.handle.claim_interface(interface)?;
    session.claimed.push(interface);
    Ok(())
}

/// Release claimed interfaces and hand them back to the kernel
///
/// Failures are expected when the device is already gone and only worth a
/// debug line.
fn release_session(id: DeviceId, session: Session) {
    for interface in &session.claimed {
        if let Err(e) = session.handle.release_interface(*interface) {
            debug!("failed to release interface {} on {}: {}", interface, id, e);
        }
        if let Err(e) = session.handle.attach_kernel_driver(*interface) {
            debug!(
                "could not reattach kernel driver to interface {} on {}: {}",
                interface, id, e
            );
        }
    }
    debug!("closed session for {}", id);
}

/// Map a rusb error to its native (libusb) status code
fn status_code(err: &rusb::Error) -> i32 {
    match err {
        rusb::Error::Io => -1,
        rusb::Error::InvalidParam => -2,
        rusb::Error::Access => -3,
        rusb::Error::NoDevice => -4,
        rusb::Error::NotFound => -5,
        rusb::Error::Busy => -6,
        rusb::Error::Timeout => -7,
        rusb::Error::Overflow => -8,
        rusb::Error::Pipe => -9,
        rusb::Error::Interrupted => -10,
        rusb::Error::NoMem => -11,
        rusb::Error::NotSupported => -12,
        _ => -99,
    }
}

fn map_rusb_error(err: rusb::Error) -> BackendError {
    BackendError::new(status_code(&err), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(status_code(&rusb::Error::NoDevice), -4);
        assert_eq!(status_code(&rusb::Error::NotFound), -5);
        assert_eq!(status_code(&rusb::Error::Pipe), -9);
        assert_eq!(status_code(&rusb::Error::NotSupported), -12);
    }

    #[test]
    fn test_map_rusb_error_keeps_message() {
        let err = map_rusb_error(rusb::Error::Access);
        assert_eq!(err.code, -3);
        assert!(!err.message.is_empty());
    }
}
