//! One selectable configuration of a device

use crate::tree::{DeviceState, UsbInterface};
use hal::{ConfigurationDescriptor, ConfigurationRecord, TopologyError};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// One configuration: a fixed set of interfaces, each with one or more
/// alternate settings of which exactly one is active at a time
///
/// The interface set is built once at construction and never changes; only
/// the active-setting selection per interface number is mutable.
pub struct UsbConfiguration {
    state: Arc<DeviceState>,
    descriptor: ConfigurationDescriptor,
    /// Interface number → its alternate settings, in descriptor order
    settings: BTreeMap<u8, Vec<Arc<UsbInterface>>>,
    /// Interface number → the currently active alternate setting
    active: RwLock<HashMap<u8, Arc<UsbInterface>>>,
}

impl UsbConfiguration {
    /// Build the configuration subtree from one enumeration record
    ///
    /// Groups the record's interface descriptors by interface number. The
    /// initial active setting per number is alternate setting 0 when the
    /// group contains one, otherwise the first descriptor encountered for
    /// that number — record order is descriptor order, so the fallback is
    /// deterministic for a given firmware.
    pub(crate) fn from_record(record: &ConfigurationRecord, state: Arc<DeviceState>) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let mut settings: BTreeMap<u8, Vec<Arc<UsbInterface>>> = BTreeMap::new();
            let mut active: HashMap<u8, Arc<UsbInterface>> = HashMap::new();

            for descriptor in &record.interfaces {
                let interface = Arc::new(UsbInterface::new(
                    descriptor.clone(),
                    weak.clone(),
                    state.clone(),
                ));
                if !active.contains_key(&descriptor.number) || descriptor.alternate_setting == 0 {
                    active.insert(descriptor.number, interface.clone());
                }
                settings.entry(descriptor.number).or_default().push(interface);
            }

            Self {
                state,
                descriptor: record.descriptor.clone(),
                settings,
                active: RwLock::new(active),
            }
        })
    }

    pub fn descriptor(&self) -> &ConfigurationDescriptor {
        &self.descriptor
    }

    /// bConfigurationValue
    pub fn value(&self) -> u8 {
        self.descriptor.value
    }

    /// Whether this configuration is the device's active one
    ///
    /// Queries the device if the active configuration has never been looked
    /// up; fails fast on a disconnected device.
    pub fn is_active(&self) -> Result<bool, TopologyError> {
        Ok(self.state.active_configuration_number()? == self.descriptor.value)
    }

    /// Interface numbers present in this configuration, ascending
    pub fn interface_numbers(&self) -> Vec<u8> {
        self.settings.keys().copied().collect()
    }

    pub fn contains_interface(&self, number: u8) -> bool {
        self.settings.contains_key(&number)
    }

    /// The currently active setting of every interface, ascending by number
    pub fn interfaces(&self) -> Vec<Arc<UsbInterface>> {
        let active = self.read_active();
        self.settings
            .keys()
            .filter_map(|number| active.get(number).cloned())
            .collect()
    }

    /// The currently active setting of one interface
    pub fn interface(&self, number: u8) -> Result<Arc<UsbInterface>, TopologyError> {
        self.read_active()
            .get(&number)
            .cloned()
            .ok_or(TopologyError::InterfaceNotFound { number })
    }

    /// All alternate settings of one interface, in descriptor order
    pub fn settings(&self, number: u8) -> Option<Vec<Arc<UsbInterface>>> {
        self.settings.get(&number).cloned()
    }

    pub fn setting_count(&self, number: u8) -> usize {
        self.settings.get(&number).map(Vec::len).unwrap_or(0)
    }

    /// Switch one interface to the given alternate setting
    ///
    /// No-op (no native call) when `interface` is already the active setting
    /// of `number`. Otherwise performs the guarded native switch; the
    /// active-settings map is updated only on success, so a failed switch
    /// leaves the previous setting authoritative.
    pub fn set_active_interface(
        &self,
        number: u8,
        interface: &Arc<UsbInterface>,
    ) -> Result<(), TopologyError> {
        self.state.check_connected()?;

        let known = self
            .settings
            .get(&number)
            .ok_or(TopologyError::InterfaceNotFound { number })?;
        if !known.iter().any(|candidate| Arc::ptr_eq(candidate, interface)) {
            return Err(TopologyError::InterfaceNotFound { number });
        }

        let already_active = self
            .read_active()
            .get(&number)
            .is_some_and(|active| Arc::ptr_eq(active, interface));
        if already_active {
            return Ok(());
        }

        self.state
            .set_alternate_setting(number, interface.alternate_setting())?;

        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(number, interface.clone());
        Ok(())
    }

    /// The configuration name string, if the device provides one
    pub fn description(&self) -> Result<Option<String>, TopologyError> {
        match self.descriptor.string_index {
            Some(index) => self.state.string_descriptor(index),
            None => Ok(None),
        }
    }

    fn read_active(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u8, Arc<UsbInterface>>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }
}
