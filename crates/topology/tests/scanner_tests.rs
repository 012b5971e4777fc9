//! Integration tests for the scanner, listener fan-out and handle guard
//!
//! Hot-plug cycles are driven manually through `UsbServices::rescan` against
//! the scripted mock backend; the background thread is parked on a very long
//! interval so the tests stay deterministic.

use common::test_utils::{MockBackend, mock_configuration, mock_device, mock_device_id};
use hal::DeviceId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use topology::config::ServiceConfig;
use topology::{TopologyListener, UsbDevice, UsbServices};

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.scan.interval_ms = 3_600_000;
    config
}

fn start_services(backend: &Arc<MockBackend>) -> UsbServices {
    UsbServices::new(backend.clone(), &test_config())
}

/// Records every notification it receives
#[derive(Default)]
struct RecordingListener {
    attached: Mutex<Vec<DeviceId>>,
    detached: Mutex<Vec<DeviceId>>,
}

impl TopologyListener for RecordingListener {
    fn device_attached(&self, device: &Arc<UsbDevice>) {
        self.attached.lock().unwrap().push(device.id());
    }

    fn device_detached(&self, device: &Arc<UsbDevice>) {
        self.detached.lock().unwrap().push(device.id());
    }
}

#[test]
fn test_first_access_forces_synchronous_scan() {
    let backend = Arc::new(MockBackend::new());
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    let services = start_services(&backend);

    // No explicit rescan: the first root_hub() call must already see the
    // device present at startup.
    let root = services.root_hub();
    assert_eq!(root.device_count(), 1);
    assert!(root.is_connected());

    services.shutdown();
}

#[test]
fn test_attach_notifies_once_with_fully_built_tree() {
    let backend = Arc::new(MockBackend::new());
    let services = start_services(&backend);
    let root = services.root_hub();

    let listener = Arc::new(RecordingListener::default());
    services.add_listener(listener.clone());

    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0), (0, 1)]),
    ]));
    services.rescan().unwrap();
    // A second cycle with an unchanged bus must not re-notify.
    services.rescan().unwrap();

    assert_eq!(*listener.attached.lock().unwrap(), vec![mock_device_id(1, 4)]);
    assert!(listener.detached.lock().unwrap().is_empty());

    let device = root.device(mock_device_id(1, 4)).unwrap();
    assert!(device.is_connected());
    let config = &device.configurations()[0];
    assert_eq!(config.setting_count(0), 2);
    assert_eq!(config.interface(0).unwrap().alternate_setting(), 0);

    services.shutdown();
}

#[test]
fn test_detach_disconnects_device_and_drops_session() {
    let backend = Arc::new(MockBackend::new());
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    let services = start_services(&backend);
    let root = services.root_hub();

    let listener = Arc::new(RecordingListener::default());
    services.add_listener(listener.clone());

    let device = root.device(mock_device_id(1, 4)).unwrap();
    let config = device.configurations()[0].clone();
    let interface = config.interface(0).unwrap();

    backend.detach(mock_device_id(1, 4));
    services.rescan().unwrap();

    assert_eq!(root.device_count(), 0);
    assert_eq!(*listener.detached.lock().unwrap(), vec![mock_device_id(1, 4)]);
    assert_eq!(backend.forgotten(), vec![mock_device_id(1, 4)]);

    // Every state-touching operation on the retired node now fails fast.
    assert!(!device.is_connected());
    assert!(matches!(
        device.active_configuration_number(),
        Err(hal::TopologyError::DeviceUnavailable { .. })
    ));
    assert!(matches!(
        device.set_active_configuration(1),
        Err(hal::TopologyError::DeviceUnavailable { .. })
    ));
    assert!(matches!(
        config.set_active_interface(0, &interface),
        Err(hal::TopologyError::DeviceUnavailable { .. })
    ));
    assert!(matches!(
        device.product(),
        Err(hal::TopologyError::DeviceUnavailable { .. })
    ));

    services.shutdown();
}

#[test]
fn test_reconnect_builds_a_new_node() {
    let backend = Arc::new(MockBackend::new());
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    let services = start_services(&backend);
    let root = services.root_hub();

    let first = root.device(mock_device_id(1, 4)).unwrap();

    backend.detach(mock_device_id(1, 4));
    services.rescan().unwrap();
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    services.rescan().unwrap();

    let second = root.device(mock_device_id(1, 4)).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!first.is_connected());
    assert!(second.is_connected());

    services.shutdown();
}

#[test]
fn test_enumeration_failure_aborts_only_one_cycle() {
    let backend = Arc::new(MockBackend::new());
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    let services = start_services(&backend);
    let root = services.root_hub();
    assert_eq!(root.device_count(), 1);

    backend.set_fail_enumerate(true);
    assert!(matches!(
        services.rescan(),
        Err(hal::TopologyError::Enumeration { .. })
    ));

    // The failed cycle must not have torn down the known tree.
    assert_eq!(root.device_count(), 1);
    assert!(root.device(mock_device_id(1, 4)).unwrap().is_connected());

    backend.set_fail_enumerate(false);
    services.rescan().unwrap();
    assert_eq!(root.device_count(), 1);

    services.shutdown();
}

#[test]
fn test_listener_panic_does_not_break_fan_out() {
    struct PanickingListener;

    impl TopologyListener for PanickingListener {
        fn device_attached(&self, _device: &Arc<UsbDevice>) {
            panic!("listener failure");
        }

        fn device_detached(&self, _device: &Arc<UsbDevice>) {
            panic!("listener failure");
        }
    }

    let backend = Arc::new(MockBackend::new());
    let services = start_services(&backend);
    services.root_hub();

    // Registered first, so it panics before the recording listener runs.
    services.add_listener(Arc::new(PanickingListener));
    let listener = Arc::new(RecordingListener::default());
    services.add_listener(listener.clone());

    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    services.rescan().unwrap();

    assert_eq!(*listener.attached.lock().unwrap(), vec![mock_device_id(1, 4)]);

    services.shutdown();
}

#[test]
fn test_removed_listener_is_not_notified() {
    let backend = Arc::new(MockBackend::new());
    let services = start_services(&backend);
    services.root_hub();

    let listener = Arc::new(RecordingListener::default());
    let registered: Arc<dyn TopologyListener> = listener.clone();
    services.add_listener(registered.clone());
    assert!(services.remove_listener(&registered));
    assert!(!services.remove_listener(&registered));

    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    services.rescan().unwrap();

    assert!(listener.attached.lock().unwrap().is_empty());

    services.shutdown();
}

#[test]
fn test_concurrent_switches_never_overlap_at_the_native_layer() {
    let backend = Arc::new(MockBackend::new());
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
        mock_configuration(2, &[(0, 0)]),
    ]));
    backend.attach(mock_device(1, 5, 0xabcd, 0x0001, vec![
        mock_configuration(1, &[(0, 0)]),
        mock_configuration(2, &[(0, 0)]),
    ]));
    let services = start_services(&backend);
    let root = services.root_hub();

    backend.set_call_delay(Duration::from_millis(5));

    let errors = Arc::new(AtomicU32::new(0));
    let threads: Vec<_> = [mock_device_id(1, 4), mock_device_id(1, 5)]
        .into_iter()
        .map(|id| {
            let device = root.device(id).unwrap();
            let errors = errors.clone();
            std::thread::spawn(move || {
                for round in 0..10u8 {
                    let value = 1 + (round % 2);
                    if device.set_active_configuration(value).is_err() {
                        errors.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(!backend.overlap_detected());

    services.shutdown();
}

#[test]
fn test_service_metadata() {
    let backend = Arc::new(MockBackend::new());
    let services = start_services(&backend);

    assert!(!services.description().is_empty());
    assert!(!services.version().is_empty());

    services.shutdown();
}
