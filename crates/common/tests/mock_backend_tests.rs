//! Integration tests for the scripted mock backend
//!
//! Exercises the mock through the `hal::UsbBackend` trait the way the
//! topology engine consumes it, so the scripting surface itself stays
//! trustworthy for the downstream test suites.

use common::test_utils::{MockBackend, mock_configuration, mock_device, mock_device_id};
use hal::UsbBackend;

#[test]
fn test_bus_mutation_between_enumerations() {
    let backend = MockBackend::new();
    assert!(backend.enumerate().unwrap().is_empty());

    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    backend.attach(mock_device(1, 5, 0xabcd, 0x0001, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    assert_eq!(backend.enumerate().unwrap().len(), 2);

    backend.detach(mock_device_id(1, 4));
    let remaining = backend.enumerate().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, mock_device_id(1, 5));
}

#[test]
fn test_record_preserves_descriptor_order() {
    let backend = MockBackend::new();
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 1), (0, 0), (1, 2)]),
    ]));

    let record = &backend.enumerate().unwrap()[0];
    let pairs: Vec<(u8, u8)> = record.configurations[0]
        .interfaces
        .iter()
        .map(|i| (i.number, i.alternate_setting))
        .collect();
    assert_eq!(pairs, vec![(0, 1), (0, 0), (1, 2)]);
}

#[test]
fn test_configuration_state_tracking() {
    let backend = MockBackend::new();
    let id = mock_device_id(2, 7);
    backend.attach(mock_device(2, 7, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
        mock_configuration(2, &[(0, 0)]),
    ]));

    assert_eq!(backend.active_configuration(id).unwrap(), 1);
    backend.set_configuration(id, 2).unwrap();
    assert_eq!(backend.active_configuration(id).unwrap(), 2);

    backend.set_alternate_setting(id, 0, 3).unwrap();
    assert_eq!(backend.alternate_calls(id), vec![(0, 3)]);

    backend.forget(id);
    assert_eq!(backend.forgotten(), vec![id]);
}

#[test]
fn test_unknown_device_yields_native_error() {
    let backend = MockBackend::new();
    let id = mock_device_id(9, 9);

    assert_eq!(backend.active_configuration(id).unwrap_err().code, -4);
    assert_eq!(backend.set_configuration(id, 1).unwrap_err().code, -4);
    assert_eq!(backend.set_alternate_setting(id, 0, 0).unwrap_err().code, -4);
}

#[test]
fn test_string_scripting() {
    let backend = MockBackend::new();
    let id = mock_device_id(1, 4);
    backend.attach(mock_device(1, 4, 0x1234, 0x5678, vec![
        mock_configuration(1, &[(0, 0)]),
    ]));
    backend.set_string(id, 2, "Widget");

    assert_eq!(
        backend.string_descriptor(id, 2).unwrap().as_deref(),
        Some("Widget")
    );
    assert_eq!(backend.string_descriptor(id, 5).unwrap(), None);
}
