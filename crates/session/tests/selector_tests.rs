//! Integration tests for device enumeration and selection
//!
//! Run with: `cargo test -p usb-session --test selector_tests`

use types::{DevicePath, UsbError};
use usb_session::test_utils::{MockDevice, MockTransport};
use usb_session::{EnumerationError, Selector, enumerate, open};

fn two_devices() -> MockTransport {
    MockTransport::new(vec![
        MockDevice::new(0x04d8, 0x003f).at(1, 4),
        MockDevice::new(0x1234, 0x5678).at(1, 7),
    ])
}

#[test]
fn test_find_by_id_returns_first_match() {
    let transport = two_devices();
    let devices = enumerate(&transport).unwrap();

    let found = devices.find_by_id(0x04d8, 0x003f).unwrap();
    assert_eq!(found.descriptor().vendor_id, 0x04d8);
    assert_eq!(found.descriptor().address, 4);
}

#[test]
fn test_find_by_id_no_match_is_empty() {
    let transport = two_devices();
    let devices = enumerate(&transport).unwrap();

    assert!(devices.find_by_id(0x9999, 0x9999).is_none());
    // Nothing was opened for the miss
    assert_eq!(transport.stats().opens, 0);
}

#[test]
fn test_enumeration_order_is_bus_then_address() {
    let transport = MockTransport::new(vec![
        MockDevice::new(0x0001, 0x0001).at(2, 1),
        MockDevice::new(0x0002, 0x0002).at(1, 9),
        MockDevice::new(0x0003, 0x0003).at(1, 3),
    ]);
    let devices = enumerate(&transport).unwrap();

    let order: Vec<(u8, u8)> = devices.iter().map(|c| c.descriptor().location()).collect();
    assert_eq!(order, vec![(1, 3), (1, 9), (2, 1)]);
}

#[test]
fn test_duplicate_ids_tie_break_and_path_disambiguation() {
    let transport = MockTransport::new(vec![
        MockDevice::new(0x04d8, 0x003f).at(3, 2).with_ports(&[2, 1]),
        MockDevice::new(0x04d8, 0x003f).at(1, 8).with_ports(&[1, 4]),
    ]);
    let devices = enumerate(&transport).unwrap();

    let first = devices.find_by_id(0x04d8, 0x003f).unwrap();
    assert_eq!(first.descriptor().bus_number, 1);

    let path: DevicePath = "2.1".parse().unwrap();
    let by_path = devices.find_by_path(&path).unwrap();
    assert_eq!(by_path.descriptor().bus_number, 3);

    assert_eq!(devices.select(&Selector::by_id(0x04d8, 0x003f)).count(), 2);
}

#[test]
fn test_select_by_predicate() {
    let transport = two_devices();
    let devices = enumerate(&transport).unwrap();

    assert_eq!(devices.select(&Selector::all()).count(), 2);
    assert_eq!(devices.select(&Selector::by_vendor(0x1234)).count(), 1);
    assert_eq!(devices.select_any(&[]).count(), 2);

    let filters: Vec<Selector> = vec!["0x1234:*".parse().unwrap(), "0x9999:0x0001".parse().unwrap()];
    let selected: Vec<u16> = devices
        .select_any(&filters)
        .map(|c| c.descriptor().vendor_id)
        .collect();
    assert_eq!(selected, vec![0x1234]);
}

#[test]
fn test_enumeration_failure() {
    let transport = two_devices().failing_enumeration(UsbError::NoMem);
    let err = enumerate(&transport).err().unwrap();

    assert_eq!(
        err,
        EnumerationError::List {
            source: UsbError::NoMem
        }
    );
    assert_eq!(err.code(), -11);
}

#[test]
fn test_descriptor_failure_names_device() {
    let transport = MockTransport::new(vec![
        MockDevice::new(0x04d8, 0x003f)
            .at(2, 5)
            .failing_descriptor(UsbError::Io),
    ]);
    let err = enumerate(&transport).err().unwrap();

    assert_eq!(
        err,
        EnumerationError::Descriptor {
            bus_number: 2,
            address: 5,
            source: UsbError::Io
        }
    );
}

#[test]
fn test_too_deep_port_path_falls_back_to_root() {
    let transport = MockTransport::new(vec![
        MockDevice::new(0x04d8, 0x003f).with_ports(&[1, 2, 3, 4, 5, 6, 7, 8]),
    ]);
    let devices = enumerate(&transport).unwrap();
    assert!(devices.iter().next().unwrap().path().is_empty());
}

#[test]
fn test_fresh_enumeration_each_call() {
    let transport = two_devices();
    let first = enumerate(&transport).unwrap();
    let second = enumerate(&transport).unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(transport.stats().enumerations, 2);
}

#[test]
fn test_session_outlives_device_list() {
    let transport = two_devices();
    let session = {
        let devices = enumerate(&transport).unwrap();
        open(&transport, devices.find_by_id(0x1234, 0x5678).unwrap()).unwrap()
    };

    assert!(session.is_open());
    assert_eq!(session.descriptor().unwrap().product_id, 0x5678);
}
