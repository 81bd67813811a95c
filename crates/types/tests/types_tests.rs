//! Integration tests for the data model
//!
//! Covers:
//! - Descriptor JSON shape used by `usb-session list --json`
//! - Port path serialization limits
//! - Transfer request bounds (property based)
//!
//! Run with: `cargo test -p types --test types_tests`

use proptest::prelude::*;
use std::time::Duration;
use types::{
    DeviceDescriptor, DevicePath, DeviceSpeed, Direction, Endpoint, MAX_REPORT_SIZE,
    RequestError, TransferRequest,
};

fn hid_descriptor() -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id: 0x04d8,
        product_id: 0x003f,
        bus_number: 1,
        address: 5,
        speed: DeviceSpeed::Full,
        class_code: 0,
        manufacturer_index: Some(1),
        product_index: Some(2),
        serial_number_index: None,
        num_configurations: 1,
    }
}

mod descriptor {
    use super::*;

    #[test]
    fn test_descriptor_json_fields() {
        let json = serde_json::to_value(hid_descriptor()).unwrap();
        assert_eq!(json["vendor_id"], 0x04d8);
        assert_eq!(json["product_id"], 0x003f);
        assert_eq!(json["speed"], "Full");
        assert!(json["serial_number_index"].is_null());
    }

    #[test]
    fn test_descriptor_matches() {
        let desc = hid_descriptor();
        assert!(desc.matches(0x04d8, 0x003f));
        assert!(!desc.matches(0x04d8, 0x0040));
        assert_eq!(desc.location(), (1, 5));
    }

    #[test]
    fn test_path_serializes_as_list() {
        let path = DevicePath::try_from(vec![2, 1]).unwrap();
        assert_eq!(serde_json::to_string(&path).unwrap(), "[2,1]");
    }

    #[test]
    fn test_path_deserialize_rejects_deep_path() {
        let result: Result<DevicePath, _> = serde_json::from_str("[1,2,3,4,5,6,7,8]");
        assert!(result.is_err());
    }
}

mod requests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    proptest! {
        #[test]
        fn prop_write_accepts_up_to_max(payload in proptest::collection::vec(any::<u8>(), 0..=MAX_REPORT_SIZE)) {
            let request = TransferRequest::write(Endpoint::new(0x01), &payload, TIMEOUT).unwrap();
            prop_assert_eq!(request.payload(), payload.as_slice());
            prop_assert_eq!(request.direction(), Direction::Out);
        }

        #[test]
        fn prop_write_rejects_oversized(len in (MAX_REPORT_SIZE + 1)..512usize) {
            let payload = vec![0u8; len];
            let err = TransferRequest::write(Endpoint::new(0x02), &payload, TIMEOUT).unwrap_err();
            prop_assert_eq!(err, RequestError::PayloadTooLarge { len, max: MAX_REPORT_SIZE });
        }

        #[test]
        fn prop_direction_follows_bit_seven(address in any::<u8>()) {
            let expected = if address & 0x80 != 0 { Direction::In } else { Direction::Out };
            prop_assert_eq!(Endpoint::new(address).direction(), expected);
        }
    }
}
