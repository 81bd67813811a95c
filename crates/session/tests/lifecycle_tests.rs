//! Integration tests for the session lifecycle
//!
//! Tests session state handling including:
//! - Open, claim, release and close transitions
//! - Cleanup on induced open and claim failures
//! - Idempotent close and use-after-close rejection
//! - Kernel driver detach/reattach
//! - String descriptor resolution
//!
//! Run with: `cargo test -p usb-session --test lifecycle_tests`

use proptest::prelude::*;
use types::{Endpoint, UsbError};
use usb_session::test_utils::{MockDevice, MockTransport};
use usb_session::{DescriptorError, Session, SessionError, SessionState, enumerate, open};

fn hid_device() -> MockDevice {
    MockDevice::new(0x04d8, 0x003f)
}

mod state_machine {
    use super::*;

    #[test]
    fn test_claim_before_open_fails_without_transport_call() {
        let transport = MockTransport::new(vec![hid_device()]);
        let mut session = Session::new(&transport);

        assert_eq!(
            session.claim(0),
            Err(SessionError::UseBeforeOpen {
                operation: "claim interface"
            })
        );
        assert_eq!(transport.stats().claims, 0);
        assert_eq!(session.state(), SessionState::Unopened);
    }

    #[test]
    fn test_release_without_claim_is_noop() {
        let transport = MockTransport::new(vec![hid_device()]);
        let devices = enumerate(&transport).unwrap();
        let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();

        assert_eq!(session.release(), Ok(()));
        assert_eq!(session.release(), Ok(()));
        assert_eq!(transport.stats().releases, 0);

        let mut unopened = Session::new(&transport);
        assert_eq!(unopened.release(), Ok(()));
    }

    #[test]
    fn test_operations_after_close_fail() {
        let transport = MockTransport::new(vec![hid_device().with_product("HID")]);
        let devices = enumerate(&transport).unwrap();
        let candidate = devices.iter().next().unwrap();
        let mut session = open(&transport, candidate).unwrap();
        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.claim(0),
            Err(SessionError::UseAfterClose { .. })
        ));
        assert!(matches!(
            session.release(),
            Err(SessionError::UseAfterClose { .. })
        ));
        assert!(matches!(
            session.open(candidate),
            Err(SessionError::UseAfterClose { .. })
        ));
        assert!(matches!(
            session.get_string_descriptor(2),
            Err(DescriptorError::Session(SessionError::UseAfterClose { .. }))
        ));
        assert!(matches!(
            session.clear_halt(Endpoint::new(0x81)),
            Err(SessionError::UseAfterClose { .. })
        ));
    }

    #[test]
    fn test_open_twice_rejected() {
        let transport = MockTransport::new(vec![hid_device()]);
        let devices = enumerate(&transport).unwrap();
        let candidate = devices.iter().next().unwrap();
        let mut session = open(&transport, candidate).unwrap();

        assert_eq!(
            session.open(candidate),
            Err(SessionError::AlreadyOpen {
                vendor_id: 0x04d8,
                product_id: 0x003f
            })
        );
        assert_eq!(transport.stats().opens, 1);
    }

    #[test]
    fn test_unopened_session_can_be_opened_later() {
        let transport = MockTransport::new(vec![hid_device().with_ports(&[2, 3])]);
        let devices = enumerate(&transport).unwrap();
        let mut session = Session::new(&transport);

        session.open(devices.iter().next().unwrap()).unwrap();
        assert_eq!(session.state(), SessionState::Opened);
        assert_eq!(session.descriptor().unwrap().vendor_id, 0x04d8);
        assert_eq!(session.path().to_string(), "2.3");
    }
}

mod cleanup {
    use super::*;

    #[test]
    fn test_close_twice_closes_handle_once() {
        let transport = MockTransport::new(vec![hid_device()]);
        let devices = enumerate(&transport).unwrap();
        let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();
        session.claim(0).unwrap();

        session.close();
        session.close();
        drop(session);

        let stats = transport.stats();
        assert_eq!(stats.closes, 1);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.double_closes, 0);
        assert_eq!(stats.open_handles, 0);
    }

    #[test]
    fn test_close_unopened_session() {
        let transport = MockTransport::new(vec![]);
        let mut session = Session::new(&transport);
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(transport.stats().closes, 0);
    }

    #[test]
    fn test_open_failure_leaves_nothing_open() {
        let transport = MockTransport::new(vec![hid_device().failing_open(UsbError::Access)]);
        let devices = enumerate(&transport).unwrap();

        let err = open(&transport, devices.iter().next().unwrap()).err().unwrap();
        assert_eq!(err.code(), Some(-3));
        assert!(matches!(err, SessionError::Open { bus_number: 1, .. }));

        let stats = transport.stats();
        assert_eq!(stats.opens, 0);
        assert_eq!(stats.closes, 0);
        assert_eq!(stats.open_handles, 0);
    }

    #[test]
    fn test_claim_failure_still_closes_on_drop() {
        let transport = MockTransport::new(vec![hid_device().failing_claim(UsbError::Busy)]);
        let devices = enumerate(&transport).unwrap();

        let result = (|| -> Result<(), SessionError> {
            let mut session = open(&transport, devices.iter().next().unwrap())?;
            session.claim(0)?;
            Ok(())
        })();

        assert!(matches!(
            result,
            Err(SessionError::Claim {
                interface: 0,
                source: UsbError::Busy
            })
        ));
        let stats = transport.stats();
        assert_eq!(stats.opens, 1);
        assert_eq!(stats.closes, 1);
        assert_eq!(stats.releases, 0);
        assert_eq!(stats.open_handles, 0);
    }

    #[test]
    fn test_drop_releases_claimed_interface() {
        let transport = MockTransport::new(vec![hid_device()]);
        let devices = enumerate(&transport).unwrap();
        {
            let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();
            session.claim(0).unwrap();
        }

        let stats = transport.stats();
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.closes, 1);
    }

    proptest! {
        #[test]
        fn prop_every_opened_session_closed_once(
            failures in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..12)
        ) {
            let devices: Vec<MockDevice> = failures
                .iter()
                .enumerate()
                .map(|(i, (open_fails, claim_fails))| {
                    let mut dev = MockDevice::new(0x1000 + i as u16, 0x0001).at(1, i as u8 + 1);
                    if *open_fails {
                        dev = dev.failing_open(UsbError::Access);
                    }
                    if *claim_fails {
                        dev = dev.failing_claim(UsbError::Busy);
                    }
                    dev
                })
                .collect();
            let transport = MockTransport::new(devices);
            let list = enumerate(&transport).unwrap();

            let mut opened = 0;
            for candidate in &list {
                let Ok(mut session) = open(&transport, candidate) else {
                    continue;
                };
                opened += 1;
                if session.claim(0).is_err() {
                    continue;
                }
                session.close();
            }

            let stats = transport.stats();
            prop_assert!(stats.opens <= list.len());
            prop_assert_eq!(stats.opens, opened);
            prop_assert_eq!(stats.closes, opened);
            prop_assert_eq!(stats.double_closes, 0);
            prop_assert_eq!(stats.open_handles, 0);
        }
    }
}

mod kernel_driver {
    use super::*;

    #[test]
    fn test_detach_then_reattach_on_close() {
        let transport = MockTransport::new(vec![hid_device().with_kernel_driver()]);
        let devices = enumerate(&transport).unwrap();
        let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();

        assert_eq!(session.detach_kernel_driver(0), Ok(true));
        assert!(!transport.kernel_driver_bound(0));

        session.claim(0).unwrap();
        session.close();

        let stats = transport.stats();
        assert_eq!(stats.detaches, 1);
        assert_eq!(stats.attaches, 1);
        assert!(transport.kernel_driver_bound(0));
    }

    #[test]
    fn test_no_driver_means_no_detach() {
        let transport = MockTransport::new(vec![hid_device()]);
        let devices = enumerate(&transport).unwrap();
        let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();

        assert_eq!(session.detach_kernel_driver(0), Ok(false));
        session.close();

        let stats = transport.stats();
        assert_eq!(stats.detaches, 0);
        assert_eq!(stats.attaches, 0);
    }

    #[test]
    fn test_detach_failure_is_not_fatal() {
        let transport = MockTransport::new(vec![
            hid_device()
                .with_kernel_driver()
                .failing_detach(UsbError::Access),
        ]);
        let devices = enumerate(&transport).unwrap();
        let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();

        assert!(matches!(
            session.detach_kernel_driver(0),
            Err(SessionError::Detach { interface: 0, .. })
        ));

        session.claim_detaching(0).unwrap();
        assert_eq!(session.state(), SessionState::Claimed(0));

        session.close();
        // Nothing was detached, so nothing is reattached
        assert_eq!(transport.stats().attaches, 0);
    }

    #[test]
    fn test_claim_detaching_requires_open_session() {
        let transport = MockTransport::new(vec![]);
        let mut session = Session::new(&transport);
        assert!(matches!(
            session.claim_detaching(0),
            Err(SessionError::UseBeforeOpen { .. })
        ));
    }
}

mod strings {
    use super::*;

    #[test]
    fn test_resolves_manufacturer_and_product() {
        let transport = MockTransport::new(vec![
            hid_device()
                .with_manufacturer("Microchip Technology Inc.")
                .with_product("Generic HID"),
        ]);
        let devices = enumerate(&transport).unwrap();
        let candidate = devices.iter().next().unwrap();
        let session = open(&transport, candidate).unwrap();

        let desc = candidate.descriptor();
        let manufacturer = session
            .get_string_descriptor(desc.manufacturer_index.unwrap())
            .unwrap();
        let product = session
            .get_string_descriptor(desc.product_index.unwrap())
            .unwrap();

        assert_eq!(manufacturer, "Microchip Technology Inc.");
        assert_eq!(product, "Generic HID");
    }

    #[test]
    fn test_unreadable_string_reports_code() {
        let transport = MockTransport::new(vec![hid_device().with_broken_product_string()]);
        let devices = enumerate(&transport).unwrap();
        let session = open(&transport, devices.iter().next().unwrap()).unwrap();

        assert_eq!(
            session.get_string_descriptor(2),
            Err(DescriptorError::Read {
                index: 2,
                source: UsbError::Pipe
            })
        );
    }

    #[test]
    fn test_string_before_open() {
        let transport = MockTransport::new(vec![]);
        let session = Session::new(&transport);
        assert!(matches!(
            session.get_string_descriptor(1),
            Err(DescriptorError::Session(SessionError::UseBeforeOpen { .. }))
        ));
    }
}
