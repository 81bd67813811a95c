//! Diagnostic records and their human-readable rendering

use serde::Serialize;
use std::fmt::Write;
use types::{DeviceDescriptor, DevicePath, TransferResult};
use usb_session::TransferError;

/// Pattern base for the write half of a write-then-read exchange
pub const EXCHANGE_PATTERN_BASE: u8 = 0x79;

/// Pattern base for the trailing write-only report
pub const SEND_ONLY_PATTERN_BASE: u8 = 0x80;

/// Deterministic diagnostic payload: byte `i` is `base + i` modulo 256
pub fn pattern(base: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| base.wrapping_add(i as u8)).collect()
}

/// Bytes as space-separated lowercase hex pairs
pub fn hex_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// One listed device with whatever strings could be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    #[serde(flatten)]
    pub descriptor: DeviceDescriptor,
    pub path: DevicePath,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

impl DeviceRecord {
    pub fn new(descriptor: DeviceDescriptor, path: DevicePath) -> Self {
        Self {
            descriptor,
            path,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// `vid:pid (bus N, device M, speed S)`
    pub fn summary(&self) -> String {
        let d = &self.descriptor;
        format!(
            "{:04x}:{:04x} (bus {}, device {}, speed {})",
            d.vendor_id, d.product_id, d.bus_number, d.address, d.speed
        )
    }

    pub fn render(&self) -> String {
        let mut out = self.summary();
        if let Some(manufacturer) = &self.manufacturer {
            let _ = write!(out, "\n    Manufacturer: {}", manufacturer);
        }
        if let Some(product) = &self.product {
            let _ = write!(out, "\n    Product: {}", product);
        }
        if let Some(serial) = &self.serial_number {
            let _ = write!(out, "\n    Serial: {}", serial);
        }
        if !self.path.is_empty() {
            let _ = write!(out, "\n    Path: {}", self.path);
        }
        out
    }
}

/// Outcome of one `exchange` run
///
/// The first report always went out; the later transfers keep their own
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReport {
    pub device: DeviceRecord,
    pub sent: TransferResult,
    pub received: Result<TransferResult, TransferError>,
    pub send_only: Option<Result<TransferResult, TransferError>>,
}

impl ExchangeReport {
    /// First failed transfer, in the order they ran
    pub fn failure(&self) -> Option<&TransferError> {
        self.received
            .as_ref()
            .err()
            .or_else(|| self.send_only.as_ref().and_then(|r| r.as_ref().err()))
    }

    /// Successful transfers only; failures surface through [`Self::failure`]
    pub fn render(&self) -> String {
        let mut out = format!("Opened {}", self.device.summary());
        let _ = write!(
            out,
            "\nData sent via interrupt transfer ({} bytes to {}):\n{}",
            self.sent.transferred,
            self.sent.endpoint,
            hex_bytes(&self.sent.data)
        );
        if let Ok(received) = &self.received {
            let _ = write!(
                out,
                "\nData received via interrupt transfer ({} bytes from {}):\n{}",
                received.transferred,
                received.endpoint,
                hex_bytes(&received.data)
            );
        }
        if let Some(Ok(sent)) = &self.send_only {
            let _ = write!(
                out,
                "\nData sent via interrupt transfer ({} bytes to {}):\n{}",
                sent.transferred,
                sent.endpoint,
                hex_bytes(&sent.data)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{DeviceSpeed, Endpoint};

    fn descriptor() -> DeviceDescriptor {
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

    #[test]
    fn test_exchange_pattern_golden() {
        let payload = pattern(EXCHANGE_PATTERN_BASE, 64);
        assert_eq!(payload.len(), 64);
        assert_eq!(
            hex_bytes(&payload[..8]),
            "79 7a 7b 7c 7d 7e 7f 80"
        );
        assert_eq!(payload[63], 0xb8);
    }

    #[test]
    fn test_send_only_pattern_golden() {
        let payload = pattern(SEND_ONLY_PATTERN_BASE, 64);
        assert_eq!(hex_bytes(&payload[..4]), "80 81 82 83");
        assert_eq!(payload[63], 0xbf);
    }

    #[test]
    fn test_pattern_wraps() {
        let payload = pattern(0xfe, 4);
        assert_eq!(payload, vec![0xfe, 0xff, 0x00, 0x01]);
    }

    #[test]
    fn test_hex_bytes_empty() {
        assert_eq!(hex_bytes(&[]), "");
        assert_eq!(hex_bytes(&[0x0a]), "0a");
    }

    #[test]
    fn test_device_record_render() {
        let mut record = DeviceRecord::new(descriptor(), "1.4".parse().unwrap());
        assert_eq!(record.summary(), "04d8:003f (bus 1, device 5, speed 12 Mbps)");

        record.manufacturer = Some("Microchip Technology Inc.".to_string());
        record.product = Some("Simple HID Device Demo".to_string());
        assert_eq!(
            record.render(),
            "04d8:003f (bus 1, device 5, speed 12 Mbps)\n    \
             Manufacturer: Microchip Technology Inc.\n    \
             Product: Simple HID Device Demo\n    \
             Path: 1.4"
        );
    }

    #[test]
    fn test_device_record_json() {
        let record = DeviceRecord::new(descriptor(), "1.4".parse().unwrap());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["vendor_id"], 0x04d8);
        assert_eq!(json["address"], 5);
        assert_eq!(json["path"], serde_json::json!([1, 4]));
        assert!(json["manufacturer"].is_null());
    }

    #[test]
    fn test_exchange_report_render() {
        let report = ExchangeReport {
            device: DeviceRecord::new(descriptor(), DevicePath::default()),
            sent: TransferResult::success(Endpoint::new(0x01), vec![0x79, 0x7a]),
            received: Ok(TransferResult::success(Endpoint::new(0x81), vec![0x01])),
            send_only: None,
        };

        let text = report.render();
        assert!(text.starts_with("Opened 04d8:003f"));
        assert!(text.contains("(2 bytes to 0x01):\n79 7a"));
        assert!(text.contains("(1 bytes from 0x81):\n01"));
        assert!(report.failure().is_none());
    }

    #[test]
    fn test_exchange_report_after_failed_read() {
        let in_endpoint = Endpoint::new(0x81);
        let report = ExchangeReport {
            device: DeviceRecord::new(descriptor(), DevicePath::default()),
            sent: TransferResult::success(Endpoint::new(0x01), pattern(0x79, 4)),
            received: Err(TransferError::NoData {
                endpoint: in_endpoint,
            }),
            send_only: Some(Ok(TransferResult::success(
                Endpoint::new(0x01),
                pattern(0x80, 4),
            ))),
        };

        let text = report.render();
        assert!(text.contains("(4 bytes to 0x01):\n79 7a 7b 7c"));
        assert!(!text.contains("received"));
        assert!(text.contains("80 81 82 83"));
        assert_eq!(
            report.failure(),
            Some(&TransferError::NoData {
                endpoint: in_endpoint
            })
        );
    }
}
