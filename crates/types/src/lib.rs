//! Data model for usb-session
//!
//! This crate defines the values exchanged between the transport binding, the
//! session core and the command-line front end: immutable device descriptor
//! snapshots, port paths, endpoint addresses, bounded transfer requests and
//! their results, plus the transport-level status taxonomy.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use types::{Direction, Endpoint, TransferRequest};
//!
//! let out = Endpoint::new(0x01);
//! assert_eq!(out.direction(), Direction::Out);
//!
//! let request = TransferRequest::write(out, &[0x79, 0x7a], Duration::from_millis(5000)).unwrap();
//! assert_eq!(request.payload(), &[0x79, 0x7a]);
//! ```

pub mod descriptor;
pub mod error;
pub mod transfer;

pub use descriptor::{DeviceDescriptor, DevicePath, DeviceSpeed, MAX_PATH_DEPTH};
pub use error::{DevicePathError, RequestError, UsbError};
pub use transfer::{
    Direction, Endpoint, MAX_REPORT_SIZE, TransferRequest, TransferResult, TransferStatus,
};
