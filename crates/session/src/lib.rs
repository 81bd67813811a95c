//! USB device session core
//!
//! Discovers USB devices, opens a session with claim/release discipline, and
//! performs bounded, timeout-governed report exchange over interrupt
//! endpoints. The host-controller stack is consumed through the [`Transport`]
//! trait; [`RusbTransport`] binds it to libusb.
//!
//! Components, leaf-first:
//! - [`selector`]: one-shot enumeration snapshots and vendor/product matching
//! - [`session`]: the open -> claim -> release -> close lifecycle
//! - [`exchange`]: single writes, reads, and write-then-read cycles
//!
//! All operations are synchronous and block the calling thread. A session
//! holds its handle exclusively and runs its transfers strictly in sequence;
//! sessions on distinct devices are independent.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use types::Endpoint;
//! use usb_session::{RusbTransport, enumerate, exchange, open};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = RusbTransport::new()?;
//! let devices = enumerate(&transport)?;
//!
//! let Some(candidate) = devices.find_by_id(0x04d8, 0x003f) else {
//!     return Ok(());
//! };
//!
//! let mut session = open(&transport, candidate)?;
//! session.claim_detaching(0)?;
//!
//! let payload: Vec<u8> = (0..64u8).map(|i| 0x79u8.wrapping_add(i)).collect();
//! let outcome = exchange::exchange(
//!     &mut session,
//!     Endpoint::new(0x01),
//!     Endpoint::new(0x81),
//!     &payload,
//!     Duration::from_millis(5000),
//! )?;
//! println!("sent {} bytes", outcome.sent.transferred);
//! let received = outcome.received?;
//! println!("{:02x?}", received.data);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod exchange;
pub mod rusb_transport;
pub mod selector;
pub mod session;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transport;

pub use error::{
    DescriptorError, EnumerationError, InitializationError, SessionError, TransferError,
};
pub use exchange::{ExchangeOutcome, ReportExchanger};
pub use rusb_transport::RusbTransport;
pub use selector::{Candidate, DeviceList, Selector, SelectorParseError, enumerate, parse_hex_id};
pub use session::{Session, SessionState, open};
pub use transport::Transport;
