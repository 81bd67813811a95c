//! Common utilities for usb-session
//!
//! Ambient concerns shared by the command-line front end and any other
//! consumer of the session core: the common error type and logging setup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{LOG_LEVELS, setup_logging};
