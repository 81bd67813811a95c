//! Transport status codes and value construction errors

use crate::transfer::{Direction, Endpoint};
use thiserror::Error;

/// Status reported by the USB host-controller stack
///
/// Mirrors the libusb error taxonomy. [`UsbError::code`] returns the numeric
/// libusb code so failures can be reported (and propagated as process exit
/// codes) without losing the original status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    /// Input/output error
    #[error("I/O error (code {})", self.code())]
    Io,

    /// Invalid parameter
    #[error("invalid parameter (code {})", self.code())]
    InvalidParam,

    /// Access denied (insufficient permissions)
    #[error("access denied (code {})", self.code())]
    Access,

    /// Device has been disconnected
    #[error("no such device (code {})", self.code())]
    NoDevice,

    /// Entity not found
    #[error("entity not found (code {})", self.code())]
    NotFound,

    /// Resource busy, e.g. interface held by another driver
    #[error("resource busy (code {})", self.code())]
    Busy,

    /// Operation timed out
    #[error("operation timed out (code {})", self.code())]
    Timeout,

    /// Device sent more data than requested
    #[error("overflow (code {})", self.code())]
    Overflow,

    /// Endpoint stalled
    #[error("pipe error (code {})", self.code())]
    Pipe,

    /// System call interrupted
    #[error("interrupted (code {})", self.code())]
    Interrupted,

    /// Insufficient memory
    #[error("insufficient memory (code {})", self.code())]
    NoMem,

    /// Operation not supported on this platform
    #[error("operation not supported (code {})", self.code())]
    NotSupported,

    /// Any other failure
    #[error("{message} (code {})", self.code())]
    Other { message: String },
}

impl UsbError {
    /// libusb numeric error code for this status
    pub fn code(&self) -> i32 {
        match self {
            UsbError::Io => -1,
            UsbError::InvalidParam => -2,
            UsbError::Access => -3,
            UsbError::NoDevice => -4,
            UsbError::NotFound => -5,
            UsbError::Busy => -6,
            UsbError::Timeout => -7,
            UsbError::Overflow => -8,
            UsbError::Pipe => -9,
            UsbError::Interrupted => -10,
            UsbError::NoMem => -11,
            UsbError::NotSupported => -12,
            UsbError::Other { .. } => -99,
        }
    }
}

/// A transfer request could not be constructed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Payload or read length exceeds the report buffer
    #[error("transfer length {len} exceeds maximum report size {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// A read must ask for at least one byte
    #[error("read length must be at least one byte")]
    EmptyRead,

    /// Endpoint address points the wrong way for the requested operation
    #[error("endpoint {endpoint} is not an {expected:?} endpoint")]
    WrongDirection {
        endpoint: Endpoint,
        expected: Direction,
    },
}

/// A port path could not be constructed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevicePathError {
    /// More hops than USB topology allows
    #[error("port path has {depth} hops (max: {max})")]
    TooDeep { depth: usize, max: usize },

    /// Path string component is not a port number
    #[error("invalid port number '{0}' in path")]
    InvalidPort(String),
}
