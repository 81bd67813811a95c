//! Session and transfer error taxonomy
//!
//! Every error carries the operation context and, where the transport supplied
//! one, the libusb numeric status so failures can be diagnosed without
//! re-running.

use std::time::Duration;
use thiserror::Error;
use types::{Endpoint, RequestError, TransferStatus, UsbError};

/// The USB host-controller subsystem could not be started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to initialize USB transport: {source}")]
pub struct InitializationError {
    pub source: UsbError,
}

impl InitializationError {
    pub fn code(&self) -> i32 {
        self.source.code()
    }
}

/// Device listing failed; fatal for this enumeration attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumerationError {
    #[error("failed to list USB devices: {source}")]
    List { source: UsbError },

    #[error("failed to read device descriptor (bus {bus_number}, device {address}): {source}")]
    Descriptor {
        bus_number: u8,
        address: u8,
        source: UsbError,
    },
}

impl EnumerationError {
    pub fn code(&self) -> i32 {
        match self {
            EnumerationError::List { source } | EnumerationError::Descriptor { source, .. } => {
                source.code()
            }
        }
    }
}

/// Session lifecycle failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {operation}: session has not been opened")]
    UseBeforeOpen { operation: &'static str },

    #[error("cannot {operation}: session is closed")]
    UseAfterClose { operation: &'static str },

    #[error("session already holds device {vendor_id:04x}:{product_id:04x}")]
    AlreadyOpen { vendor_id: u16, product_id: u16 },

    #[error(
        "failed to open device {vendor_id:04x}:{product_id:04x} (bus {bus_number}, device {address}): {source}"
    )]
    Open {
        vendor_id: u16,
        product_id: u16,
        bus_number: u8,
        address: u8,
        source: UsbError,
    },

    #[error("failed to claim interface {interface}: {source}")]
    Claim { interface: u8, source: UsbError },

    #[error("interface {interface} is already claimed by this session")]
    AlreadyClaimed { interface: u8 },

    #[error("failed to release interface {interface}: {source}")]
    Release { interface: u8, source: UsbError },

    #[error("failed to detach kernel driver from interface {interface}: {source}")]
    Detach { interface: u8, source: UsbError },

    #[error("failed to clear halt on endpoint {endpoint}: {source}")]
    ClearHalt { endpoint: Endpoint, source: UsbError },
}

impl SessionError {
    /// libusb status code, if the transport reported one
    pub fn code(&self) -> Option<i32> {
        match self {
            SessionError::Open { source, .. }
            | SessionError::Claim { source, .. }
            | SessionError::Release { source, .. }
            | SessionError::Detach { source, .. }
            | SessionError::ClearHalt { source, .. } => Some(source.code()),
            _ => None,
        }
    }
}

/// String descriptor lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Index 0 means the device has no such string
    #[error("string descriptor index 0 does not name a string")]
    NoString,

    #[error("failed to read string descriptor {index}: {source}")]
    Read { index: u8, source: UsbError },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Per-transfer failures; the caller decides whether to retry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("transfer on endpoint {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: Endpoint, timeout: Duration },

    #[error("partial transfer on endpoint {endpoint}: {transferred} of {expected} bytes")]
    PartialTransfer {
        endpoint: Endpoint,
        expected: usize,
        transferred: usize,
    },

    #[error("no data received on endpoint {endpoint}")]
    NoData { endpoint: Endpoint },

    #[error("endpoint {endpoint} stalled")]
    Stall { endpoint: Endpoint },

    /// The transport claimed to move more bytes than the buffer holds
    #[error("endpoint {endpoint} reported {transferred} bytes for a {expected}-byte transfer")]
    Overrun {
        endpoint: Endpoint,
        expected: usize,
        transferred: usize,
    },

    #[error("transfer on endpoint {endpoint} failed: {source}")]
    Usb { endpoint: Endpoint, source: UsbError },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl TransferError {
    /// Classify this failure as a transfer status
    pub fn status(&self) -> TransferStatus {
        match self {
            TransferError::Timeout { .. } => TransferStatus::Timeout,
            TransferError::PartialTransfer { .. } => TransferStatus::Partial,
            TransferError::NoData { .. } => TransferStatus::NoData,
            TransferError::Stall { .. } => TransferStatus::Stall,
            _ => TransferStatus::Error,
        }
    }

    /// libusb status code, if one applies
    pub fn code(&self) -> Option<i32> {
        match self {
            TransferError::Timeout { .. } => Some(UsbError::Timeout.code()),
            TransferError::Stall { .. } => Some(UsbError::Pipe.code()),
            TransferError::Usb { source, .. } => Some(source.code()),
            TransferError::Session(e) => e.code(),
            _ => None,
        }
    }

    /// Bytes that did move before the failure
    pub fn transferred(&self) -> usize {
        match self {
            TransferError::PartialTransfer { transferred, .. }
            | TransferError::Overrun { transferred, .. } => *transferred,
            _ => 0,
        }
    }
}
