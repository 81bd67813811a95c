//! Interrupt transfer requests and results

use crate::error::RequestError;
use std::fmt;
use std::time::Duration;

/// Largest report moved in a single interrupt transfer
///
/// Matches the max-packet-size of a full-speed interrupt endpoint.
pub const MAX_REPORT_SIZE: usize = 64;

/// Transfer direction, from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// Endpoint address, including the direction bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(u8);

impl Endpoint {
    pub const fn new(address: u8) -> Self {
        Self(address)
    }

    pub fn address(self) -> u8 {
        self.0
    }

    /// Endpoint number without the direction bit
    pub fn number(self) -> u8 {
        self.0 & 0x0f
    }

    /// Bit 7 set means IN
    pub fn direction(self) -> Direction {
        if self.0 & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// One interrupt transfer, constructed per call
///
/// The buffer is fixed at [`MAX_REPORT_SIZE`]; for writes it holds the payload,
/// for reads it receives the incoming report.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    endpoint: Endpoint,
    buffer: [u8; MAX_REPORT_SIZE],
    length: usize,
    timeout: Duration,
}

impl TransferRequest {
    /// Build an OUT transfer carrying `payload`
    pub fn write(
        endpoint: Endpoint,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Self, RequestError> {
        if endpoint.direction() != Direction::Out {
            return Err(RequestError::WrongDirection {
                endpoint,
                expected: Direction::Out,
            });
        }
        if payload.len() > MAX_REPORT_SIZE {
            return Err(RequestError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_REPORT_SIZE,
            });
        }

        let mut buffer = [0u8; MAX_REPORT_SIZE];
        buffer[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            endpoint,
            buffer,
            length: payload.len(),
            timeout,
        })
    }

    /// Build an IN transfer accepting up to `max_length` bytes
    pub fn read(
        endpoint: Endpoint,
        max_length: usize,
        timeout: Duration,
    ) -> Result<Self, RequestError> {
        if endpoint.direction() != Direction::In {
            return Err(RequestError::WrongDirection {
                endpoint,
                expected: Direction::In,
            });
        }
        if max_length == 0 {
            return Err(RequestError::EmptyRead);
        }
        if max_length > MAX_REPORT_SIZE {
            return Err(RequestError::PayloadTooLarge {
                len: max_length,
                max: MAX_REPORT_SIZE,
            });
        }

        Ok(Self {
            endpoint,
            buffer: [0u8; MAX_REPORT_SIZE],
            length: max_length,
            timeout,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn direction(&self) -> Direction {
        self.endpoint.direction()
    }

    /// Payload length for writes, buffer capacity for reads
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bytes to send (writes) or the current buffer contents (reads)
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    /// Receive buffer, sized to the requested length
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.length]
    }
}

/// Outcome classification of one transfer
///
/// A returned [`TransferResult`] is always a success; the failure variants
/// classify transfer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Success,
    Timeout,
    Stall,
    /// Fewer bytes moved than the payload length
    Partial,
    /// Read completed successfully but carried no data
    NoData,
    Error,
}

/// Bytes moved by a successful transfer
///
/// Failed transfers never produce one; they come back as errors carrying a
/// [`TransferStatus`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub endpoint: Endpoint,
    /// Bytes actually moved
    pub transferred: usize,
    /// The bytes moved: the sent prefix of the payload, or the received report
    pub data: Vec<u8>,
}

impl TransferResult {
    pub fn success(endpoint: Endpoint, data: Vec<u8>) -> Self {
        Self {
            endpoint,
            transferred: data.len(),
            data,
        }
    }

    pub fn direction(&self) -> Direction {
        self.endpoint.direction()
    }
}
