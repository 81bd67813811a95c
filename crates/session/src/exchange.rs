//! Report exchange over interrupt endpoints
//!
//! Each call performs one bounded, timeout-governed interrupt transfer on an
//! open [`Session`] and classifies the outcome. Nothing is retried here; the
//! caller decides what to do with a [`TransferError`].

use crate::error::TransferError;
use crate::session::Session;
use crate::transport::Transport;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use types::{
    Direction, Endpoint, MAX_REPORT_SIZE, TransferRequest, TransferResult, UsbError,
};

/// Execute one transfer request
///
/// Writes succeed only when the whole payload moved; reads succeed only when at
/// least one byte arrived.
pub fn execute<T: Transport>(
    session: &mut Session<'_, T>,
    request: &mut TransferRequest,
) -> Result<TransferResult, TransferError> {
    let endpoint = request.endpoint();
    let timeout = request.timeout();
    let expected = request.len();
    let (transport, handle) = session.handle_mut("transfer")?;

    debug!(
        "Interrupt transfer: endpoint={}, len={}, timeout={}ms, direction={:?}",
        endpoint,
        expected,
        timeout.as_millis(),
        request.direction()
    );

    let started = Instant::now();
    let outcome = match request.direction() {
        Direction::Out => transport.write_interrupt(handle, endpoint, request.payload(), timeout),
        Direction::In => transport.read_interrupt(handle, endpoint, request.buffer_mut(), timeout),
    };
    let elapsed = started.elapsed();

    let transferred = match outcome {
        Ok(n) => n,
        Err(source) => {
            let err = classify_failure(endpoint, timeout, source);
            warn!(
                "Interrupt transfer on endpoint {} failed after {}ms: {}",
                endpoint,
                elapsed.as_millis(),
                err
            );
            return Err(err);
        }
    };

    if transferred > expected {
        error!(
            "Transport reported {} bytes on endpoint {} for a {}-byte buffer",
            transferred, endpoint, expected
        );
        return Err(TransferError::Overrun {
            endpoint,
            expected,
            transferred,
        });
    }

    match request.direction() {
        Direction::Out if transferred < expected => {
            warn!(
                "Partial write on endpoint {}: {} of {} bytes",
                endpoint, transferred, expected
            );
            return Err(TransferError::PartialTransfer {
                endpoint,
                expected,
                transferred,
            });
        }
        Direction::In if transferred == 0 => {
            warn!("No data received on endpoint {}", endpoint);
            return Err(TransferError::NoData { endpoint });
        }
        _ => {}
    }

    debug!(
        "Interrupt transfer succeeded: {} bytes in {}ms",
        transferred,
        elapsed.as_millis()
    );
    Ok(TransferResult::success(
        endpoint,
        request.payload()[..transferred].to_vec(),
    ))
}

fn classify_failure(endpoint: Endpoint, timeout: Duration, source: UsbError) -> TransferError {
    match source {
        UsbError::Timeout => TransferError::Timeout { endpoint, timeout },
        UsbError::Pipe => TransferError::Stall { endpoint },
        source => TransferError::Usb { endpoint, source },
    }
}

/// Write `payload` to an interrupt OUT endpoint
pub fn write<T: Transport>(
    session: &mut Session<'_, T>,
    endpoint: Endpoint,
    payload: &[u8],
    timeout: Duration,
) -> Result<TransferResult, TransferError> {
    let mut request = TransferRequest::write(endpoint, payload, timeout)?;
    execute(session, &mut request)
}

/// Read up to `max_length` bytes from an interrupt IN endpoint
pub fn read<T: Transport>(
    session: &mut Session<'_, T>,
    endpoint: Endpoint,
    max_length: usize,
    timeout: Duration,
) -> Result<TransferResult, TransferError> {
    let mut request = TransferRequest::read(endpoint, max_length, timeout)?;
    execute(session, &mut request)
}

/// Both halves of a write-then-read cycle
///
/// The write succeeded; the read carries its own outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub sent: TransferResult,
    pub received: Result<TransferResult, TransferError>,
}

impl ExchangeOutcome {
    /// Both results, or the read's failure
    pub fn into_results(self) -> Result<(TransferResult, TransferResult), TransferError> {
        let received = self.received?;
        Ok((self.sent, received))
    }
}

/// Write then read; the read is never attempted if the write fails
///
/// A failed write is the error. Once the write has gone out its result is
/// always returned, next to whatever the read produced.
pub fn exchange<T: Transport>(
    session: &mut Session<'_, T>,
    out_endpoint: Endpoint,
    in_endpoint: Endpoint,
    payload: &[u8],
    timeout: Duration,
) -> Result<ExchangeOutcome, TransferError> {
    exchange_with(session, out_endpoint, in_endpoint, payload, MAX_REPORT_SIZE, timeout)
}

fn exchange_with<T: Transport>(
    session: &mut Session<'_, T>,
    out_endpoint: Endpoint,
    in_endpoint: Endpoint,
    payload: &[u8],
    read_length: usize,
    timeout: Duration,
) -> Result<ExchangeOutcome, TransferError> {
    let sent = write(session, out_endpoint, payload, timeout)?;
    let received = read(session, in_endpoint, read_length, timeout);
    Ok(ExchangeOutcome { sent, received })
}

/// Endpoint pair and per-transfer settings for repeated exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportExchanger {
    pub out_endpoint: Endpoint,
    pub in_endpoint: Endpoint,
    pub timeout: Duration,
    /// Largest report accepted on reads
    pub read_length: usize,
}

impl ReportExchanger {
    pub fn new(out_endpoint: Endpoint, in_endpoint: Endpoint, timeout: Duration) -> Self {
        Self {
            out_endpoint,
            in_endpoint,
            timeout,
            read_length: MAX_REPORT_SIZE,
        }
    }

    pub fn with_read_length(mut self, read_length: usize) -> Self {
        self.read_length = read_length;
        self
    }

    pub fn write<T: Transport>(
        &self,
        session: &mut Session<'_, T>,
        payload: &[u8],
    ) -> Result<TransferResult, TransferError> {
        write(session, self.out_endpoint, payload, self.timeout)
    }

    pub fn read<T: Transport>(
        &self,
        session: &mut Session<'_, T>,
    ) -> Result<TransferResult, TransferError> {
        read(session, self.in_endpoint, self.read_length, self.timeout)
    }

    pub fn exchange<T: Transport>(
        &self,
        session: &mut Session<'_, T>,
        payload: &[u8],
    ) -> Result<ExchangeOutcome, TransferError> {
        exchange_with(
            session,
            self.out_endpoint,
            self.in_endpoint,
            payload,
            self.read_length,
            self.timeout,
        )
    }
}
