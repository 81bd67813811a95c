//! The `list` and `exchange` commands, generic over the transport so they run
//! against the in-memory mock in tests

use crate::report::{
    DeviceRecord, EXCHANGE_PATTERN_BASE, ExchangeReport, SEND_ONLY_PATTERN_BASE, pattern,
};
use anyhow::{Context, Result, anyhow};
use std::time::Duration;
use tracing::{debug, info, warn};
use types::Endpoint;
use usb_session::{
    Candidate, EnumerationError, ReportExchanger, Selector, Session, Transport, enumerate, open,
};

/// Enumerate and describe every device accepted by `selectors`
///
/// Devices that cannot be opened are still listed, without strings.
pub fn list_devices<T: Transport>(
    transport: &T,
    selectors: &[Selector],
) -> Result<Vec<DeviceRecord>, EnumerationError> {
    let devices = enumerate(transport)?;
    Ok(devices
        .select_any(selectors)
        .map(|candidate| describe(transport, candidate))
        .collect())
}

fn describe<T: Transport>(transport: &T, candidate: &Candidate<T::Device>) -> DeviceRecord {
    let desc = candidate.descriptor();
    let mut record = DeviceRecord::new(desc.clone(), candidate.path().clone());

    let session = match open(transport, candidate) {
        Ok(session) => session,
        Err(e) => {
            warn!("{}; listing without strings", e);
            return record;
        }
    };

    record.manufacturer = resolve_string(&session, desc.manufacturer_index);
    record.product = resolve_string(&session, desc.product_index);
    record.serial_number = resolve_string(&session, desc.serial_number_index);
    record
}

fn resolve_string<T: Transport>(session: &Session<'_, T>, index: Option<u8>) -> Option<String> {
    let index = index?;
    match session.get_string_descriptor(index) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// Resolved settings for one `exchange` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub out_endpoint: Endpoint,
    pub in_endpoint: Endpoint,
    pub timeout: Duration,
    pub report_size: usize,
    pub detach_kernel_driver: bool,
    pub send_only: bool,
}

/// Find the device, claim its interface, then write-then-read one report
/// and optionally follow with a write-only report
///
/// Failing to reach the device or to send the first report is an error.
/// After that every transfer's outcome is kept in the report, so the bytes
/// that did go out are never lost to a later failure. The session is closed
/// on every path out of this function.
pub fn run_exchange<T: Transport>(
    transport: &T,
    settings: &ExchangeSettings,
) -> Result<ExchangeReport> {
    let devices = enumerate(transport)?;
    let candidate = devices
        .find_by_id(settings.vendor_id, settings.product_id)
        .ok_or_else(|| {
            anyhow!(
                "Unable to find device {:04x}:{:04x}",
                settings.vendor_id,
                settings.product_id
            )
        })?;

    let mut session = open(transport, candidate)?;
    if settings.detach_kernel_driver {
        session.claim_detaching(settings.interface)?;
    } else {
        session.claim(settings.interface)?;
    }
    info!(
        "Claimed interface {} on {:04x}:{:04x} at {}",
        settings.interface,
        settings.vendor_id,
        settings.product_id,
        candidate.path()
    );

    let exchanger = ReportExchanger::new(settings.out_endpoint, settings.in_endpoint, settings.timeout)
        .with_read_length(settings.report_size);

    let payload = pattern(EXCHANGE_PATTERN_BASE, settings.report_size);
    let outcome = exchanger
        .exchange(&mut session, &payload)
        .context("Report exchange failed")?;
    if let Err(e) = &outcome.received {
        warn!("{}", e);
    }

    let send_only = if settings.send_only {
        let payload = pattern(SEND_ONLY_PATTERN_BASE, settings.report_size);
        Some(exchanger.write(&mut session, &payload))
    } else {
        None
    };

    session.close();
    debug!("Exchange complete");

    Ok(ExchangeReport {
        device: DeviceRecord::new(candidate.descriptor().clone(), candidate.path().clone()),
        sent: outcome.sent,
        received: outcome.received,
        send_only,
    })
}
