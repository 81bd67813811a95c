//! Device selection
//!
//! [`enumerate`] takes a one-shot snapshot of the attached devices. Candidates
//! borrow from the returned [`DeviceList`]; dropping the list releases the
//! snapshot and, through the borrow checker, invalidates every candidate that
//! was not used to open a session.
//!
//! Candidates are ordered bus-then-address. When several attached devices share
//! a vendor/product pair, selection returns the first in that order and callers
//! may disambiguate further with [`DeviceList::find_by_path`].

use crate::error::EnumerationError;
use crate::transport::Transport;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};
use types::{DeviceDescriptor, DevicePath};

/// An enumerated device together with its descriptor snapshot
pub struct Candidate<D> {
    device: D,
    descriptor: DeviceDescriptor,
    path: DevicePath,
}

impl<D> Candidate<D> {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn path(&self) -> &DevicePath {
        &self.path
    }

    pub(crate) fn device(&self) -> &D {
        &self.device
    }
}

impl<D> fmt::Debug for Candidate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("descriptor", &self.descriptor)
            .field("path", &self.path)
            .finish()
    }
}

/// Snapshot of attached devices, ordered bus-then-address
pub struct DeviceList<D> {
    candidates: Vec<Candidate<D>>,
}

impl<D> DeviceList<D> {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate<D>> {
        self.candidates.iter()
    }

    /// First device carrying the vendor/product pair
    ///
    /// `None` is an ordinary outcome that the caller must handle before any
    /// session is constructed.
    pub fn find_by_id(&self, vendor_id: u16, product_id: u16) -> Option<&Candidate<D>> {
        self.candidates
            .iter()
            .find(|c| c.descriptor.matches(vendor_id, product_id))
    }

    /// Every device accepted by `selector`, in enumeration order
    pub fn select<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> impl Iterator<Item = &'a Candidate<D>> + 'a {
        self.candidates
            .iter()
            .filter(move |c| selector.matches(&c.descriptor))
    }

    /// Every device accepted by any of `selectors`; an empty list accepts all
    pub fn select_any<'a>(
        &'a self,
        selectors: &'a [Selector],
    ) -> impl Iterator<Item = &'a Candidate<D>> + 'a {
        self.candidates
            .iter()
            .filter(move |c| Selector::any_match(selectors, &c.descriptor))
    }

    /// Device at an exact port path
    pub fn find_by_path(&self, path: &DevicePath) -> Option<&Candidate<D>> {
        self.candidates.iter().find(|c| &c.path == path)
    }
}

impl<'a, D> IntoIterator for &'a DeviceList<D> {
    type Item = &'a Candidate<D>;
    type IntoIter = std::slice::Iter<'a, Candidate<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Take a fresh snapshot of the attached devices
///
/// Topology may change between calls; re-enumerating always means calling
/// this again.
pub fn enumerate<T: Transport>(transport: &T) -> Result<DeviceList<T::Device>, EnumerationError> {
    let devices = transport
        .devices()
        .map_err(|source| EnumerationError::List { source })?;

    let mut candidates = Vec::with_capacity(devices.len());

    for device in devices {
        let descriptor = transport.descriptor(&device).map_err(|source| {
            let (bus_number, address) = transport.location(&device);
            EnumerationError::Descriptor {
                bus_number,
                address,
                source,
            }
        })?;

        let path = match transport.port_numbers(&device) {
            Ok(ports) => DevicePath::try_from(ports).unwrap_or_else(|e| {
                warn!(
                    "Ignoring port path of device on bus {} address {}: {}",
                    descriptor.bus_number, descriptor.address, e
                );
                DevicePath::root()
            }),
            Err(e) => {
                debug!(
                    "No port path for device on bus {} address {}: {}",
                    descriptor.bus_number, descriptor.address, e
                );
                DevicePath::root()
            }
        };

        candidates.push(Candidate {
            device,
            descriptor,
            path,
        });
    }

    candidates.sort_by_key(|c| c.descriptor.location());

    debug!("Enumerated {} devices", candidates.len());
    Ok(DeviceList { candidates })
}

/// Match predicate over vendor/product identifiers
///
/// A `None` field matches anything, so [`Selector::all`] accepts every device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selector {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl Selector {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    pub fn by_vendor(vendor_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: None,
        }
    }

    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        self.vendor_id.is_none_or(|v| v == descriptor.vendor_id)
            && self.product_id.is_none_or(|p| p == descriptor.product_id)
    }

    /// If no selectors are given, every device matches
    pub fn any_match(selectors: &[Selector], descriptor: &DeviceDescriptor) -> bool {
        selectors.is_empty() || selectors.iter().any(|s| s.matches(descriptor))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor_id {
            Some(v) => write!(f, "{:#06x}", v)?,
            None => f.write_str("*")?,
        }
        f.write_str(":")?;
        match self.product_id {
            Some(p) => write!(f, "{:#06x}", p),
            None => f.write_str("*"),
        }
    }
}

/// A filter string could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorParseError {
    #[error(
        "Invalid filter format '{0}', expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')"
    )]
    Format(String),

    #[error("Invalid {name} '{value}', must start with '0x' (e.g., '0x1234')")]
    MissingPrefix { name: &'static str, value: String },

    #[error("Invalid {name} '{value}', hex part must be 1-4 digits")]
    Length { name: &'static str, value: String },

    #[error("Invalid {name} '{value}', not a valid hex number")]
    NotHex { name: &'static str, value: String },
}

impl FromStr for Selector {
    type Err = SelectorParseError;

    /// Parse `"0xVID:0xPID"`, `"0xVID:*"`, `"*:0xPID"`, `"*:*"` or `"*"`
    fn from_str(filter: &str) -> Result<Self, Self::Err> {
        let filter = filter.trim();
        if filter == "*" {
            return Ok(Self::all());
        }

        let parts: Vec<&str> = filter.split(':').collect();
        if parts.len() != 2 {
            return Err(SelectorParseError::Format(filter.to_string()));
        }

        Ok(Self {
            vendor_id: parse_id_component(parts[0], "VID")?,
            product_id: parse_id_component(parts[1], "PID")?,
        })
    }
}

fn parse_id_component(part: &str, name: &'static str) -> Result<Option<u16>, SelectorParseError> {
    if part == "*" {
        return Ok(None);
    }
    parse_hex_id(part, name).map(Some)
}

/// Parse a `0x`-prefixed 16-bit hex identifier (VID or PID)
pub fn parse_hex_id(id: &str, name: &'static str) -> Result<u16, SelectorParseError> {
    let hex_part = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| SelectorParseError::MissingPrefix {
            name,
            value: id.to_string(),
        })?;

    if hex_part.is_empty() || hex_part.len() > 4 {
        return Err(SelectorParseError::Length {
            name,
            value: id.to_string(),
        });
    }

    u16::from_str_radix(hex_part, 16).map_err(|_| SelectorParseError::NotHex {
        name,
        value: id.to_string(),
    })
}
