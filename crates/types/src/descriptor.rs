//! Device descriptor snapshots and port paths

use crate::error::DevicePathError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of hops from the root hub to a device
pub const MAX_PATH_DEPTH: usize = 7;

/// Negotiated USB device speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSpeed {
    /// Host controller did not report a speed
    Unknown,
    /// Low speed - 1.5 Mbps (USB 1.0)
    Low,
    /// Full speed - 12 Mbps (USB 1.1)
    Full,
    /// High speed - 480 Mbps (USB 2.0)
    High,
    /// SuperSpeed - 5 Gbps (USB 3.0)
    Super,
    /// SuperSpeed+ - 10 Gbps (USB 3.1)
    SuperPlus,
}

impl DeviceSpeed {
    /// libusb numeric speed code
    pub fn code(self) -> u8 {
        match self {
            DeviceSpeed::Unknown => 0,
            DeviceSpeed::Low => 1,
            DeviceSpeed::Full => 2,
            DeviceSpeed::High => 3,
            DeviceSpeed::Super => 4,
            DeviceSpeed::SuperPlus => 5,
        }
    }
}

impl fmt::Display for DeviceSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceSpeed::Unknown => "unknown",
            DeviceSpeed::Low => "1.5 Mbps",
            DeviceSpeed::Full => "12 Mbps",
            DeviceSpeed::High => "480 Mbps",
            DeviceSpeed::Super => "5 Gbps",
            DeviceSpeed::SuperPlus => "10 Gbps",
        };
        f.write_str(name)
    }
}

/// Immutable snapshot of a device taken at enumeration time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Bus number on the host
    pub bus_number: u8,
    /// Device address on the bus
    pub address: u8,
    /// Negotiated speed
    pub speed: DeviceSpeed,
    /// USB device class
    pub class_code: u8,
    /// Manufacturer string descriptor index, `None` when the device has none
    pub manufacturer_index: Option<u8>,
    /// Product string descriptor index
    pub product_index: Option<u8>,
    /// Serial number string descriptor index
    pub serial_number_index: Option<u8>,
    /// Number of configurations
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Whether this device carries the given vendor/product pair
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }

    /// Enumeration sort key (bus, then address)
    pub fn location(&self) -> (u8, u8) {
        (self.bus_number, self.address)
    }
}

/// Port numbers from the root hub down to a device
///
/// Used only for diagnostics and for telling apart devices that share a
/// vendor/product pair. Holds between 0 and [`MAX_PATH_DEPTH`] hops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DevicePath(Vec<u8>);

impl DevicePath {
    /// Empty path (root hub, or platform without port information)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn ports(&self) -> &[u8] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<u8>> for DevicePath {
    type Error = DevicePathError;

    fn try_from(ports: Vec<u8>) -> Result<Self, Self::Error> {
        if ports.len() > MAX_PATH_DEPTH {
            return Err(DevicePathError::TooDeep {
                depth: ports.len(),
                max: MAX_PATH_DEPTH,
            });
        }
        Ok(Self(ports))
    }
}

impl TryFrom<&[u8]> for DevicePath {
    type Error = DevicePathError;

    fn try_from(ports: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from(ports.to_vec())
    }
}

impl From<DevicePath> for Vec<u8> {
    fn from(path: DevicePath) -> Self {
        path.0
    }
}

impl FromStr for DevicePath {
    type Err = DevicePathError;

    /// Parse the dotted form printed by [`fmt::Display`], e.g. `1.4.2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::root());
        }

        let ports = s
            .split('.')
            .map(|part| {
                part.parse::<u8>()
                    .map_err(|_| DevicePathError::InvalidPort(part.to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        Self::try_from(ports)
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, port) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", port)?;
        }
        Ok(())
    }
}
