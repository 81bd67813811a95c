//! libusb transport binding
//!
//! Implements [`Transport`] on top of rusb with a private libusb context and
//! maps rusb statuses onto [`UsbError`].

use crate::error::InitializationError;
use crate::transport::Transport;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, trace};
use types::{DeviceDescriptor, DeviceSpeed, Endpoint, UsbError};

/// Transport backed by a libusb context
pub struct RusbTransport {
    context: Context,
}

impl RusbTransport {
    /// Start the libusb subsystem
    pub fn new() -> Result<Self, InitializationError> {
        let context = Context::new().map_err(|e| InitializationError {
            source: map_rusb_error(e),
        })?;

        debug!("libusb context initialized (libusb {})", libusb_version());
        Ok(Self { context })
    }
}

impl Transport for RusbTransport {
    type Device = Device<Context>;
    type Handle = DeviceHandle<Context>;

    fn devices(&self) -> Result<Vec<Self::Device>, UsbError> {
        let list = self.context.devices().map_err(map_rusb_error)?;
        Ok(list.iter().collect())
    }

    fn location(&self, device: &Self::Device) -> (u8, u8) {
        (device.bus_number(), device.address())
    }

    fn descriptor(&self, device: &Self::Device) -> Result<DeviceDescriptor, UsbError> {
        let desc = device.device_descriptor().map_err(map_rusb_error)?;

        Ok(DeviceDescriptor {
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            bus_number: device.bus_number(),
            address: device.address(),
            speed: map_device_speed(device.speed()),
            class_code: desc.class_code(),
            manufacturer_index: desc.manufacturer_string_index(),
            product_index: desc.product_string_index(),
            serial_number_index: desc.serial_number_string_index(),
            num_configurations: desc.num_configurations(),
        })
    }

    fn port_numbers(&self, device: &Self::Device) -> Result<Vec<u8>, UsbError> {
        device.port_numbers().map_err(map_rusb_error)
    }

    fn open(&self, device: &Self::Device) -> Result<Self::Handle, UsbError> {
        device.open().map_err(map_rusb_error)
    }

    fn close(&self, handle: Self::Handle) {
        // libusb_close runs when the handle is dropped
        drop(handle);
    }

    fn kernel_driver_active(
        &self,
        handle: &Self::Handle,
        interface: u8,
    ) -> Result<bool, UsbError> {
        handle
            .kernel_driver_active(interface)
            .map_err(map_rusb_error)
    }

    fn detach_kernel_driver(
        &self,
        handle: &mut Self::Handle,
        interface: u8,
    ) -> Result<(), UsbError> {
        handle
            .detach_kernel_driver(interface)
            .map_err(map_rusb_error)
    }

    fn attach_kernel_driver(
        &self,
        handle: &mut Self::Handle,
        interface: u8,
    ) -> Result<(), UsbError> {
        handle
            .attach_kernel_driver(interface)
            .map_err(map_rusb_error)
    }

    fn claim_interface(&self, handle: &mut Self::Handle, interface: u8) -> Result<(), UsbError> {
        handle.claim_interface(interface).map_err(map_rusb_error)
    }

    fn release_interface(
        &self,
        handle: &mut Self::Handle,
        interface: u8,
    ) -> Result<(), UsbError> {
        handle.release_interface(interface).map_err(map_rusb_error)
    }

    fn read_string_descriptor(
        &self,
        handle: &Self::Handle,
        index: u8,
        timeout: Duration,
    ) -> Result<String, UsbError> {
        // Prefer the first language the device advertises; some devices
        // answer only the ASCII helper's fixed language request.
        match handle.read_languages(timeout) {
            Ok(languages) if !languages.is_empty() => handle
                .read_string_descriptor(languages[0], index, timeout)
                .map_err(map_rusb_error),
            Ok(_) => handle
                .read_string_descriptor_ascii(index)
                .map_err(map_rusb_error),
            Err(e) => {
                trace!("Could not read language table ({}), using ASCII lookup", e);
                handle
                    .read_string_descriptor_ascii(index)
                    .map_err(map_rusb_error)
            }
        }
    }

    fn write_interrupt(
        &self,
        handle: &mut Self::Handle,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        handle
            .write_interrupt(endpoint.address(), data, timeout)
            .map_err(map_rusb_error)
    }

    fn read_interrupt(
        &self,
        handle: &mut Self::Handle,
        endpoint: Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        handle
            .read_interrupt(endpoint.address(), buf, timeout)
            .map_err(map_rusb_error)
    }

    fn clear_halt(&self, handle: &mut Self::Handle, endpoint: Endpoint) -> Result<(), UsbError> {
        handle.clear_halt(endpoint.address()).map_err(map_rusb_error)
    }
}

fn libusb_version() -> String {
    let version = rusb::version();
    format!(
        "{}.{}.{}",
        version.major(),
        version.minor(),
        version.micro()
    )
}

/// Map rusb::Error to the transport status taxonomy
pub fn map_rusb_error(err: rusb::Error) -> UsbError {
    match err {
        rusb::Error::Io => UsbError::Io,
        rusb::Error::InvalidParam => UsbError::InvalidParam,
        rusb::Error::Access => UsbError::Access,
        rusb::Error::NoDevice => UsbError::NoDevice,
        rusb::Error::NotFound => UsbError::NotFound,
        rusb::Error::Busy => UsbError::Busy,
        rusb::Error::Timeout => UsbError::Timeout,
        rusb::Error::Overflow => UsbError::Overflow,
        rusb::Error::Pipe => UsbError::Pipe,
        rusb::Error::Interrupted => UsbError::Interrupted,
        rusb::Error::NoMem => UsbError::NoMem,
        rusb::Error::NotSupported => UsbError::NotSupported,
        _ => UsbError::Other {
            message: err.to_string(),
        },
    }
}

/// Map rusb device speed to DeviceSpeed
fn map_device_speed(speed: rusb::Speed) -> DeviceSpeed {
    match speed {
        rusb::Speed::Low => DeviceSpeed::Low,
        rusb::Speed::Full => DeviceSpeed::Full,
        rusb::Speed::High => DeviceSpeed::High,
        rusb::Speed::Super => DeviceSpeed::Super,
        rusb::Speed::SuperPlus => DeviceSpeed::SuperPlus,
        _ => DeviceSpeed::Unknown,
    }
}
