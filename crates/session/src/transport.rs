//! Transport binding seam
//!
//! The session core never talks to the host-controller stack directly. It
//! consumes this trait, implemented by [`crate::RusbTransport`] for real
//! hardware and by [`crate::test_utils::MockTransport`] in tests.

use std::time::Duration;
use types::{DeviceDescriptor, Endpoint, UsbError};

/// Synchronous USB host-controller capability
///
/// All calls block the calling thread. Transfer calls return once the
/// transfer completes, fails, or `timeout` elapses.
pub trait Transport {
    /// Enumerated device reference, valid while its snapshot is alive
    type Device;

    /// Exclusively owned open device handle
    type Handle;

    /// List attached devices
    fn devices(&self) -> Result<Vec<Self::Device>, UsbError>;

    /// Bus number and device address
    fn location(&self, device: &Self::Device) -> (u8, u8);

    /// Read the cached device descriptor, including bus, address and speed
    fn descriptor(&self, device: &Self::Device) -> Result<DeviceDescriptor, UsbError>;

    /// Port numbers from the root hub to the device
    fn port_numbers(&self, device: &Self::Device) -> Result<Vec<u8>, UsbError>;

    fn open(&self, device: &Self::Device) -> Result<Self::Handle, UsbError>;

    /// Close a handle; consumes it so it cannot be closed twice
    fn close(&self, handle: Self::Handle);

    fn kernel_driver_active(&self, handle: &Self::Handle, interface: u8)
    -> Result<bool, UsbError>;

    fn detach_kernel_driver(&self, handle: &mut Self::Handle, interface: u8)
    -> Result<(), UsbError>;

    fn attach_kernel_driver(&self, handle: &mut Self::Handle, interface: u8)
    -> Result<(), UsbError>;

    fn claim_interface(&self, handle: &mut Self::Handle, interface: u8) -> Result<(), UsbError>;

    fn release_interface(&self, handle: &mut Self::Handle, interface: u8)
    -> Result<(), UsbError>;

    /// Resolve a non-zero string descriptor index to text
    fn read_string_descriptor(
        &self,
        handle: &Self::Handle,
        index: u8,
        timeout: Duration,
    ) -> Result<String, UsbError>;

    /// Interrupt OUT transfer; returns bytes written
    fn write_interrupt(
        &self,
        handle: &mut Self::Handle,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;

    /// Interrupt IN transfer; returns bytes read into `buf`
    fn read_interrupt(
        &self,
        handle: &mut Self::Handle,
        endpoint: Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;

    fn clear_halt(&self, handle: &mut Self::Handle, endpoint: Endpoint) -> Result<(), UsbError>;
}
