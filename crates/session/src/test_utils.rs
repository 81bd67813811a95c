//! Test utilities for usb-session
//!
//! An in-memory [`Transport`] with scriptable devices, used by unit and
//! integration tests and by downstream crates that drive the session core
//! without hardware.
//!
//! # Example
//!
//! ```
//! use usb_session::test_utils::{MockDevice, MockTransport};
//! use usb_session::{enumerate, open};
//!
//! let transport = MockTransport::new(vec![MockDevice::new(0x04d8, 0x003f)]);
//! let devices = enumerate(&transport).unwrap();
//! let candidate = devices.find_by_id(0x04d8, 0x003f).unwrap();
//!
//! let mut session = open(&transport, candidate).unwrap();
//! session.claim(0).unwrap();
//! drop(session);
//!
//! let stats = transport.stats();
//! assert_eq!(stats.opens, 1);
//! assert_eq!(stats.closes, 1);
//! assert_eq!(stats.releases, 1);
//! ```

use crate::transport::Transport;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use types::{DeviceDescriptor, DeviceSpeed, Endpoint, UsbError};

/// Scripted outcome of one interrupt read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    /// Deliver this report
    Data(Vec<u8>),
    /// Complete successfully with zero bytes
    Empty,
    /// Claim more bytes than the buffer holds
    Overrun(usize),
    /// Block for the request timeout, then time out
    Timeout,
    Fail(UsbError),
}

/// Scripted outcome of one interrupt write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockWrite {
    /// Accept the whole payload
    Accept,
    /// Accept only this many bytes
    Short(usize),
    /// Claim more bytes than the payload holds
    Overrun(usize),
    /// Block for the request timeout, then time out
    Timeout,
    Fail(UsbError),
}

/// Simulated device
#[derive(Debug, Clone)]
pub struct MockDevice {
    descriptor: DeviceDescriptor,
    ports: Vec<u8>,
    strings: HashMap<u8, String>,
    kernel_driver: bool,
    echo: bool,
    reads: VecDeque<MockRead>,
    writes: VecDeque<MockWrite>,
    descriptor_error: Option<UsbError>,
    open_error: Option<UsbError>,
    claim_error: Option<UsbError>,
    release_error: Option<UsbError>,
    detach_error: Option<UsbError>,
}

impl MockDevice {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                vendor_id,
                product_id,
                bus_number: 1,
                address: 1,
                speed: DeviceSpeed::Full,
                class_code: 0,
                manufacturer_index: None,
                product_index: None,
                serial_number_index: None,
                num_configurations: 1,
            },
            ports: vec![1],
            strings: HashMap::new(),
            kernel_driver: false,
            echo: false,
            reads: VecDeque::new(),
            writes: VecDeque::new(),
            descriptor_error: None,
            open_error: None,
            claim_error: None,
            release_error: None,
            detach_error: None,
        }
    }

    pub fn at(mut self, bus_number: u8, address: u8) -> Self {
        self.descriptor.bus_number = bus_number;
        self.descriptor.address = address;
        self
    }

    pub fn with_ports(mut self, ports: &[u8]) -> Self {
        self.ports = ports.to_vec();
        self
    }

    pub fn with_speed(mut self, speed: DeviceSpeed) -> Self {
        self.descriptor.speed = speed;
        self
    }

    /// Manufacturer string at index 1
    pub fn with_manufacturer(mut self, name: &str) -> Self {
        self.descriptor.manufacturer_index = Some(1);
        self.strings.insert(1, name.to_string());
        self
    }

    /// Product string at index 2
    pub fn with_product(mut self, name: &str) -> Self {
        self.descriptor.product_index = Some(2);
        self.strings.insert(2, name.to_string());
        self
    }

    /// Advertise a string index the device cannot actually return
    pub fn with_broken_product_string(mut self) -> Self {
        self.descriptor.product_index = Some(2);
        self.strings.remove(&2);
        self
    }

    /// Bind a kernel driver to the device's interfaces
    pub fn with_kernel_driver(mut self) -> Self {
        self.kernel_driver = true;
        self
    }

    /// Queue every written report as the next read
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn with_read(mut self, read: MockRead) -> Self {
        self.reads.push_back(read);
        self
    }

    pub fn with_write(mut self, write: MockWrite) -> Self {
        self.writes.push_back(write);
        self
    }

    pub fn failing_descriptor(mut self, err: UsbError) -> Self {
        self.descriptor_error = Some(err);
        self
    }

    pub fn failing_open(mut self, err: UsbError) -> Self {
        self.open_error = Some(err);
        self
    }

    pub fn failing_claim(mut self, err: UsbError) -> Self {
        self.claim_error = Some(err);
        self
    }

    pub fn failing_release(mut self, err: UsbError) -> Self {
        self.release_error = Some(err);
        self
    }

    pub fn failing_detach(mut self, err: UsbError) -> Self {
        self.detach_error = Some(err);
        self
    }
}

/// Reference to a simulated device (index into the transport)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDeviceRef(usize);

/// Open handle on a simulated device
#[derive(Debug)]
pub struct MockHandle {
    id: u64,
    device: usize,
}

/// Call counters recorded by [`MockTransport`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    pub enumerations: usize,
    pub opens: usize,
    pub closes: usize,
    /// Handles closed more than once
    pub double_closes: usize,
    /// Handles opened but not yet closed
    pub open_handles: usize,
    pub claims: usize,
    pub releases: usize,
    pub detaches: usize,
    pub attaches: usize,
    pub clear_halts: usize,
    pub writes: Vec<(Endpoint, Vec<u8>)>,
    pub reads: usize,
}

struct MockState {
    devices: Vec<MockDevice>,
    next_handle: u64,
    live_handles: Vec<u64>,
    closed_handles: Vec<u64>,
    stats: MockStats,
}

/// In-memory transport
pub struct MockTransport {
    state: RefCell<MockState>,
    enumeration_error: Option<UsbError>,
}

impl MockTransport {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            state: RefCell::new(MockState {
                devices,
                next_handle: 1,
                live_handles: Vec::new(),
                closed_handles: Vec::new(),
                stats: MockStats::default(),
            }),
            enumeration_error: None,
        }
    }

    /// Make every device listing fail
    pub fn failing_enumeration(mut self, err: UsbError) -> Self {
        self.enumeration_error = Some(err);
        self
    }

    pub fn stats(&self) -> MockStats {
        let state = self.state.borrow();
        let mut stats = state.stats.clone();
        stats.open_handles = state.live_handles.len();
        stats
    }

    /// Whether a kernel driver is currently bound to the device
    pub fn kernel_driver_bound(&self, device: usize) -> bool {
        self.state
            .borrow()
            .devices
            .get(device)
            .is_some_and(|d| d.kernel_driver)
    }
}

impl Transport for MockTransport {
    type Device = MockDeviceRef;
    type Handle = MockHandle;

    fn devices(&self) -> Result<Vec<Self::Device>, UsbError> {
        let mut state = self.state.borrow_mut();
        state.stats.enumerations += 1;
        if let Some(err) = &self.enumeration_error {
            return Err(err.clone());
        }
        Ok((0..state.devices.len()).map(MockDeviceRef).collect())
    }

    fn location(&self, device: &Self::Device) -> (u8, u8) {
        let state = self.state.borrow();
        let desc = &state.devices[device.0].descriptor;
        (desc.bus_number, desc.address)
    }

    fn descriptor(&self, device: &Self::Device) -> Result<DeviceDescriptor, UsbError> {
        let state = self.state.borrow();
        let dev = &state.devices[device.0];
        match &dev.descriptor_error {
            Some(err) => Err(err.clone()),
            None => Ok(dev.descriptor.clone()),
        }
    }

    fn port_numbers(&self, device: &Self::Device) -> Result<Vec<u8>, UsbError> {
        Ok(self.state.borrow().devices[device.0].ports.clone())
    }

    fn open(&self, device: &Self::Device) -> Result<Self::Handle, UsbError> {
        let mut state = self.state.borrow_mut();
        if let Some(err) = &state.devices[device.0].open_error {
            return Err(err.clone());
        }

        let id = state.next_handle;
        state.next_handle += 1;
        state.live_handles.push(id);
        state.stats.opens += 1;

        Ok(MockHandle {
            id,
            device: device.0,
        })
    }

    fn close(&self, handle: Self::Handle) {
        let mut state = self.state.borrow_mut();
        state.stats.closes += 1;
        if state.closed_handles.contains(&handle.id) {
            state.stats.double_closes += 1;
        }
        state.live_handles.retain(|id| *id != handle.id);
        state.closed_handles.push(handle.id);
    }

    fn kernel_driver_active(
        &self,
        handle: &Self::Handle,
        _interface: u8,
    ) -> Result<bool, UsbError> {
        Ok(self.state.borrow().devices[handle.device].kernel_driver)
    }

    fn detach_kernel_driver(
        &self,
        handle: &mut Self::Handle,
        _interface: u8,
    ) -> Result<(), UsbError> {
        let mut state = self.state.borrow_mut();
        state.stats.detaches += 1;
        let dev = &mut state.devices[handle.device];
        if let Some(err) = &dev.detach_error {
            return Err(err.clone());
        }
        dev.kernel_driver = false;
        Ok(())
    }

    fn attach_kernel_driver(
        &self,
        handle: &mut Self::Handle,
        _interface: u8,
    ) -> Result<(), UsbError> {
        let mut state = self.state.borrow_mut();
        state.stats.attaches += 1;
        state.devices[handle.device].kernel_driver = true;
        Ok(())
    }

    fn claim_interface(&self, handle: &mut Self::Handle, _interface: u8) -> Result<(), UsbError> {
        let mut state = self.state.borrow_mut();
        state.stats.claims += 1;
        let dev = &state.devices[handle.device];
        match &dev.claim_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn release_interface(
        &self,
        handle: &mut Self::Handle,
        _interface: u8,
    ) -> Result<(), UsbError> {
        let mut state = self.state.borrow_mut();
        state.stats.releases += 1;
        match &state.devices[handle.device].release_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn read_string_descriptor(
        &self,
        handle: &Self::Handle,
        index: u8,
        _timeout: Duration,
    ) -> Result<String, UsbError> {
        self.state.borrow().devices[handle.device]
            .strings
            .get(&index)
            .cloned()
            .ok_or(UsbError::Pipe)
    }

    fn write_interrupt(
        &self,
        handle: &mut Self::Handle,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        let behaviour = {
            let mut state = self.state.borrow_mut();
            state.stats.writes.push((endpoint, data.to_vec()));
            state.devices[handle.device]
                .writes
                .pop_front()
                .unwrap_or(MockWrite::Accept)
        };

        match behaviour {
            MockWrite::Accept => {
                let mut state = self.state.borrow_mut();
                let dev = &mut state.devices[handle.device];
                if dev.echo {
                    dev.reads.push_back(MockRead::Data(data.to_vec()));
                }
                Ok(data.len())
            }
            MockWrite::Short(n) => Ok(n.min(data.len())),
            MockWrite::Overrun(n) => Ok(n),
            MockWrite::Timeout => {
                std::thread::sleep(timeout);
                Err(UsbError::Timeout)
            }
            MockWrite::Fail(err) => Err(err),
        }
    }

    fn read_interrupt(
        &self,
        handle: &mut Self::Handle,
        _endpoint: Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        let behaviour = {
            let mut state = self.state.borrow_mut();
            state.stats.reads += 1;
            state.devices[handle.device]
                .reads
                .pop_front()
                .unwrap_or(MockRead::Timeout)
        };

        match behaviour {
            MockRead::Data(data) => {
                if data.len() > buf.len() {
                    return Err(UsbError::Overflow);
                }
                buf[..data.len()].copy_from_slice(&data);
                Ok(data.len())
            }
            MockRead::Empty => Ok(0),
            MockRead::Overrun(n) => Ok(n),
            MockRead::Timeout => {
                std::thread::sleep(timeout);
                Err(UsbError::Timeout)
            }
            MockRead::Fail(err) => Err(err),
        }
    }

    fn clear_halt(&self, _handle: &mut Self::Handle, _endpoint: Endpoint) -> Result<(), UsbError> {
        self.state.borrow_mut().stats.clear_halts += 1;
        Ok(())
    }
}
