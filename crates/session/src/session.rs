//! Device session
//!
//! A [`Session`] owns one open device handle and at most one claimed
//! interface. It moves through `Unopened -> Opened -> Claimed -> Opened ->
//! Closed`; `Closed` is terminal and every later operation fails with
//! [`SessionError::UseAfterClose`].
//!
//! Closing releases the claimed interface, reattaches any kernel driver the
//! session detached, and closes the handle. It runs exactly once per open,
//! either explicitly through [`Session::close`] or when the session is dropped,
//! so every exit path (early return, `?`, panic unwinding) cleans up.

use crate::error::{DescriptorError, SessionError};
use crate::selector::Candidate;
use crate::transport::Transport;
use std::time::Duration;
use tracing::{debug, warn};
use types::{DeviceDescriptor, DevicePath, Endpoint};

/// Timeout for string descriptor control requests
pub const STRING_DESCRIPTOR_TIMEOUT: Duration = Duration::from_secs(1);

/// Observable lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Opened,
    /// Holds the claimed interface number
    Claimed(u8),
    Closed,
}

/// Open a session on `candidate`
///
/// On failure no session is left behind and nothing needs closing.
pub fn open<'t, T: Transport>(
    transport: &'t T,
    candidate: &Candidate<T::Device>,
) -> Result<Session<'t, T>, SessionError> {
    let mut session = Session::new(transport);
    session.open(candidate)?;
    Ok(session)
}

/// Exclusive session on one USB device
pub struct Session<'t, T: Transport> {
    transport: &'t T,
    /// Present only while Opened or Claimed
    handle: Option<T::Handle>,
    /// Present only while Claimed
    claimed: Option<u8>,
    /// Interface whose kernel driver we detached and must hand back
    detached: Option<u8>,
    descriptor: Option<DeviceDescriptor>,
    path: DevicePath,
    closed: bool,
}

impl<'t, T: Transport> Session<'t, T> {
    /// Create an unopened session
    pub fn new(transport: &'t T) -> Self {
        Self {
            transport,
            handle: None,
            claimed: None,
            detached: None,
            descriptor: None,
            path: DevicePath::root(),
            closed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            return SessionState::Closed;
        }
        match (&self.handle, self.claimed) {
            (None, _) => SessionState::Unopened,
            (Some(_), None) => SessionState::Opened,
            (Some(_), Some(interface)) => SessionState::Claimed(interface),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Opened | SessionState::Claimed(_)
        )
    }

    /// Descriptor of the opened device
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Port path of the opened device
    pub fn path(&self) -> &DevicePath {
        &self.path
    }

    pub fn claimed_interface(&self) -> Option<u8> {
        self.claimed
    }

    /// Acquire the transport handle for `candidate`
    pub fn open(&mut self, candidate: &Candidate<T::Device>) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::UseAfterClose { operation: "open" });
        }
        if let Some(current) = &self.descriptor {
            return Err(SessionError::AlreadyOpen {
                vendor_id: current.vendor_id,
                product_id: current.product_id,
            });
        }

        let desc = candidate.descriptor();
        let handle = self.transport.open(candidate.device()).map_err(|source| {
            warn!(
                "Failed to open device {:04x}:{:04x}: {}",
                desc.vendor_id, desc.product_id, source
            );
            SessionError::Open {
                vendor_id: desc.vendor_id,
                product_id: desc.product_id,
                bus_number: desc.bus_number,
                address: desc.address,
                source,
            }
        })?;

        debug!(
            "Opened device {:04x}:{:04x} (bus {}, device {})",
            desc.vendor_id, desc.product_id, desc.bus_number, desc.address
        );

        self.handle = Some(handle);
        self.descriptor = Some(desc.clone());
        self.path = candidate.path().clone();
        Ok(())
    }

    /// Detach a kernel driver bound to `interface`
    ///
    /// Returns whether a driver was detached. Many platforms never bind one,
    /// and some cannot detach at all; an unsupported query is reported as "no
    /// driver". Callers treat failure as non-fatal.
    pub fn detach_kernel_driver(&mut self, interface: u8) -> Result<bool, SessionError> {
        let (transport, handle) = self.handle_mut("detach kernel driver")?;

        match transport.kernel_driver_active(handle, interface) {
            Ok(false) => {
                debug!("No kernel driver active on interface {}", interface);
                return Ok(false);
            }
            Ok(true) => {}
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                );
                return Ok(false);
            }
        }

        transport
            .detach_kernel_driver(handle, interface)
            .map_err(|source| SessionError::Detach { interface, source })?;

        debug!("Detached kernel driver from interface {}", interface);
        self.detached = Some(interface);
        Ok(true)
    }

    /// Claim `interface` for exclusive use
    ///
    /// Only one interface may be claimed at a time.
    pub fn claim(&mut self, interface: u8) -> Result<(), SessionError> {
        if let Some(current) = self.claimed {
            return Err(SessionError::AlreadyClaimed { interface: current });
        }

        let (transport, handle) = self.handle_mut("claim interface")?;
        transport
            .claim_interface(handle, interface)
            .map_err(|source| {
                warn!("Failed to claim interface {}: {}", interface, source);
                SessionError::Claim { interface, source }
            })?;

        debug!("Claimed interface {}", interface);
        self.claimed = Some(interface);
        Ok(())
    }

    /// Best-effort kernel driver detach followed by a claim
    ///
    /// A failed detach is logged and the claim is still attempted.
    pub fn claim_detaching(&mut self, interface: u8) -> Result<(), SessionError> {
        if let Err(e) = self.detach_kernel_driver(interface) {
            match e {
                SessionError::UseBeforeOpen { .. } | SessionError::UseAfterClose { .. } => {
                    return Err(e);
                }
                _ => warn!("{} (continuing)", e),
            }
        }
        self.claim(interface)
    }

    /// Release the claimed interface; a no-op when nothing is claimed
    ///
    /// The claim is dropped even if the transport reports a failure, so a
    /// later close does not release it a second time.
    pub fn release(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::UseAfterClose {
                operation: "release interface",
            });
        }
        let Some(interface) = self.claimed.take() else {
            return Ok(());
        };
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };

        self.transport
            .release_interface(handle, interface)
            .map_err(|source| SessionError::Release { interface, source })?;

        debug!("Released interface {}", interface);
        Ok(())
    }

    /// Resolve a string descriptor index to text
    ///
    /// Index 0 means "no string"; callers check for it before calling.
    pub fn get_string_descriptor(&self, index: u8) -> Result<String, DescriptorError> {
        if self.closed {
            return Err(SessionError::UseAfterClose {
                operation: "read string descriptor",
            }
            .into());
        }
        let handle = self.handle.as_ref().ok_or(SessionError::UseBeforeOpen {
            operation: "read string descriptor",
        })?;
        if index == 0 {
            return Err(DescriptorError::NoString);
        }

        self.transport
            .read_string_descriptor(handle, index, STRING_DESCRIPTOR_TIMEOUT)
            .map_err(|source| DescriptorError::Read { index, source })
    }

    /// Clear a stall condition on `endpoint`
    pub fn clear_halt(&mut self, endpoint: Endpoint) -> Result<(), SessionError> {
        let (transport, handle) = self.handle_mut("clear halt")?;
        transport
            .clear_halt(handle, endpoint)
            .map_err(|source| SessionError::ClearHalt { endpoint, source })?;

        debug!("Cleared halt on endpoint {}", endpoint);
        Ok(())
    }

    /// Release, reattach and close; safe to call in any state, any number of times
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let Some(mut handle) = self.handle.take() else {
            debug!("Closed unopened session");
            return;
        };

        if let Some(interface) = self.claimed.take() {
            if let Err(e) = self.transport.release_interface(&mut handle, interface) {
                warn!("Failed to release interface {}: {}", interface, e);
            } else {
                debug!("Released interface {}", interface);
            }
        }

        if let Some(interface) = self.detached.take() {
            if let Err(e) = self.transport.attach_kernel_driver(&mut handle, interface) {
                debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    interface, e
                );
            } else {
                debug!("Reattached kernel driver to interface {}", interface);
            }
        }

        self.transport.close(handle);

        if let Some(desc) = &self.descriptor {
            debug!(
                "Closed device {:04x}:{:04x}",
                desc.vendor_id, desc.product_id
            );
        }
    }

    /// Transport and handle for an open session
    pub(crate) fn handle_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<(&'t T, &mut T::Handle), SessionError> {
        if self.closed {
            return Err(SessionError::UseAfterClose { operation });
        }
        let transport = self.transport;
        let handle = self
            .handle
            .as_mut()
            .ok_or(SessionError::UseBeforeOpen { operation })?;
        Ok((transport, handle))
    }
}

impl<T: Transport> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::enumerate;
    use crate::test_utils::{MockDevice, MockTransport};
    use types::UsbError;

    #[test]
    fn test_new_session_is_unopened() {
        let transport = MockTransport::new(vec![]);
        let session = Session::new(&transport);
        assert_eq!(session.state(), SessionState::Unopened);
        assert!(!session.is_open());
        assert!(session.descriptor().is_none());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let transport = MockTransport::new(vec![MockDevice::new(0x04d8, 0x003f)]);
        let devices = enumerate(&transport).unwrap();
        let candidate = devices.find_by_id(0x04d8, 0x003f).unwrap();

        let mut session = open(&transport, candidate).unwrap();
        assert_eq!(session.state(), SessionState::Opened);

        session.claim(0).unwrap();
        assert_eq!(session.state(), SessionState::Claimed(0));
        assert_eq!(session.claimed_interface(), Some(0));

        session.release().unwrap();
        assert_eq!(session.state(), SessionState::Opened);

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_second_claim_rejected() {
        let transport = MockTransport::new(vec![MockDevice::new(0x04d8, 0x003f)]);
        let devices = enumerate(&transport).unwrap();
        let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();

        session.claim(0).unwrap();
        assert_eq!(
            session.claim(1),
            Err(SessionError::AlreadyClaimed { interface: 0 })
        );
    }

    #[test]
    fn test_release_failure_drops_claim() {
        let transport = MockTransport::new(vec![
            MockDevice::new(0x04d8, 0x003f).failing_release(UsbError::NoDevice),
        ]);
        let devices = enumerate(&transport).unwrap();
        let mut session = open(&transport, devices.iter().next().unwrap()).unwrap();
        session.claim(0).unwrap();

        assert!(matches!(
            session.release(),
            Err(SessionError::Release { interface: 0, .. })
        ));
        assert_eq!(session.state(), SessionState::Opened);

        session.close();
        assert_eq!(transport.stats().releases, 1);
    }

    #[test]
    fn test_string_descriptor_index_zero() {
        let transport = MockTransport::new(vec![MockDevice::new(0x04d8, 0x003f)]);
        let devices = enumerate(&transport).unwrap();
        let session = open(&transport, devices.iter().next().unwrap()).unwrap();

        assert_eq!(
            session.get_string_descriptor(0),
            Err(DescriptorError::NoString)
        );
    }
}
