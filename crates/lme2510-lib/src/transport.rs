//! USB bulk transport — trait, rusb backend, device discovery.

use std::time::Duration;

use rusb::{Device, DeviceHandle, GlobalContext};
use serde::Serialize;

use crate::error::{BridgeError, Result};
use crate::protocol::{BULK_TIMEOUT_MS, EP_CMD_IN, EP_CMD_OUT, LME_PID, LME_VID};

// ── Trait ──

/// The bulk boundary the command channel and identification run over.
///
/// One implementation talks to real hardware ([`UsbTransport`]); the
/// in-memory [`mock::MockTransport`] backs the test suite.
pub trait BulkTransport {
    /// Write one command frame to the bulk OUT endpoint.
    fn bulk_write(&mut self, buf: &[u8]) -> Result<usize>;
    /// Read one response frame from the bulk IN endpoint into `buf`.
    fn bulk_read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Switch the alternate setting of an interface.
    fn set_alt_setting(&mut self, iface: u8, alt: u8) -> Result<()>;
    /// Read up to `len` bytes of a raw USB string descriptor.
    fn string_descriptor(&mut self, index: u8, len: usize) -> Result<Vec<u8>>;
}

// ── Device discovery ──

/// A discovered LME2510C device (not yet opened).
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    /// Bus position, e.g. `usb:001/004`.
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    /// USB serial number, if the descriptor carries one.
    pub serial: Option<String>,
}

/// Enumerate all attached LME2510C devices without opening them.
pub fn list_devices() -> Result<Vec<DiscoveredDevice>> {
    let devices = rusb::devices()
        .map_err(|e| BridgeError::OpenFailed(format!("USB enumeration: {e}")))?;

    let mut found = Vec::new();
    for device in devices.iter() {
        let Ok(desc) = device.device_descriptor() else {
            continue;
        };
        if desc.vendor_id() != LME_VID || desc.product_id() != LME_PID {
            continue;
        }
        // Serial requires opening the device; unreadable is not fatal.
        let serial = device
            .open()
            .ok()
            .and_then(|h| h.read_serial_number_string_ascii(&desc).ok());
        found.push(DiscoveredDevice {
            path: format!("usb:{:03}/{:03}", device.bus_number(), device.address()),
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            serial,
        });
    }
    Ok(found)
}

// ── rusb implementation ──

/// Blocking rusb transport over the LME2510C command endpoints.
pub struct UsbTransport {
    handle: DeviceHandle<GlobalContext>,
    timeout: Duration,
}

impl UsbTransport {
    /// Open the first attached LME2510C.
    pub fn open() -> Result<Self> {
        let devices = rusb::devices()
            .map_err(|e| BridgeError::OpenFailed(format!("USB enumeration: {e}")))?;

        for device in devices.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            if desc.vendor_id() == LME_VID && desc.product_id() == LME_PID {
                return Self::open_device(&device);
            }
        }
        Err(BridgeError::NotFound)
    }

    fn open_device(device: &Device<GlobalContext>) -> Result<Self> {
        let mut handle = device
            .open()
            .map_err(|e| BridgeError::OpenFailed(format!("USB open: {e}")))?;

        #[cfg(target_os = "linux")]
        {
            if handle.kernel_driver_active(0).unwrap_or(false) {
                log::debug!("detaching kernel driver from interface 0");
                if let Err(e) = handle.detach_kernel_driver(0) {
                    log::warn!("could not detach kernel driver: {e}");
                }
            }
        }

        handle
            .claim_interface(0)
            .map_err(|e| BridgeError::OpenFailed(format!("claim interface 0: {e}")))?;

        Ok(UsbTransport {
            handle,
            timeout: Duration::from_millis(BULK_TIMEOUT_MS),
        })
    }
}

impl BulkTransport for UsbTransport {
    fn bulk_write(&mut self, buf: &[u8]) -> Result<usize> {
        self.handle
            .write_bulk(EP_CMD_OUT, buf, self.timeout)
            .map_err(|e| BridgeError::Io(format!("bulk write: {e}")))
    }

    fn bulk_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.handle
            .read_bulk(EP_CMD_IN, buf, self.timeout)
            .map_err(|e| BridgeError::Io(format!("bulk read: {e}")))
    }

    fn set_alt_setting(&mut self, iface: u8, alt: u8) -> Result<()> {
        self.handle
            .set_alternate_setting(iface, alt)
            .map_err(|e| BridgeError::Io(format!("set alt setting {iface}/{alt}: {e}")))
    }

    fn string_descriptor(&mut self, index: u8, len: usize) -> Result<Vec<u8>> {
        use rusb::constants::{LIBUSB_DT_STRING, LIBUSB_REQUEST_GET_DESCRIPTOR};

        let mut buf = vec![0u8; len];
        let request_type = rusb::request_type(
            rusb::Direction::In,
            rusb::RequestType::Standard,
            rusb::Recipient::Device,
        );
        let n = self
            .handle
            .read_control(
                request_type,
                LIBUSB_REQUEST_GET_DESCRIPTOR,
                ((LIBUSB_DT_STRING as u16) << 8) | index as u16,
                0,
                &mut buf,
                self.timeout,
            )
            .map_err(|e| BridgeError::Io(format!("string descriptor {index}: {e}")))?;
        buf.truncate(n);
        Ok(buf)
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(0) {
            log::debug!("could not release interface 0: {e}");
        }
    }
}

// ── Mock transport for testing ──

/// In-memory transport for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use std::collections::{HashMap, VecDeque};

    use super::*;

    /// Records every outbound frame and pops scripted responses.
    #[derive(Default)]
    pub struct MockTransport {
        /// Every frame handed to `bulk_write`, in order.
        pub writes: Vec<Vec<u8>>,
        /// Scripted responses, consumed front-first by `bulk_read`.
        pub reads: VecDeque<Vec<u8>>,
        /// String descriptor store: index → bytes.
        pub descriptors: HashMap<u8, Vec<u8>>,
        /// Recorded `(iface, alt)` pairs.
        pub alt_settings: Vec<(u8, u8)>,
        /// If set, the write at this index (0-based) fails.
        pub fail_write_at: Option<usize>,
        /// If true, every `bulk_read` fails.
        pub fail_read: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue one scripted response frame.
        pub fn queue_response(&mut self, frame: &[u8]) {
            self.reads.push_back(frame.to_vec());
        }

        /// Queue `n` copies of the same response frame.
        pub fn queue_responses(&mut self, frame: &[u8], n: usize) {
            for _ in 0..n {
                self.queue_response(frame);
            }
        }
    }

    impl BulkTransport for MockTransport {
        fn bulk_write(&mut self, buf: &[u8]) -> Result<usize> {
            if self.fail_write_at == Some(self.writes.len()) {
                return Err(BridgeError::Io("bulk write: mock failure injected".into()));
            }
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn bulk_read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.fail_read {
                return Err(BridgeError::Io("bulk read: mock failure injected".into()));
            }
            let frame = self
                .reads
                .pop_front()
                .ok_or_else(|| BridgeError::Io("bulk read: no scripted response".into()))?;
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
            Ok(n)
        }

        fn set_alt_setting(&mut self, iface: u8, alt: u8) -> Result<()> {
            self.alt_settings.push((iface, alt));
            Ok(())
        }

        fn string_descriptor(&mut self, index: u8, len: usize) -> Result<Vec<u8>> {
            let bytes = self
                .descriptors
                .get(&index)
                .ok_or_else(|| BridgeError::Io(format!("string descriptor {index}: stall")))?;
            Ok(bytes[..bytes.len().min(len)].to_vec())
        }
    }
}
