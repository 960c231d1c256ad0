//! Device session — the long-lived per-device handle.
//!
//! Owns the command channel and the lock-state cache, and exposes the
//! three protocols built on the channel as methods. One session per
//! physical device; callers must serialize logical I2C and status
//! operations themselves (see [`crate::status::StatusCache`]).

use crate::channel::CommandChannel;
use crate::error::Result;
use crate::firmware::{self, FirmwareImage, Reconnect};
use crate::i2c::{self, I2cMessage};
use crate::status::{FrontendStatus, StatusCache, StatusProvider};
use crate::transport::{BulkTransport, UsbTransport};

/// A session with one LME2510C device.
pub struct Lme2510<T: BulkTransport> {
    channel: CommandChannel<T>,
    status: StatusCache,
}

impl Lme2510<UsbTransport> {
    /// Open the first attached device.
    pub fn open() -> Result<Self> {
        Ok(Self::new(UsbTransport::open()?))
    }
}

impl<T: BulkTransport> Lme2510<T> {
    pub fn new(transport: T) -> Self {
        Lme2510 {
            channel: CommandChannel::new(transport),
            status: StatusCache::new(),
        }
    }

    /// The underlying command channel, for raw exchanges.
    pub fn channel(&self) -> &CommandChannel<T> {
        &self.channel
    }

    /// Send a raw command frame (escape hatch; the opcode must still
    /// be one the channel can validate).
    pub fn send_command(&self, wbuf: &[u8], rlen: usize) -> Result<Vec<u8>> {
        self.channel.send(wbuf, rlen)
    }

    /// Download a firmware image and reboot. The device re-enumerates;
    /// drop this session and reopen.
    pub fn download_firmware(&self, image: &FirmwareImage) -> Result<Reconnect> {
        firmware::download(&self.channel, image)
    }

    /// Execute one I2C transaction, applying the stop-on-I2C quirk
    /// mitigation while the frontend is locked.
    pub fn i2c_transfer(&self, msgs: &mut [I2cMessage<'_>]) -> Result<usize> {
        i2c::transfer(&self.channel, &self.status, msgs)
    }

    /// Cached frontend status; wraps the injected native query.
    pub fn read_status<P: StatusProvider + ?Sized>(
        &self,
        provider: &mut P,
    ) -> Result<FrontendStatus> {
        self.status.query(&self.channel, provider)
    }

    /// External streaming control hook. The hardware needs no frame
    /// here; the cache is invalidated so the next status poll
    /// re-queries the demodulator and re-arms streaming on lock.
    pub fn streaming_ctrl(&self, onoff: bool) {
        log::debug!("streaming_ctrl onoff={onoff}");
        self.status.reset();
    }

    /// Tear the session down and recover the transport.
    pub fn into_transport(self) -> T {
        self.channel.into_inner()
    }
}
