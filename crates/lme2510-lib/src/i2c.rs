//! I2C-over-USB bridge.
//!
//! The demodulator and tuner drivers speak generic single-message I2C;
//! this module maps each message onto one command frame. The chip has
//! a hardware quirk: any I2C command silently halts active streaming,
//! so while the cached lock state says streaming is live, every
//! transaction is preceded by an explicit stream-stop frame and a
//! short settle delay.

use std::time::Duration;

use crate::channel::CommandChannel;
use crate::error::{BridgeError, Result};
use crate::protocol::{MAX_I2C_LEN, STREAM_STOP, i2c_read_frame, i2c_write_frame};
use crate::status::StatusCache;
use crate::transport::BulkTransport;

/// Settle delay after the quirk-mitigation stop frame.
const STOP_SETTLE: Duration = Duration::from_millis(1);

/// One logical I2C operation against a 7-bit address.
#[derive(Debug)]
pub enum I2cMessage<'a> {
    Write { addr: u8, data: &'a [u8] },
    Read { addr: u8, buf: &'a mut [u8] },
}

/// The bridge's capability surface: basic single-message I2C, no
/// multi-message batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cFunctionality {
    Basic,
}

/// Capability flag consumed by attaching chip drivers.
pub fn functionality() -> I2cFunctionality {
    I2cFunctionality::Basic
}

/// Execute one I2C transaction, returning the number of messages
/// completed (always 1 on success).
///
/// Exactly one message per call; batches fail with `Unsupported` and
/// are never partially executed. Data regions are bounded at 24 bytes.
pub fn transfer<T: BulkTransport>(
    channel: &CommandChannel<T>,
    cache: &StatusCache,
    msgs: &mut [I2cMessage<'_>],
) -> Result<usize> {
    if msgs.len() != 1 {
        return Err(BridgeError::Unsupported(format!(
            "I2C transaction with {} messages, only single-message transfers",
            msgs.len()
        )));
    }
    let msg = &mut msgs[0];

    if cache.is_locked() {
        // I2C is not allowed while streaming; stop first, every time.
        channel.send(&STREAM_STOP, 1)?;
        std::thread::sleep(STOP_SETTLE);
    }

    match msg {
        I2cMessage::Write { addr, data } => {
            if data.len() > MAX_I2C_LEN {
                return Err(BridgeError::Unsupported(format!(
                    "I2C write of {} bytes, limit is {MAX_I2C_LEN}",
                    data.len()
                )));
            }
            channel.send(&i2c_write_frame(*addr, data), 1)?;
        }
        I2cMessage::Read { addr, buf } => {
            if buf.len() > MAX_I2C_LEN {
                return Err(BridgeError::Unsupported(format!(
                    "I2C read of {} bytes, limit is {MAX_I2C_LEN}",
                    buf.len()
                )));
            }
            let resp = channel.send(&i2c_read_frame(*addr, buf.len()), 1 + buf.len())?;
            buf.copy_from_slice(&resp[1..1 + buf.len()]);
        }
    }
    Ok(1)
}
