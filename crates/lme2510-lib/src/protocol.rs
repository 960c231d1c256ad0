//! Protocol constants for the LME2510C bulk command channel.
//!
//! All values decoded from the vendor firmware protocol. The device
//! exposes a single request/response command pipe over two bulk
//! endpoints; every exchange is one outbound frame `[opcode, ...]`
//! answered by an acknowledgement whose first byte depends on the
//! opcode class.
//!
//! ## Known caveat
//!
//! `STREAM_STOP` (`0x06 0x01`) is a best-known value, not a documented
//! protocol constant — captures confirm `0x06 0x00` re-arms streaming
//! after lock, but the stop payload has only been validated by
//! observing that I2C traffic succeeds after sending it.

// ── USB identity ──

/// Leaguer MicroElectronics vendor ID.
pub const LME_VID: u16 = 0x3344;

/// LME2510C product ID (Sin Hon TDH601).
pub const LME_PID: u16 = 0x24a0;

/// Bulk OUT endpoint carrying command frames.
pub const EP_CMD_OUT: u8 = 0x01;

/// Bulk IN endpoint carrying command responses.
pub const EP_CMD_IN: u8 = 0x81;

/// Bulk IN endpoint carrying the MPEG-TS stream. Recorded for
/// completeness; this crate never reads it.
pub const EP_TS_STREAM: u8 = 0x88;

/// Timeout per bulk transfer direction in milliseconds.
pub const BULK_TIMEOUT_MS: u64 = 500;

// ── Command opcodes ──

/// Download firmware block1 chunk (more chunks follow).
pub const CMD_FW_BLOCK1: u8 = 0x01;

/// Download firmware block1 final chunk.
pub const CMD_FW_BLOCK1_LAST: u8 = 0x81;

/// Download firmware block2 chunk (more chunks follow).
pub const CMD_FW_BLOCK2: u8 = 0x02;

/// Download firmware block2 final chunk.
pub const CMD_FW_BLOCK2_LAST: u8 = 0x82;

/// Reboot into the freshly downloaded firmware. The device drops off
/// the bus and re-enumerates warm.
pub const CMD_FW_REBOOT: u8 = 0x8a;

/// Streaming control. Payload byte 0x00 starts the TS stream,
/// 0x01 stops it (see module caveat).
pub const CMD_STREAM: u8 = 0x06;

/// I2C write: `[0x04, 1+len, addr<<1, data...]`.
pub const CMD_I2C_WRITE: u8 = 0x04;

/// I2C read: `[0x86, 1+len, addr<<1, len]`.
pub const CMD_I2C_READ: u8 = 0x86;

// ── Acknowledgement markers ──

/// First response byte on success for control/firmware/stream opcodes
/// and I2C writes.
pub const ACK_OK: u8 = 0x88;

/// First response byte on a successful I2C read.
pub const ACK_I2C_READ: u8 = 0x55;

// ── Frame geometry ──

/// Command frame size bound, both directions.
pub const BUF_SIZE: usize = 64;

/// Maximum I2C data region per transaction.
pub const MAX_I2C_LEN: usize = 24;

/// Maximum firmware chunk payload: 64-byte frame minus opcode,
/// length byte and checksum byte.
pub const MAX_FW_CHUNK: usize = BUF_SIZE - 3;

/// Firmware block1 (USB descriptors) size. Images must be strictly
/// larger than this; everything past it is block2.
pub const FW_HEADER_SIZE: usize = 512;

// ── Fixed frames ──

/// Start streaming after demodulator lock.
pub const STREAM_START: [u8; 2] = [CMD_STREAM, 0x00];

/// Stop streaming before issuing I2C while locked (see module caveat).
pub const STREAM_STOP: [u8; 2] = [CMD_STREAM, 0x01];

/// Reboot frame ending a firmware download.
pub const FW_REBOOT: [u8; 2] = [CMD_FW_REBOOT, 0x00];

// ── Identification ──

/// String descriptor index probed by cold/warm detection.
pub const IDENT_DESCRIPTOR_INDEX: u8 = 0x02;

/// Bytes 2..6 of the string descriptor on a factory-cold device.
pub const COLD_MARKER: [u8; 4] = [0x44, 0x45, 0x46, 0x47];

/// Canonical firmware image filename.
pub const FIRMWARE_NAME: &str = "dvb-usb-lme2510c-0.fw";

// ── Attached chips ──

/// Si2168 demodulator I2C address.
pub const DEMOD_I2C_ADDR: u8 = 0x64;

/// Si2157 tuner I2C address.
pub const TUNER_I2C_ADDR: u8 = 0x60;

// ── Opcode classification ──

/// Failure class when an opcode's acknowledgement byte mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckClass {
    /// Firmware/stream control — mismatch is a protocol error.
    Control,
    /// I2C transfer — mismatch is an I/O error (bus-level NAK).
    I2c,
}

/// Map an opcode to its expected acknowledgement byte and failure
/// class. Returns `None` for opcodes the device does not understand.
pub fn expected_ack(opcode: u8) -> Option<(u8, AckClass)> {
    match opcode {
        CMD_FW_BLOCK1 | CMD_FW_BLOCK1_LAST | CMD_FW_BLOCK2 | CMD_FW_BLOCK2_LAST
        | CMD_FW_REBOOT | CMD_STREAM => Some((ACK_OK, AckClass::Control)),
        CMD_I2C_WRITE => Some((ACK_OK, AckClass::I2c)),
        CMD_I2C_READ => Some((ACK_I2C_READ, AckClass::I2c)),
        _ => None,
    }
}

// ── Frame builders ──

/// 8-bit wraparound sum of a firmware chunk's payload bytes.
pub fn checksum(chunk: &[u8]) -> u8 {
    chunk.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Build an I2C write frame: `[0x04, 1+len, addr<<1, data...]`.
///
/// Caller must have bounds-checked `data.len() <= MAX_I2C_LEN`.
pub fn i2c_write_frame(addr: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(3 + data.len());
    frame.push(CMD_I2C_WRITE);
    frame.push(1 + data.len() as u8);
    frame.push(addr << 1);
    frame.extend_from_slice(data);
    frame
}

/// Build an I2C read frame: `[0x86, 1+len, addr<<1, len]`.
///
/// Caller must have bounds-checked `len <= MAX_I2C_LEN`.
pub fn i2c_read_frame(addr: u8, len: usize) -> Vec<u8> {
    vec![CMD_I2C_READ, 1 + len as u8, addr << 1, len as u8]
}

/// Build one firmware chunk frame: `[opcode, len-1, bytes..., checksum]`.
///
/// Caller must have bounds-checked `1 <= bytes.len() <= MAX_FW_CHUNK`.
pub fn fw_chunk_frame(opcode: u8, bytes: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(3 + bytes.len());
    frame.push(opcode);
    frame.push((bytes.len() - 1) as u8);
    frame.extend_from_slice(bytes);
    frame.push(checksum(bytes));
    frame
}
