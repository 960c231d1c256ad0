//! Command channel — one framed request/response exchange at a time.
//!
//! The device multiplexes firmware download, I2C and streaming control
//! over a single pair of bulk endpoints, so every exchange must hold
//! the transport exclusively for exactly one write-then-read pair.
//! Acknowledgement interpretation happens after the lock is released;
//! a malformed response can never wedge a concurrent caller.

use std::sync::Mutex;

use crate::error::{BridgeError, Result};
use crate::protocol::{AckClass, BUF_SIZE, expected_ack};
use crate::transport::BulkTransport;

/// Exclusive owner of the bulk transport.
pub struct CommandChannel<T: BulkTransport> {
    transport: Mutex<T>,
}

impl<T: BulkTransport> CommandChannel<T> {
    pub fn new(transport: T) -> Self {
        CommandChannel {
            transport: Mutex::new(transport),
        }
    }

    /// Send one command frame and read its acknowledgement.
    ///
    /// `wbuf` is `[opcode, payload...]`; `rlen` is the exact expected
    /// response length. Both must fit the device's 64-byte frame bound
    /// or the call fails with `InvalidArgument` before any I/O.
    ///
    /// The response's first byte is validated against the opcode's
    /// expected acknowledgement: a mismatch is `Protocol` for
    /// firmware/stream opcodes and `Io` for I2C opcodes. An opcode the
    /// device does not understand is `InvalidArgument`.
    pub fn send(&self, wbuf: &[u8], rlen: usize) -> Result<Vec<u8>> {
        if wbuf.is_empty() || wbuf.len() > BUF_SIZE {
            return Err(BridgeError::InvalidArgument(format!(
                "frame length {} outside 1..={BUF_SIZE}",
                wbuf.len()
            )));
        }
        if rlen == 0 || rlen > BUF_SIZE {
            return Err(BridgeError::InvalidArgument(format!(
                "response length {rlen} outside 1..={BUF_SIZE}"
            )));
        }

        let rbuf = {
            let mut transport = self
                .transport
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            log::debug!(">>> {wbuf:02x?}");
            transport.bulk_write(wbuf)?;

            let mut rbuf = vec![0u8; rlen];
            let n = transport.bulk_read(&mut rbuf)?;
            log::debug!("<<< {:02x?}", &rbuf[..n]);
            if n < rlen {
                return Err(BridgeError::Io(format!(
                    "bulk read: short response, got {n} bytes, expected {rlen}"
                )));
            }
            rbuf
        };

        let opcode = wbuf[0];
        match expected_ack(opcode) {
            None => Err(BridgeError::InvalidArgument(format!(
                "unknown command 0x{opcode:02x}"
            ))),
            Some((ack, _)) if rbuf[0] == ack => Ok(rbuf),
            Some((ack, class)) => {
                let msg = format!(
                    "command 0x{opcode:02x}: expected ack 0x{ack:02x}, got 0x{:02x}",
                    rbuf[0]
                );
                Err(match class {
                    AckClass::Control => BridgeError::Protocol(msg),
                    AckClass::I2c => BridgeError::Io(msg),
                })
            }
        }
    }

    /// Run a closure against the raw transport, holding the exchange
    /// lock. Used for the non-command transport traffic at attach time
    /// (alternate setting, string descriptor).
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut transport = self
            .transport
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut transport)
    }

    /// Tear down the channel and hand the transport back.
    pub fn into_inner(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::*;
    use crate::transport::mock::MockTransport;

    fn channel_with(responses: &[&[u8]]) -> CommandChannel<MockTransport> {
        let mut t = MockTransport::new();
        for r in responses {
            t.queue_response(r);
        }
        CommandChannel::new(t)
    }

    #[test]
    fn stream_control_success() {
        let ch = channel_with(&[&[ACK_OK]]);
        let resp = ch.send(&STREAM_START, 1).unwrap();
        assert_eq!(resp, [ACK_OK]);
        ch.with_transport(|t| assert_eq!(t.writes, vec![STREAM_START.to_vec()]));
    }

    #[test]
    fn oversize_frame_rejected_before_io() {
        let ch = channel_with(&[]);
        let frame = vec![CMD_STREAM; BUF_SIZE + 1];
        assert!(matches!(
            ch.send(&frame, 1),
            Err(BridgeError::InvalidArgument(_))
        ));
        // no I/O happened
        ch.with_transport(|t| assert!(t.writes.is_empty()));
    }

    #[test]
    fn oversize_response_rejected_before_io() {
        let ch = channel_with(&[]);
        assert!(matches!(
            ch.send(&STREAM_START, BUF_SIZE + 1),
            Err(BridgeError::InvalidArgument(_))
        ));
        ch.with_transport(|t| assert!(t.writes.is_empty()));
    }

    #[test]
    fn empty_frame_rejected() {
        let ch = channel_with(&[]);
        assert!(matches!(
            ch.send(&[], 1),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_opcode_after_exchange() {
        // The device answers, but we cannot interpret the opcode.
        let ch = channel_with(&[&[0x00]]);
        assert!(matches!(
            ch.send(&[0x42, 0x00], 1),
            Err(BridgeError::InvalidArgument(_))
        ));
        // the exchange itself did happen
        ch.with_transport(|t| assert_eq!(t.writes.len(), 1));
    }

    #[test]
    fn control_nak_is_protocol_error() {
        let ch = channel_with(&[&[0x00]]);
        assert!(matches!(
            ch.send(&STREAM_START, 1),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn i2c_write_nak_is_io_error() {
        let ch = channel_with(&[&[0x00]]);
        let frame = i2c_write_frame(0x64, &[0x01]);
        assert!(matches!(ch.send(&frame, 1), Err(BridgeError::Io(_))));
    }

    #[test]
    fn i2c_read_expects_0x55() {
        let ch = channel_with(&[&[ACK_I2C_READ, 0xde, 0xad]]);
        let frame = i2c_read_frame(0x64, 2);
        let resp = ch.send(&frame, 3).unwrap();
        assert_eq!(resp, [ACK_I2C_READ, 0xde, 0xad]);
    }

    #[test]
    fn i2c_read_with_0x88_is_io_error() {
        let ch = channel_with(&[&[ACK_OK, 0x00, 0x00]]);
        let frame = i2c_read_frame(0x64, 2);
        assert!(matches!(ch.send(&frame, 3), Err(BridgeError::Io(_))));
    }

    #[test]
    fn short_response_is_io_error() {
        let ch = channel_with(&[&[ACK_I2C_READ]]);
        let frame = i2c_read_frame(0x64, 4);
        assert!(matches!(ch.send(&frame, 5), Err(BridgeError::Io(_))));
    }

    #[test]
    fn write_failure_propagates() {
        let mut t = MockTransport::new();
        t.fail_write_at = Some(0);
        let ch = CommandChannel::new(t);
        assert!(matches!(
            ch.send(&STREAM_START, 1),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn channel_usable_after_failure() {
        // A failed exchange must not poison the lock for later calls.
        let ch = channel_with(&[&[0x00], &[ACK_OK]]);
        assert!(ch.send(&STREAM_START, 1).is_err());
        assert!(ch.send(&STREAM_START, 1).is_ok());
    }

    #[test]
    fn max_size_frame_accepted() {
        let ch = channel_with(&[&[ACK_OK]]);
        let mut frame = vec![0u8; BUF_SIZE];
        frame[0] = CMD_FW_BLOCK2;
        assert!(ch.send(&frame, 1).is_ok());
    }
}
