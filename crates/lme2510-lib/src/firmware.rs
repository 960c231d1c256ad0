//! Two-phase firmware download.
//!
//! A cold device boots from an image split into two regions: block1
//! (the first 512 bytes, USB descriptor material) and block2 (the
//! remainder, firmware proper). Each region goes down as a sequence of
//! checksummed chunks with its own continue/final opcode pair; the
//! final frame reboots the device, which then drops off the bus and
//! re-enumerates warm.

use std::path::Path;

use crate::channel::CommandChannel;
use crate::error::{BridgeError, Result};
use crate::protocol::{
    CMD_FW_BLOCK1, CMD_FW_BLOCK1_LAST, CMD_FW_BLOCK2, CMD_FW_BLOCK2_LAST, FW_HEADER_SIZE,
    FW_REBOOT, MAX_FW_CHUNK, fw_chunk_frame,
};
use crate::transport::BulkTransport;

/// Marker result of a completed download: the device is rebooting and
/// will re-enumerate. The caller must reopen it, not keep using this
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconnect;

/// A validated firmware image.
///
/// Invariant: strictly larger than 512 bytes, so both blocks are
/// non-empty.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() <= FW_HEADER_SIZE {
            return Err(BridgeError::InvalidFirmware(format!(
                "image is {} bytes, need more than {FW_HEADER_SIZE}",
                data.len()
            )));
        }
        Ok(FirmwareImage { data })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| BridgeError::InvalidFirmware(format!("{}: {e}", path.display())))?;
        Self::new(data)
    }

    /// Block1: USB descriptor region.
    pub fn header(&self) -> &[u8] {
        &self.data[..FW_HEADER_SIZE]
    }

    /// Block2: firmware proper.
    pub fn payload(&self) -> &[u8] {
        &self.data[FW_HEADER_SIZE..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the size invariant forbids empty images
    }
}

/// Download both blocks and reboot the device.
///
/// Every chunk is an independent channel exchange; the first failure
/// aborts the whole download with no retry — the caller restarts from
/// scratch. On success the device is already rebooting.
pub fn download<T: BulkTransport>(
    channel: &CommandChannel<T>,
    image: &FirmwareImage,
) -> Result<Reconnect> {
    send_block(channel, image.header(), CMD_FW_BLOCK1, CMD_FW_BLOCK1_LAST)?;
    send_block(channel, image.payload(), CMD_FW_BLOCK2, CMD_FW_BLOCK2_LAST)?;

    log::debug!("rebooting into downloaded firmware");
    channel.send(&FW_REBOOT, 1)?;
    Ok(Reconnect)
}

fn send_block<T: BulkTransport>(
    channel: &CommandChannel<T>,
    block: &[u8],
    continue_op: u8,
    final_op: u8,
) -> Result<()> {
    let mut rem = block;
    while !rem.is_empty() {
        let len = rem.len().min(MAX_FW_CHUNK);
        let opcode = if rem.len() <= MAX_FW_CHUNK {
            final_op
        } else {
            continue_op
        };
        let frame = fw_chunk_frame(opcode, &rem[..len]);
        channel.send(&frame, 1)?;
        rem = &rem[len..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ACK_OK, checksum};
    use crate::transport::mock::MockTransport;

    fn image_of(len: usize) -> FirmwareImage {
        FirmwareImage::new((0..len).map(|i| i as u8).collect()).unwrap()
    }

    fn ready_channel(acks: usize) -> CommandChannel<MockTransport> {
        let mut t = MockTransport::new();
        t.queue_responses(&[ACK_OK], acks);
        CommandChannel::new(t)
    }

    #[test]
    fn rejects_image_at_exactly_512() {
        assert!(matches!(
            FirmwareImage::new(vec![0; 512]),
            Err(BridgeError::InvalidFirmware(_))
        ));
    }

    #[test]
    fn rejects_empty_image() {
        assert!(FirmwareImage::new(vec![]).is_err());
    }

    #[test]
    fn accepts_513_byte_image() {
        let image = image_of(513);
        assert_eq!(image.header().len(), 512);
        assert_eq!(image.payload().len(), 1);
    }

    #[test]
    fn minimal_image_one_final_chunk_per_block() {
        // 512 + 1: block1 is ceil(512/61) = 9 chunks, block2 is one
        // single-byte final chunk.
        let image = image_of(513);
        let ch = ready_channel(9 + 1 + 1);
        assert_eq!(download(&ch, &image).unwrap(), Reconnect);

        ch.with_transport(|t| {
            assert_eq!(t.writes.len(), 11);
            // first 8 block1 chunks are "continue", 9th is final
            for w in &t.writes[..8] {
                assert_eq!(w[0], CMD_FW_BLOCK1);
                assert_eq!(w[1], (MAX_FW_CHUNK - 1) as u8);
            }
            assert_eq!(t.writes[8][0], CMD_FW_BLOCK1_LAST);
            // 512 - 8 * 61 = 24 bytes in the last block1 chunk
            assert_eq!(t.writes[8][1], 23);
            // block2: one final single-byte chunk
            let b2 = &t.writes[9];
            assert_eq!(b2[0], CMD_FW_BLOCK2_LAST);
            assert_eq!(b2[1], 0);
            assert_eq!(b2.len(), 4); // op + len + 1 byte + checksum
            // reboot frame last
            assert_eq!(t.writes[10], FW_REBOOT.to_vec());
        });
    }

    #[test]
    fn chunk_frames_carry_checksums() {
        let image = image_of(600);
        let ch = ready_channel(64);
        download(&ch, &image).unwrap();

        ch.with_transport(|t| {
            for w in t.writes.iter().filter(|w| w[0] != FW_REBOOT[0]) {
                let payload = &w[2..w.len() - 1];
                assert_eq!(*w.last().unwrap(), checksum(payload));
                assert_eq!(w[1] as usize, payload.len() - 1);
            }
        });
    }

    #[test]
    fn kilobyte_image_chunk_count() {
        // 1024 bytes: 9 header chunks + 9 payload chunks + reboot.
        let image = image_of(1024);
        let ch = ready_channel(19);
        download(&ch, &image).unwrap();

        ch.with_transport(|t| {
            assert_eq!(t.writes.len(), 19);
            let b1: Vec<_> = t.writes.iter().filter(|w| w[0] == CMD_FW_BLOCK1).collect();
            let b1_last: Vec<_> = t
                .writes
                .iter()
                .filter(|w| w[0] == CMD_FW_BLOCK1_LAST)
                .collect();
            let b2: Vec<_> = t.writes.iter().filter(|w| w[0] == CMD_FW_BLOCK2).collect();
            let b2_last: Vec<_> = t
                .writes
                .iter()
                .filter(|w| w[0] == CMD_FW_BLOCK2_LAST)
                .collect();
            assert_eq!((b1.len(), b1_last.len()), (8, 1));
            assert_eq!((b2.len(), b2_last.len()), (8, 1));
        });
    }

    #[test]
    fn chunks_reassemble_to_image() {
        let image = image_of(1000);
        let ch = ready_channel(64);
        download(&ch, &image).unwrap();

        ch.with_transport(|t| {
            let mut rebuilt = Vec::new();
            for w in t.writes.iter().filter(|w| w[0] != FW_REBOOT[0]) {
                rebuilt.extend_from_slice(&w[2..w.len() - 1]);
            }
            assert_eq!(rebuilt.len(), 1000);
            assert_eq!(rebuilt[..512], *image.header());
            assert_eq!(rebuilt[512..], *image.payload());
        });
    }

    #[test]
    fn chunk_failure_aborts_download() {
        let image = image_of(1024);
        let mut t = MockTransport::new();
        t.queue_responses(&[ACK_OK], 19);
        t.fail_write_at = Some(3); // fourth block1 chunk
        let ch = CommandChannel::new(t);

        assert!(matches!(download(&ch, &image), Err(BridgeError::Io(_))));
        // nothing past the failed chunk was attempted
        ch.with_transport(|t| assert_eq!(t.writes.len(), 3));
    }

    #[test]
    fn nak_mid_block_is_protocol_error() {
        let image = image_of(600);
        let mut t = MockTransport::new();
        t.queue_responses(&[ACK_OK], 5);
        t.queue_response(&[0x00]); // device NAKs the sixth chunk
        let ch = CommandChannel::new(t);
        assert!(matches!(
            download(&ch, &image),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn from_file_missing_path() {
        let err = FirmwareImage::from_file("/nonexistent/dvb-usb-lme2510c-0.fw").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidFirmware(_)));
    }
}
