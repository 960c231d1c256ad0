//! Cold/warm detection at attach time.
//!
//! A factory-cold LME2510C (no firmware uploaded since power-up)
//! advertises a fixed marker inside string descriptor 2. Once firmware
//! is resident the descriptor changes, so the same probe answers
//! "warm" after the post-download re-enumeration.

use crate::error::Result;
use crate::protocol::{COLD_MARKER, IDENT_DESCRIPTOR_INDEX};
use crate::transport::BulkTransport;

/// Firmware residency state of an attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Fresh from power-up; needs a firmware download.
    Cold,
    /// Firmware resident and running.
    Warm,
}

/// Probe the device once, at attach.
///
/// Switches interface 0 to alternate setting 1, reads 8 bytes of
/// string descriptor 2 and compares bytes 2..6 against the cold
/// marker. Transport failures propagate; a short or mismatching
/// descriptor is simply a warm device.
pub fn identify(transport: &mut impl BulkTransport) -> Result<DeviceState> {
    transport.set_alt_setting(0, 1)?;

    let desc = transport.string_descriptor(IDENT_DESCRIPTOR_INDEX, 8)?;
    if desc.len() >= 6 && desc[2..6] == COLD_MARKER {
        log::debug!("cold device, firmware download required");
        return Ok(DeviceState::Cold);
    }
    Ok(DeviceState::Warm)
}
