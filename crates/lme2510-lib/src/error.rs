//! Unified error type for the lme2510-lib crate.
//!
//! String payloads follow the convention **"context: details"** where
//! *context* identifies the operation or step (e.g. `"bulk write"`,
//! `"firmware block1"`) and *details* describes what went wrong. Bare
//! descriptions (no colon) are acceptable when no inner error is being
//! wrapped.

use std::fmt;

/// Errors surfaced by the command channel and the protocols built on it.
#[derive(Debug)]
pub enum BridgeError {
    /// No LME2510C device on the bus.
    NotFound,
    /// USB open / claim / discovery failure.
    OpenFailed(String),
    /// Oversize frame, oversize response request, or unknown opcode.
    InvalidArgument(String),
    /// Transport failure or I2C acknowledgement mismatch.
    Io(String),
    /// Non-I2C acknowledgement mismatch (firmware / stream control).
    Protocol(String),
    /// Firmware image fails the size invariant.
    InvalidFirmware(String),
    /// I2C transaction shape the device cannot express.
    Unsupported(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::NotFound => write!(f, "LME2510C device not found"),
            BridgeError::OpenFailed(e) => write!(f, "Failed to open device: {e}"),
            BridgeError::InvalidArgument(e) => write!(f, "Invalid argument: {e}"),
            BridgeError::Io(e) => write!(f, "I/O error: {e}"),
            BridgeError::Protocol(e) => write!(f, "Protocol error: {e}"),
            BridgeError::InvalidFirmware(e) => write!(f, "Invalid firmware: {e}"),
            BridgeError::Unsupported(e) => write!(f, "Unsupported: {e}"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Crate-level Result alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;
