//! lme2510-lib — control-plane bridge for the LME2510C USB DVB tuner.
//!
//! The chip exposes one bulk request/response command pipe; this crate
//! frames it ([`channel`]), and layers firmware upload ([`firmware`]),
//! an I2C bridge for the attached demodulator/tuner ([`i2c`]),
//! cold/warm detection ([`identify`]) and the lock-state cache that
//! hides the chip's stop-streaming-on-I2C quirk ([`status`]) on top.

pub mod channel;
pub mod device;
pub mod error;
pub mod firmware;
pub mod i2c;
pub mod identify;
pub mod protocol;
pub mod status;
pub mod transport;

pub use device::Lme2510;
pub use error::BridgeError;
