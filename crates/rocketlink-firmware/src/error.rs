//! Error types for rocketlink-firmware.

use std::io;

use rocketlink_xbee::XBeeError;
use thiserror::Error;

/// Errors raised while talking to a simulated flight computer.
#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A character outside the nibble alphabet arrived on the stream.
    #[error("invalid nibble character 0x{0:02X}")]
    InvalidNibble(u8),

    /// The firmware never completed the SYN/ACK handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The first packet after the handshake was not a valid config packet.
    #[error("invalid config packet: {0}")]
    InvalidConfig(String),

    #[error("XBee error: {0}")]
    XBee(#[from] XBeeError),

    /// The firmware process could not be started.
    #[error("failed to launch firmware {path}: {message}")]
    Launch { path: String, message: String },
}

impl FirmwareError {
    pub fn handshake(message: impl Into<String>) -> Self {
        FirmwareError::Handshake(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        FirmwareError::InvalidConfig(message.into())
    }

    /// Whether the stream simply ended.
    pub fn is_eof(&self) -> bool {
        matches!(self, FirmwareError::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof)
    }
}
