//! Error types for rocketlink-packet.

use thiserror::Error;

/// Errors that can occur while decoding or encoding subpackets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The first byte of the subpacket is not a known subpacket id.
    #[error("unknown subpacket id: 0x{0:02X}")]
    UnknownSubpacketId(u8),

    /// A config subpacket named a device type this ground station does not know.
    #[error("unknown device type: 0x{0:02X}")]
    UnknownDeviceType(u8),

    /// The stream ended before the subpacket was complete.
    #[error("truncated subpacket at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        /// Stream offset where the missing field starts.
        offset: u64,
        /// Bytes required for the field.
        needed: usize,
        /// Bytes left in the stream.
        available: usize,
    },

    /// The payload had the right length but could not be interpreted.
    #[error("invalid payload for subpacket 0x{id:02X}: {message}")]
    InvalidPayload {
        /// Subpacket id being decoded.
        id: u8,
        /// Description of the problem.
        message: String,
    },
}

/// How a caller should resume reading after a [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The offending id byte was consumed; retry at the next byte.
    SkipByte,
    /// The whole subpacket was consumed; continue with the next one.
    SkipSubpacket,
    /// Nothing useful remains in the chunk; discard the rest.
    DiscardChunk,
}

impl CodecError {
    /// Create an invalid payload error.
    pub fn invalid_payload(id: u8, message: impl Into<String>) -> Self {
        CodecError::InvalidPayload {
            id,
            message: message.into(),
        }
    }

    /// The resume policy for this error.
    pub fn recovery(&self) -> Recovery {
        match self {
            CodecError::UnknownSubpacketId(_) => Recovery::SkipByte,
            CodecError::UnknownDeviceType(_) | CodecError::InvalidPayload { .. } => {
                Recovery::SkipSubpacket
            }
            CodecError::Truncated { .. } => Recovery::DiscardChunk,
        }
    }

    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CodecError::UnknownSubpacketId(_) => "unknown_subpacket_id",
            CodecError::UnknownDeviceType(_) => "unknown_device_type",
            CodecError::Truncated { .. } => "truncated",
            CodecError::InvalidPayload { .. } => "invalid_payload",
        }
    }
}
