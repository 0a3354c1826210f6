//! Error types for rocketlink-xbee.

use thiserror::Error;

/// Errors raised while parsing API frames or driving the simulator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XBeeError {
    /// A raw start delimiter appeared inside a frame. The partial frame is
    /// discarded and parsing restarts at the new delimiter.
    #[error("unescaped start delimiter inside frame")]
    UnescapedDelimiter,

    /// The frame checksum did not match.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// A frame declared a zero length.
    #[error("frame declares zero length")]
    EmptyFrame,

    /// A frame body is too short for its frame type.
    #[error("frame 0x{frame_type:02X} too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        frame_type: u8,
        expected: usize,
        actual: usize,
    },

    /// A frame body is too long to be framed.
    #[error("frame body too long: {0} bytes")]
    FrameTooLong(usize),

    /// A 64-bit address string could not be parsed.
    #[error("invalid 64-bit address {0:?}: expected 16 hex digits")]
    InvalidAddress(String),

    /// The simulator was shut down.
    #[error("xbee simulator is shut down")]
    Closed,

    /// The parser thread could not be started.
    #[error("failed to start parser thread: {0}")]
    Spawn(String),
}

impl XBeeError {
    /// Short label used for log fields and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            XBeeError::UnescapedDelimiter => "unescaped_delimiter",
            XBeeError::ChecksumMismatch { .. } => "checksum",
            XBeeError::EmptyFrame | XBeeError::FrameTooShort { .. } | XBeeError::FrameTooLong(_) => {
                "malformed"
            }
            XBeeError::InvalidAddress(_) => "address",
            XBeeError::Closed | XBeeError::Spawn(_) => "closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XBeeError::ChecksumMismatch {
            expected: 0x13,
            actual: 0x12,
        };
        assert_eq!(err.to_string(), "checksum mismatch: expected 0x13, got 0x12");
        assert_eq!(err.reason(), "checksum");
        assert_eq!(XBeeError::UnescapedDelimiter.reason(), "unescaped_delimiter");
    }
}
