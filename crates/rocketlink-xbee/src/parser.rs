//! Incremental API frame parser.
//!
//! Raw bytes pass through an [`Unescaper`], which turns them into
//! [`Token`]s, and the tokens drive an explicit-state [`FrameParser`].
//! A raw start delimiter is never escaped, so the unescaper reports it as a
//! distinct token and the parser can resynchronise on it from any state.

use bytes::BytesMut;

use crate::constants::{ESCAPE, ESCAPE_MASK, START_DELIMITER};
use crate::error::XBeeError;
use crate::frame::{checksum, ApiFrame};

/// Output of the unescaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A raw `0x7E`.
    Delimiter,
    /// A data byte, already unescaped.
    Byte(u8),
}

/// Removes escape sequences from a raw byte stream.
#[derive(Debug, Default)]
pub struct Unescaper {
    pending_escape: bool,
}

impl Unescaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one raw byte. Returns `None` when the byte was an escape marker.
    pub fn push(&mut self, raw: u8) -> Option<Token> {
        if raw == START_DELIMITER {
            self.pending_escape = false;
            return Some(Token::Delimiter);
        }
        if self.pending_escape {
            self.pending_escape = false;
            return Some(Token::Byte(raw ^ ESCAPE_MASK));
        }
        if raw == ESCAPE {
            self.pending_escape = true;
            return None;
        }
        Some(Token::Byte(raw))
    }

    pub fn reset(&mut self) {
        self.pending_escape = false;
    }
}

/// Parser position within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Waiting for a start delimiter; other bytes are discarded.
    Idle,
    LengthMsb,
    LengthLsb { msb: u8 },
    FrameType { length: u16 },
    Payload { remaining: usize },
    Checksum,
}

/// A complete, checksum-verified frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn decode(&self) -> Result<ApiFrame, XBeeError> {
        ApiFrame::decode(self.frame_type, &self.payload)
    }
}

/// Explicit-state API frame parser.
#[derive(Debug)]
pub struct FrameParser {
    unescaper: Unescaper,
    state: ParserState,
    frame_type: u8,
    payload: BytesMut,
    /// Raw bytes discarded while idle.
    discarded: u64,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        FrameParser {
            unescaper: Unescaper::new(),
            state: ParserState::Idle,
            frame_type: 0,
            payload: BytesMut::new(),
            discarded: 0,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Raw bytes discarded while waiting for a start delimiter.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Feed one raw byte.
    ///
    /// Returns a frame when its checksum byte arrives. Errors leave the parser
    /// ready for the next frame: after [`XBeeError::UnescapedDelimiter`] it is
    /// already inside the new frame, after any other error it is idle.
    pub fn push(&mut self, raw: u8) -> Result<Option<RawFrame>, XBeeError> {
        match self.unescaper.push(raw) {
            None => Ok(None),
            Some(Token::Delimiter) => self.on_delimiter(),
            Some(Token::Byte(byte)) => self.on_byte(byte),
        }
    }

    /// Feed a chunk of raw bytes, collecting every frame and error in order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<RawFrame, XBeeError>> {
        data.iter()
            .filter_map(|&raw| self.push(raw).transpose())
            .collect()
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.unescaper.reset();
        self.payload.clear();
    }

    fn on_delimiter(&mut self) -> Result<Option<RawFrame>, XBeeError> {
        let was_idle = self.state == ParserState::Idle;
        self.payload.clear();
        self.state = ParserState::LengthMsb;
        if was_idle {
            Ok(None)
        } else {
            Err(XBeeError::UnescapedDelimiter)
        }
    }

    fn on_byte(&mut self, byte: u8) -> Result<Option<RawFrame>, XBeeError> {
        match self.state {
            ParserState::Idle => {
                self.discarded += 1;
            }
            ParserState::LengthMsb => {
                self.state = ParserState::LengthLsb { msb: byte };
            }
            ParserState::LengthLsb { msb } => {
                let length = u16::from_be_bytes([msb, byte]);
                if length == 0 {
                    self.reset();
                    return Err(XBeeError::EmptyFrame);
                }
                self.state = ParserState::FrameType { length };
            }
            ParserState::FrameType { length } => {
                self.frame_type = byte;
                let remaining = usize::from(length) - 1;
                self.payload.reserve(remaining);
                self.state = if remaining == 0 {
                    ParserState::Checksum
                } else {
                    ParserState::Payload { remaining }
                };
            }
            ParserState::Payload { remaining } => {
                self.payload.extend_from_slice(&[byte]);
                self.state = if remaining == 1 {
                    ParserState::Checksum
                } else {
                    ParserState::Payload {
                        remaining: remaining - 1,
                    }
                };
            }
            ParserState::Checksum => {
                let mut body = Vec::with_capacity(self.payload.len() + 1);
                body.push(self.frame_type);
                body.extend_from_slice(&self.payload);
                let expected = checksum(&body);
                let payload = self.payload.split().to_vec();
                self.reset();

                if byte != expected {
                    return Err(XBeeError::ChecksumMismatch {
                        expected,
                        actual: byte,
                    });
                }
                return Ok(Some(RawFrame {
                    frame_type: self.frame_type,
                    payload,
                }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ApiFrame, TxRequest};

    fn sample_frame() -> Vec<u8> {
        ApiFrame::TxRequest(TxRequest::new(7, 0xFFFF, b"abcd".to_vec()))
            .encode()
            .unwrap()
    }

    #[test]
    fn test_unescaper() {
        let mut u = Unescaper::new();
        assert_eq!(u.push(0x7E), Some(Token::Delimiter));
        assert_eq!(u.push(0x7D), None);
        assert_eq!(u.push(0x5E), Some(Token::Byte(0x7E)));
        assert_eq!(u.push(0x41), Some(Token::Byte(0x41)));
        // A delimiter cancels a pending escape
        assert_eq!(u.push(0x7D), None);
        assert_eq!(u.push(0x7E), Some(Token::Delimiter));
    }

    #[test]
    fn test_state_sequence() {
        let mut parser = FrameParser::new();
        let frame = sample_frame();

        assert_eq!(parser.state(), ParserState::Idle);
        parser.push(frame[0]).unwrap();
        assert_eq!(parser.state(), ParserState::LengthMsb);
        parser.push(frame[1]).unwrap();
        assert_eq!(parser.state(), ParserState::LengthLsb { msb: 0 });
        parser.push(frame[2]).unwrap();
        assert_eq!(parser.state(), ParserState::FrameType { length: 18 });
        parser.push(frame[3]).unwrap();
        assert_eq!(parser.state(), ParserState::Payload { remaining: 17 });

        let mut result = None;
        for &b in &frame[4..] {
            if let Some(raw) = parser.push(b).unwrap() {
                result = Some(raw);
            }
        }
        let raw = result.unwrap();
        assert_eq!(raw.frame_type, 0x10);
        assert_eq!(parser.state(), ParserState::Idle);
    }

    #[test]
    fn test_garbage_before_frame_is_discarded() {
        let mut parser = FrameParser::new();
        let mut data = vec![0x00, 0x41, 0x13];
        data.extend(sample_frame());

        let results = parser.feed(&data);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert_eq!(parser.discarded(), 3);
    }

    #[test]
    fn test_unescaped_delimiter_resyncs() {
        let mut parser = FrameParser::new();
        let frame = sample_frame();
        let mut data = frame[..6].to_vec();
        data.extend_from_slice(&frame);

        let results = parser.feed(&data);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Err(XBeeError::UnescapedDelimiter));
        assert_eq!(results[1].as_ref().unwrap().payload[..1], [7]);
    }

    #[test]
    fn test_checksum_mismatch_drops_frame() {
        let mut parser = FrameParser::new();
        let mut frame = sample_frame();
        let last = frame.len() - 1;
        frame[last] = frame[last].wrapping_add(1);
        frame.extend(sample_frame());

        let results = parser.feed(&frame);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(XBeeError::ChecksumMismatch { .. })));
        assert!(results[1].is_ok());
    }
}
