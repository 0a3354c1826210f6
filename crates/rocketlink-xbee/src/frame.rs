//! API frame types and escaped encoding.
//!
//! ```text
//! +------+--------+--------+------+-----------------+----------+
//! | 0x7E | len_hi | len_lo | type | payload         | checksum |
//! +------+--------+--------+------+-----------------+----------+
//!          \______________ escaped after 0x7E ________________/
//! ```
//!
//! `len` counts the type byte and the payload. The checksum is
//! `0xFF - (sum(type, payload) & 0xFF)`.

use bytes::{Buf, BufMut};

use crate::constants::*;
use crate::error::XBeeError;

/// Checksum over the type byte and payload.
pub fn checksum(body: &[u8]) -> u8 {
    let sum = body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFF - sum
}

/// Whether `byte` must be escaped after the start delimiter.
pub fn needs_escape(byte: u8) -> bool {
    ESCAPED_BYTES.contains(&byte)
}

/// Append `byte` to `buf`, escaping it if needed.
pub fn put_escaped(buf: &mut Vec<u8>, byte: u8) {
    if needs_escape(byte) {
        buf.push(ESCAPE);
        buf.push(byte ^ ESCAPE_MASK);
    } else {
        buf.push(byte);
    }
}

/// Escape every byte of `data`.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + data.len() / 8);
    for &byte in data {
        put_escaped(&mut buf, byte);
    }
    buf
}

/// Parse a 64-bit address written as 16 hex digits.
pub fn parse_address(text: &str) -> Result<u64, XBeeError> {
    let bytes = hex::decode(text.trim()).map_err(|_| XBeeError::InvalidAddress(text.to_string()))?;
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| XBeeError::InvalidAddress(text.to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

/// Render a 64-bit address as 16 upper-case hex digits.
pub fn format_address(address: u64) -> String {
    hex::encode_upper(address.to_be_bytes())
}

// ============================================================================
// Frame Types
// ============================================================================

/// Transmit request sent by the rocket's firmware to its radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub frame_id: u8,
    pub destination: u64,
    pub network_address: u16,
    pub broadcast_radius: u8,
    pub options: u8,
    pub data: Vec<u8>,
}

impl TxRequest {
    /// Request to `destination` with default radius and options.
    pub fn new(frame_id: u8, destination: u64, data: impl Into<Vec<u8>>) -> Self {
        TxRequest {
            frame_id,
            destination,
            network_address: UNKNOWN_NETWORK_ADDRESS,
            broadcast_radius: 0,
            options: 0,
            data: data.into(),
        }
    }
}

/// Received packet delivered to the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxIndicator {
    pub source: u64,
    pub network_address: u16,
    pub options: u8,
    pub data: Vec<u8>,
}

/// Acknowledgement of a TX request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatus {
    pub frame_id: u8,
    pub network_address: u16,
    pub retry_count: u8,
    pub delivery_status: u8,
    pub discovery_status: u8,
}

/// A decoded API frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFrame {
    TxRequest(TxRequest),
    RxIndicator(RxIndicator),
    TxStatus(TxStatus),
    /// Any frame type the simulator does not interpret.
    Other { frame_type: u8, payload: Vec<u8> },
}

impl ApiFrame {
    pub fn frame_type(&self) -> u8 {
        match self {
            ApiFrame::TxRequest(_) => FRAME_TX_REQUEST,
            ApiFrame::RxIndicator(_) => FRAME_RX_INDICATOR,
            ApiFrame::TxStatus(_) => FRAME_TX_STATUS,
            ApiFrame::Other { frame_type, .. } => *frame_type,
        }
    }

    /// Label used for log fields and metric labels.
    pub fn type_name(&self) -> &'static str {
        match self {
            ApiFrame::TxRequest(_) => "tx_request",
            ApiFrame::RxIndicator(_) => "rx_indicator",
            ApiFrame::TxStatus(_) => "tx_status",
            ApiFrame::Other { .. } => "other",
        }
    }

    /// Unescaped type byte plus payload.
    pub fn body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u8(self.frame_type());
        match self {
            ApiFrame::TxRequest(req) => {
                buf.put_u8(req.frame_id);
                buf.put_u64(req.destination);
                buf.put_u16(req.network_address);
                buf.put_u8(req.broadcast_radius);
                buf.put_u8(req.options);
                buf.put_slice(&req.data);
            }
            ApiFrame::RxIndicator(rx) => {
                buf.put_u64(rx.source);
                buf.put_u16(rx.network_address);
                buf.put_u8(rx.options);
                buf.put_slice(&rx.data);
            }
            ApiFrame::TxStatus(status) => {
                buf.put_u8(status.frame_id);
                buf.put_u16(status.network_address);
                buf.put_u8(status.retry_count);
                buf.put_u8(status.delivery_status);
                buf.put_u8(status.discovery_status);
            }
            ApiFrame::Other { payload, .. } => buf.put_slice(payload),
        }
        buf
    }

    /// Full escaped frame, start delimiter included.
    pub fn encode(&self) -> Result<Vec<u8>, XBeeError> {
        let body = self.body();
        let length = u16::try_from(body.len()).map_err(|_| XBeeError::FrameTooLong(body.len()))?;

        let mut buf = Vec::with_capacity(body.len() + 8);
        buf.push(START_DELIMITER);
        for byte in length.to_be_bytes() {
            put_escaped(&mut buf, byte);
        }
        for &byte in &body {
            put_escaped(&mut buf, byte);
        }
        put_escaped(&mut buf, checksum(&body));
        Ok(buf)
    }

    /// Decode a checksum-verified frame body.
    pub fn decode(frame_type: u8, mut payload: &[u8]) -> Result<ApiFrame, XBeeError> {
        let require = |expected: usize, actual: usize| {
            if actual < expected {
                Err(XBeeError::FrameTooShort {
                    frame_type,
                    expected,
                    actual,
                })
            } else {
                Ok(())
            }
        };

        let frame = match frame_type {
            FRAME_TX_REQUEST => {
                require(TX_REQUEST_HEADER_LEN, payload.len())?;
                ApiFrame::TxRequest(TxRequest {
                    frame_id: payload.get_u8(),
                    destination: payload.get_u64(),
                    network_address: payload.get_u16(),
                    broadcast_radius: payload.get_u8(),
                    options: payload.get_u8(),
                    data: payload.to_vec(),
                })
            }
            FRAME_RX_INDICATOR => {
                require(RX_INDICATOR_HEADER_LEN, payload.len())?;
                ApiFrame::RxIndicator(RxIndicator {
                    source: payload.get_u64(),
                    network_address: payload.get_u16(),
                    options: payload.get_u8(),
                    data: payload.to_vec(),
                })
            }
            FRAME_TX_STATUS => {
                require(TX_STATUS_LEN, payload.len())?;
                ApiFrame::TxStatus(TxStatus {
                    frame_id: payload.get_u8(),
                    network_address: payload.get_u16(),
                    retry_count: payload.get_u8(),
                    delivery_status: payload.get_u8(),
                    discovery_status: payload.get_u8(),
                })
            }
            _ => ApiFrame::Other {
                frame_type,
                payload: payload.to_vec(),
            },
        };
        Ok(frame)
    }
}
