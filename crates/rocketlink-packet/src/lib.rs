//! Rocket telemetry subpacket format.
//!
//! This crate provides the types and codec for the framed binary subpackets
//! emitted by the flight computers. A radio payload is a concatenation of
//! subpackets, each starting with a one-byte subpacket id and a four-byte
//! big-endian millisecond timestamp.
//!
//! # Subpacket Format
//!
//! ```text
//! +----+----------------+-----------+----------------------+
//! | id | timestamp (BE) | [length]  | payload              |
//! | 1  | 4              | 0 or 1    | constant or `length` |
//! +----+----------------+-----------+----------------------+
//! ```
//!
//! The length byte is only present for variable-length ids (message, config).
//! Integers are always big-endian; floats follow the negotiated
//! [`ByteOrderConfig`].
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use rocketlink_packet::{extract, ByteOrderConfig, DataEntryId, DataValue};
//!
//! let data = [0x01, 0, 0, 0, 0, 5, b'H', b'e', b'l', b'l', b'o'];
//! let mut cursor = Cursor::new(&data[..]);
//! let bundle = extract(&mut cursor, &ByteOrderConfig::default())?;
//! assert_eq!(bundle.get(DataEntryId::Message), Some(&DataValue::Text("Hello".into())));
//! # Ok::<(), rocketlink_packet::CodecError>(())
//! ```

mod byte_order;
mod codec;
mod commands;
mod error;
pub mod ids;
mod subpacket;
mod types;

pub use byte_order::*;
pub use codec::*;
pub use commands::*;
pub use error::*;
pub use subpacket::*;
pub use types::*;
