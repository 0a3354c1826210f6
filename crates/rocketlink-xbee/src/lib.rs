//! XBee API mode framing and module simulator.
//!
//! The simulated firmware talks to what it believes is an XBee radio in API
//! mode with escaping enabled. This crate provides the frame types and
//! escaped encoding ([`ApiFrame`]), an incremental explicit-state parser
//! ([`FrameParser`]) and a threaded module simulator ([`XBeeSimulator`]) that
//! turns TX requests into ground-station payloads and ground transmissions
//! into RX indicators.
//!
//! # Example
//!
//! ```rust
//! use rocketlink_xbee::{ApiFrame, FrameParser, TxRequest};
//!
//! let frame = ApiFrame::TxRequest(TxRequest::new(1, 0xFFFF, b"hi".to_vec()));
//! let bytes = frame.encode()?;
//!
//! let mut parser = FrameParser::new();
//! let raw = parser.feed(&bytes).remove(0)?;
//! assert_eq!(raw.decode()?, frame);
//! # Ok::<(), rocketlink_xbee::XBeeError>(())
//! ```

mod constants;
mod error;
mod frame;
mod parser;
mod simulator;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use parser::*;
pub use simulator::*;
