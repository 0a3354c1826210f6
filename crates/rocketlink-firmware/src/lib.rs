//! Simulated flight computer transport.
//!
//! A firmware build compiled for the host runs as a child process. Its
//! standard streams carry a nibble-encoded sub-protocol: pin and sensor
//! access, time updates and raw XBee bytes. [`SimTransport`] answers the
//! hardware requests from a [`Hardware`] model and routes radio traffic
//! through the XBee simulator, so the ground station sees the same packets
//! it would see over a real radio link.

mod error;
mod hardware;
mod nibble;
mod protocol;
mod session;
mod transport;

pub use error::*;
pub use hardware::*;
pub use nibble::{decode as nibble_decode, encode as nibble_encode, NibbleReader, NibbleWriter, NIBBLE_OFFSET};
pub use protocol::*;
pub use session::*;
pub use transport::*;
