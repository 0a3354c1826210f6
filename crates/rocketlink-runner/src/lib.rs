//! Ground station runner.
//!
//! Loads a [`GroundStationConfig`], opens its transports on an
//! [`AppContext`](rocketlink_core::AppContext) and drives the operator
//! console. The `rocketlink` binary is a thin CLI over this crate; the
//! built-in [`self_test`] replays the reference decoding, XBee, registration
//! and autosave scenarios.

pub mod config;
pub mod console;
pub mod logging;
pub mod self_test;

pub use config::{ConfigError, GroundAddress, GroundStationConfig, TransportConfig};
pub use console::{handle_line, ConsoleAction};
pub use self_test::SelfTestReport;
