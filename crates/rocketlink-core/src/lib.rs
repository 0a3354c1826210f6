//! Ground station core: device routing, telemetry store and pipelines.
//!
//! Radio payloads arrive through a [`Transport`], are queued on the
//! [`ReadPipeline`], decoded with `rocketlink-packet`, attributed to a device
//! by the [`DeviceManager`] and filed in the [`RocketData`] store. Operator
//! commands go the other way through [`parse_command`] and the
//! [`SendPipeline`]. [`AppContext`] owns all of it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rocketlink_core::{AppContext, ContextConfig, DebugTransport};
//! use rocketlink_packet::{encode_subpacket, ByteOrderConfig, ConfigInfo, DeviceType, Subpacket, SubpacketBody};
//!
//! let context = AppContext::start(ContextConfig::default())?;
//! let radio = Arc::new(DebugTransport::new("debug", "HW_1"));
//! context.add_transport(radio.clone())?;
//!
//! let config = Subpacket::new(0, SubpacketBody::Config(ConfigInfo {
//!     is_sim: false,
//!     device_type: DeviceType::Copilot,
//!     version_id: "v1".into(),
//! }));
//! radio.inject(&encode_subpacket(&config, &ByteOrderConfig::BIG_ENDIAN)?)?;
//! context.shutdown();
//!
//! assert_eq!(context.devices().get_full_address(DeviceType::Copilot), Some(radio.full_address()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod autosave;
mod command;
mod context;
mod device_manager;
mod error;
mod read_pipeline;
mod send_pipeline;
mod store;
mod transport;

pub use autosave::*;
pub use command::*;
pub use context::*;
pub use device_manager::*;
pub use error::*;
pub use read_pipeline::*;
pub use send_pipeline::*;
pub use store::*;
pub use transport::*;
