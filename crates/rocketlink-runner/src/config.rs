//! Ground station configuration file.
//!
//! ```yaml
//! ground_address: 0013A200400A0127
//! autosave:
//!   path: flight.csv
//!   interval_secs: 10
//! transports:
//!   - type: sim
//!     name: sim0
//!     firmware: ./build/flight-sim
//!     hwid: HW_SIM
//!   - type: debug
//!     name: bench
//!     hwid: HW_BENCH
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rocketlink_core::{ContextConfig, DebugTransport, Transport, DEFAULT_READ_QUEUE_CAPACITY};
use rocketlink_firmware::{Ignitor, SimConfig, SimTransport};
use rocketlink_xbee::{format_address, parse_address};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// XBee address of the ground station radio used when none is configured.
pub const DEFAULT_GROUND_ADDRESS: u64 = 0x0013_A200_400A_0127;

/// Errors loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}

// ============================================================================
// Ground Address
// ============================================================================

/// 64-bit XBee address written as 16 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundAddress(pub u64);

impl Default for GroundAddress {
    fn default() -> Self {
        GroundAddress(DEFAULT_GROUND_ADDRESS)
    }
}

impl fmt::Display for GroundAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_address(self.0))
    }
}

impl<'de> Deserialize<'de> for GroundAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse_address(&text).map(GroundAddress).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AutosaveConfig {
    pub path: PathBuf,
    pub interval_secs: u64,
    pub enabled: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        AutosaveConfig {
            path: PathBuf::from("autosave.csv"),
            interval_secs: 10,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgnitorConfig {
    pub name: String,
    pub test_pin: u8,
    pub read_pin: u8,
    pub fire_pin: u8,
}

impl From<&IgnitorConfig> for Ignitor {
    fn from(config: &IgnitorConfig) -> Self {
        Ignitor::new(config.name.clone(), config.test_pin, config.read_pin, config.fire_pin)
    }
}

/// One transport to open at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum TransportConfig {
    /// Simulated flight computer running as a child process.
    Sim {
        name: String,
        firmware: PathBuf,
        #[serde(default)]
        args: Vec<String>,
        hwid: String,
        /// Defaults to the standard drogue and main ignitors.
        #[serde(default)]
        ignitors: Option<Vec<IgnitorConfig>>,
    },
    /// In-memory transport, useful for bench tests.
    Debug { name: String, hwid: String },
}

impl TransportConfig {
    pub fn name(&self) -> &str {
        match self {
            TransportConfig::Sim { name, .. } | TransportConfig::Debug { name, .. } => name,
        }
    }

    /// Build the transport. It is not started.
    pub fn build(&self, ground: GroundAddress, send_timeout: Duration) -> Arc<dyn Transport> {
        match self {
            TransportConfig::Sim {
                name,
                firmware,
                args,
                hwid,
                ignitors,
            } => {
                let mut sim = SimConfig::new(name.clone(), firmware.clone(), hwid.clone(), ground.0);
                sim.args = args.clone();
                sim.send_timeout = send_timeout;
                if let Some(ignitors) = ignitors {
                    sim.ignitors = ignitors.iter().map(Ignitor::from).collect();
                }
                Arc::new(SimTransport::new(sim))
            }
            TransportConfig::Debug { name, hwid } => Arc::new(DebugTransport::new(name.clone(), hwid.clone())),
        }
    }
}

// ============================================================================
// Ground Station Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GroundStationConfig {
    pub ground_address: GroundAddress,
    pub autosave: AutosaveConfig,
    pub read_queue_capacity: usize,
    pub send_timeout_ms: u64,
    pub transports: Vec<TransportConfig>,
}

impl Default for GroundStationConfig {
    fn default() -> Self {
        GroundStationConfig {
            ground_address: GroundAddress::default(),
            autosave: AutosaveConfig::default(),
            read_queue_capacity: DEFAULT_READ_QUEUE_CAPACITY,
            send_timeout_ms: 5000,
            transports: Vec::new(),
        }
    }
}

impl GroundStationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: GroundStationConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_queue_capacity == 0 {
            return Err(ConfigError::invalid("read_queue_capacity must be positive"));
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::invalid("send_timeout_ms must be positive"));
        }
        if self.autosave.enabled && self.autosave.interval_secs == 0 {
            return Err(ConfigError::invalid("autosave.interval_secs must be positive"));
        }
        let mut names = HashSet::new();
        for transport in &self.transports {
            if !names.insert(transport.name()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate transport name '{}'",
                    transport.name()
                )));
            }
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            autosave_path: self.autosave.enabled.then(|| self.autosave.path.clone()),
            autosave_interval: Duration::from_secs(self.autosave.interval_secs),
            read_queue_capacity: self.read_queue_capacity,
        }
    }
}
