//! Error types for rocketlink-core.

use std::time::Duration;

use rocketlink_packet::DeviceType;
use thiserror::Error;

/// Errors raised by the device manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The registration conflicts with an existing binding.
    #[error("invalid registration of {device_type} as {hwid}: {reason}")]
    InvalidRegistration {
        device_type: DeviceType,
        hwid: String,
        reason: String,
    },
}

impl RegistrationError {
    pub fn invalid(device_type: DeviceType, hwid: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistrationError::InvalidRegistration {
            device_type,
            hwid: hwid.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by transports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// A send did not complete in time and was abandoned.
    #[error("send on {transport} timed out after {timeout:?}")]
    Timeout { transport: String, timeout: Duration },

    /// The transport is shut down or its peer went away.
    #[error("transport {0} is closed")]
    Closed(String),

    /// The transport could not be started.
    #[error("transport {transport} failed to start: {message}")]
    Startup { transport: String, message: String },

    /// Any other I/O failure.
    #[error("transport {transport} I/O error: {message}")]
    Io { transport: String, message: String },
}

impl TransportError {
    pub fn io(transport: impl Into<String>, err: impl std::fmt::Display) -> Self {
        TransportError::Io {
            transport: transport.into(),
            message: err.to_string(),
        }
    }

    pub fn startup(transport: impl Into<String>, err: impl std::fmt::Display) -> Self {
        TransportError::Startup {
            transport: transport.into(),
            message: err.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Errors raised while saving the rocket data store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised while parsing an operator command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct CommandParsingError {
    pub reason: String,
}

impl CommandParsingError {
    pub fn new(reason: impl Into<String>) -> Self {
        CommandParsingError {
            reason: reason.into(),
        }
    }
}

/// Errors raised while starting or feeding the pipelines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn {worker} thread: {message}")]
    Spawn { worker: &'static str, message: String },

    /// The pipeline was shut down.
    #[error("{0} pipeline is shut down")]
    Closed(&'static str),

    /// The bounded queue is full.
    #[error("{0} queue is full")]
    QueueFull(&'static str),
}

impl PipelineError {
    pub fn spawn(worker: &'static str, err: std::io::Error) -> Self {
        PipelineError::Spawn {
            worker,
            message: err.to_string(),
        }
    }
}

/// Any error surfaced by the application context.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Command(#[from] CommandParsingError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Result type for rocketlink-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistrationError::invalid(DeviceType::Stage1Flight, "HW_B", "already bound to HW_A");
        assert_eq!(
            err.to_string(),
            "invalid registration of STAGE1_FLIGHT as HW_B: already bound to HW_A"
        );

        let err = TransportError::Timeout {
            transport: "sim0".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "send on sim0 timed out after 5s");

        assert_eq!(CommandParsingError::new("not yet registered").to_string(), "not yet registered");
    }
}
