//! Transport abstraction and the in-memory debug transport.
//!
//! A transport moves raw radio payloads between the ground station and the
//! devices it can reach. Inbound payloads are pushed to a [`ReceiveCallback`]
//! together with the sender's hardware id when the link layer knows it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rocketlink_packet::ByteOrderConfig;
use tracing::{debug, trace};

use crate::error::TransportError;

// ============================================================================
// Addressing
// ============================================================================

/// `(transport_name, device_address)` pair identifying one physical device
/// on one transport.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FullAddress {
    pub transport: String,
    pub device: String,
}

impl FullAddress {
    pub fn new(transport: impl Into<String>, device: impl Into<String>) -> Self {
        FullAddress {
            transport: transport.into(),
            device: device.into(),
        }
    }
}

impl fmt::Display for FullAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transport, self.device)
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Receives `(hwid, payload)` for every inbound radio payload.
///
/// Each transport invokes its callback from at most one thread at a time.
pub type ReceiveCallback = Arc<dyn Fn(Option<String>, Vec<u8>) + Send + Sync>;

/// A byte transport to one or more devices.
pub trait Transport: Send + Sync {
    /// Unique name of this transport within the session.
    fn name(&self) -> &str;

    /// Byte order negotiated with the devices behind this transport.
    fn byte_order(&self) -> ByteOrderConfig;

    /// Start delivering inbound payloads to `callback`.
    fn start(&self, callback: ReceiveCallback) -> Result<(), TransportError>;

    /// Send `data` to one device.
    fn send(&self, address: &FullAddress, data: &[u8]) -> Result<(), TransportError>;

    /// Send `data` to every device reachable on this transport.
    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Stop the transport and join its threads. Idempotent.
    fn shutdown(&self);
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").field("name", &self.name()).finish()
    }
}

/// One inbound radio payload, as queued for the read pipeline.
#[derive(Debug, Clone)]
pub struct ConnectionMessage {
    /// Hardware id of the sender, if the link layer reported one.
    pub hwid: Option<String>,
    pub transport: Arc<dyn Transport>,
    pub data: Vec<u8>,
}

impl ConnectionMessage {
    /// Full address of the sender, if it is known.
    pub fn full_address(&self) -> Option<FullAddress> {
        self.hwid
            .as_ref()
            .map(|hwid| FullAddress::new(self.transport.name(), hwid.clone()))
    }
}

// ============================================================================
// Debug Transport
// ============================================================================

/// A payload written through a [`DebugTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Destination address, `None` for broadcasts.
    pub address: Option<FullAddress>,
    pub data: Vec<u8>,
}

/// In-memory transport with one device behind it.
///
/// The device's hardware id is fixed at construction. [`DebugTransport::inject`]
/// delivers bytes as if the device had sent them, and every outbound payload
/// is recorded.
pub struct DebugTransport {
    name: String,
    hwid: String,
    byte_order: ByteOrderConfig,
    callback: Mutex<Option<ReceiveCallback>>,
    sent: Mutex<Vec<SentFrame>>,
    simulate_timeout: AtomicBool,
    timeout: Duration,
    closed: AtomicBool,
}

impl DebugTransport {
    pub fn new(name: impl Into<String>, hwid: impl Into<String>) -> Self {
        DebugTransport {
            name: name.into(),
            hwid: hwid.into(),
            byte_order: ByteOrderConfig::BIG_ENDIAN,
            callback: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            simulate_timeout: AtomicBool::new(false),
            timeout: Duration::from_secs(5),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrderConfig) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Hardware id of the device behind this transport.
    pub fn hwid(&self) -> &str {
        &self.hwid
    }

    pub fn full_address(&self) -> FullAddress {
        FullAddress::new(self.name.clone(), self.hwid.clone())
    }

    /// Deliver `data` as if the device had sent it.
    pub fn inject(&self, data: &[u8]) -> Result<(), TransportError> {
        self.deliver(Some(self.hwid.clone()), data)
    }

    /// Deliver `data` without a hardware id.
    pub fn inject_anonymous(&self, data: &[u8]) -> Result<(), TransportError> {
        self.deliver(None, data)
    }

    fn deliver(&self, hwid: Option<String>, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed(self.name.clone()));
        }
        // The lock also serialises callback invocations
        let callback = self.callback.lock();
        match callback.as_ref() {
            Some(callback) => {
                trace!(transport = %self.name, len = data.len(), "debug transport inject");
                callback(hwid, data.to_vec());
                Ok(())
            }
            None => Err(TransportError::Closed(self.name.clone())),
        }
    }

    /// Make every following send fail with [`TransportError::Timeout`].
    pub fn set_simulate_timeout(&self, enabled: bool) {
        self.simulate_timeout.store(enabled, Ordering::Release);
    }

    /// Every payload sent so far.
    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent.lock().clone()
    }

    fn record(&self, address: Option<FullAddress>, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed(self.name.clone()));
        }
        if self.simulate_timeout.load(Ordering::Acquire) {
            return Err(TransportError::Timeout {
                transport: self.name.clone(),
                timeout: self.timeout,
            });
        }
        self.sent.lock().push(SentFrame {
            address,
            data: data.to_vec(),
        });
        Ok(())
    }
}

impl Transport for DebugTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn byte_order(&self) -> ByteOrderConfig {
        self.byte_order
    }

    fn start(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        *self.callback.lock() = Some(callback);
        debug!(transport = %self.name, hwid = %self.hwid, "debug transport started");
        Ok(())
    }

    fn send(&self, address: &FullAddress, data: &[u8]) -> Result<(), TransportError> {
        self.record(Some(address.clone()), data)
    }

    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError> {
        self.record(None, data)
    }

    fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.callback.lock().take();
            debug!(transport = %self.name, "debug transport stopped");
        }
    }
}
