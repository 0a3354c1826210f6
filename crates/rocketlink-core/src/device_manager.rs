//! Device registration and routing.
//!
//! The device manager binds each logical [`DeviceType`] to the hardware id of
//! the physical device that announced it, and remembers which transport that
//! device was last heard on. The type/hwid binding is fixed for the session;
//! the transport binding follows the device if it moves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rocketlink_metrics::metric_defs::{DEVICES_REGISTERED, REGISTRATIONS};
use rocketlink_metrics::metrics::{counter, gauge};
use rocketlink_packet::DeviceType;
use tracing::{error, info, warn};

use crate::error::RegistrationError;
use crate::transport::{FullAddress, Transport};

/// Outcome of a successful [`DeviceManager::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new binding was created.
    Registered,
    /// The binding already existed.
    Unchanged,
    /// The device was rediscovered on another transport.
    Moved { from: String },
}

impl Registration {
    fn label(&self) -> &'static str {
        match self {
            Registration::Registered => "registered",
            Registration::Unchanged => "unchanged",
            Registration::Moved { .. } => "moved",
        }
    }
}

#[derive(Default)]
struct Bindings {
    type_to_hwid: HashMap<DeviceType, String>,
    hwid_to_type: HashMap<String, DeviceType>,
    hwid_to_transport: HashMap<String, Arc<dyn Transport>>,
}

impl Bindings {
    fn full_address(&self, hwid: &str) -> Option<FullAddress> {
        self.hwid_to_transport
            .get(hwid)
            .map(|transport| FullAddress::new(transport.name(), hwid))
    }
}

/// Registry of `(device_type, hwid, transport)` triples.
#[derive(Default)]
pub struct DeviceManager {
    bindings: RwLock<Bindings>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `device_type` to `hwid` on `transport`.
    ///
    /// Re-registering an existing triple is a no-op. A known device on a new
    /// transport moves there. Binding a type or hwid that is already bound to
    /// something else fails with [`RegistrationError::InvalidRegistration`].
    pub fn register(
        &self,
        device_type: DeviceType,
        hwid: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Registration, RegistrationError> {
        let result = self.register_inner(device_type, hwid, transport);
        match &result {
            Ok(outcome) => {
                counter!(REGISTRATIONS.name, "result" => outcome.label()).increment(1);
            }
            Err(err) => {
                error!(device = %device_type, hwid, error = %err, "registration rejected");
                counter!(REGISTRATIONS.name, "result" => "invalid").increment(1);
            }
        }
        result
    }

    fn register_inner(
        &self,
        device_type: DeviceType,
        hwid: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Registration, RegistrationError> {
        if !device_type.is_known() {
            return Err(RegistrationError::invalid(device_type, hwid, "unknown device type"));
        }

        let mut bindings = self.bindings.write();

        if let Some(bound) = bindings.type_to_hwid.get(&device_type) {
            if bound != hwid {
                return Err(RegistrationError::invalid(
                    device_type,
                    hwid,
                    format!("{device_type} is already bound to {bound}"),
                ));
            }
        }
        if let Some(bound) = bindings.hwid_to_type.get(hwid) {
            if *bound != device_type {
                return Err(RegistrationError::invalid(
                    device_type,
                    hwid,
                    format!("{hwid} is already registered as {bound}"),
                ));
            }
        }

        let previous = bindings
            .hwid_to_transport
            .get(hwid)
            .map(|t| t.name().to_string());
        let outcome = match previous {
            None => Registration::Registered,
            Some(name) if name == transport.name() => Registration::Unchanged,
            Some(name) => Registration::Moved { from: name },
        };

        match &outcome {
            Registration::Registered => {
                info!(device = %device_type, hwid, transport = transport.name(), "device registered");
            }
            Registration::Moved { from } => {
                warn!(
                    device = %device_type,
                    hwid,
                    from = %from,
                    to = transport.name(),
                    "device moved to another transport"
                );
            }
            Registration::Unchanged => return Ok(outcome),
        }

        bindings.type_to_hwid.insert(device_type, hwid.to_string());
        bindings.hwid_to_type.insert(hwid.to_string(), device_type);
        bindings.hwid_to_transport.insert(hwid.to_string(), transport);
        gauge!(DEVICES_REGISTERED.name).set(bindings.type_to_hwid.len() as f64);

        Ok(outcome)
    }

    /// Where `device_type` can currently be reached.
    pub fn get_full_address(&self, device_type: DeviceType) -> Option<FullAddress> {
        let bindings = self.bindings.read();
        let hwid = bindings.type_to_hwid.get(&device_type)?;
        bindings.full_address(hwid)
    }

    /// The device type registered at `address`.
    pub fn get_device_type(&self, address: &FullAddress) -> Option<DeviceType> {
        let bindings = self.bindings.read();
        let transport = bindings.hwid_to_transport.get(&address.device)?;
        if transport.name() != address.transport {
            return None;
        }
        bindings.hwid_to_type.get(&address.device).copied()
    }

    /// The transport a registered device is reachable on.
    pub fn get_transport(&self, address: &FullAddress) -> Option<Arc<dyn Transport>> {
        let bindings = self.bindings.read();
        bindings
            .hwid_to_transport
            .get(&address.device)
            .filter(|t| t.name() == address.transport)
            .cloned()
    }

    /// The device type bound to a hardware id, on any transport.
    pub fn device_type_of_hwid(&self, hwid: &str) -> Option<DeviceType> {
        self.bindings.read().hwid_to_type.get(hwid).copied()
    }

    /// Every registered device with its current address, in device type order.
    pub fn devices(&self) -> Vec<(DeviceType, FullAddress)> {
        let bindings = self.bindings.read();
        let mut devices: Vec<_> = bindings
            .type_to_hwid
            .iter()
            .filter_map(|(device_type, hwid)| Some((*device_type, bindings.full_address(hwid)?)))
            .collect();
        devices.sort();
        devices
    }

    pub fn len(&self) -> usize {
        self.bindings.read().type_to_hwid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
