//! Typed subpackets and the bundles they flatten into.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::ids::{self, SubpacketKind};
use crate::types::{
    DataEntryId, DataValue, DeviceType, EventKind, FlightState, StatusLevel,
    OTHER_STATUS_FIELDS, SENSOR_STATUS_FIELDS,
};

// ============================================================================
// Subpacket Model
// ============================================================================

/// One decoded subpacket.
#[derive(Debug, Clone, PartialEq)]
pub struct Subpacket {
    /// Firmware millisecond counter at the time the subpacket was produced.
    pub timestamp_ms: u32,
    /// Decoded payload.
    pub body: SubpacketBody,
}

/// Payload of a subpacket, one variant per layout class.
#[derive(Debug, Clone, PartialEq)]
pub enum SubpacketBody {
    StatusPing(StatusPing),
    Message(String),
    Event(EventKind),
    Config(ConfigInfo),
    Gps(GpsFix),
    Orientation([f32; 4]),
    /// Any id in the single-sensor block. Ids without an assigned field
    /// flatten into an empty bundle.
    SingleSensor { id: u8, value: f32 },
    BulkSensor(BulkSensor),
}

/// Status ping payload.
///
/// Both bitfields are MSB-first: sensor `i` is bit `0x8000 >> i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPing {
    pub level: StatusLevel,
    pub sensor_status: u16,
    pub other_status: u16,
}

impl StatusPing {
    /// Whether sensor bit `index` is set.
    pub fn sensor_ok(&self, index: usize) -> bool {
        bit_set(self.sensor_status, index)
    }

    /// Whether other-status bit `index` is set.
    pub fn other_ok(&self, index: usize) -> bool {
        bit_set(self.other_status, index)
    }
}

fn bit_set(field: u16, index: usize) -> bool {
    index < 16 && field & (0x8000 >> index) != 0
}

/// Config payload announced by a device when it comes up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigInfo {
    pub is_sim: bool,
    pub device_type: DeviceType,
    /// Firmware version string with trailing NUL padding removed.
    pub version_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
}

/// Compound sensor snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkSensor {
    pub calculated_altitude: f32,
    pub acceleration: [f32; 3],
    pub orientation: [f32; 3],
    pub latitude: f32,
    pub longitude: f32,
    pub state: FlightState,
}

impl SubpacketBody {
    /// Layout class of this body.
    pub fn kind(&self) -> SubpacketKind {
        match self {
            SubpacketBody::StatusPing(_) => SubpacketKind::StatusPing,
            SubpacketBody::Message(_) => SubpacketKind::Message,
            SubpacketBody::Event(_) => SubpacketKind::Event,
            SubpacketBody::Config(_) => SubpacketKind::Config,
            SubpacketBody::Gps(_) => SubpacketKind::Gps,
            SubpacketBody::Orientation(_) => SubpacketKind::Orientation,
            SubpacketBody::SingleSensor { id, .. } => SubpacketKind::SingleSensor(*id),
            SubpacketBody::BulkSensor(_) => SubpacketKind::BulkSensor,
        }
    }

    /// Subpacket id this body is sent under.
    pub fn id(&self) -> u8 {
        self.kind().id()
    }
}

impl Subpacket {
    pub fn new(timestamp_ms: u32, body: SubpacketBody) -> Self {
        Subpacket { timestamp_ms, body }
    }

    /// Flatten into a bundle. `TIME` is always present.
    pub fn into_bundle(self) -> Bundle {
        let mut bundle = Bundle::new();

        match self.body {
            SubpacketBody::StatusPing(ping) => {
                bundle.insert(DataEntryId::OverallStatus, DataValue::StatusLevel(ping.level));
                for (i, field) in SENSOR_STATUS_FIELDS.iter().enumerate() {
                    bundle.insert(*field, DataValue::Bool(ping.sensor_ok(i)));
                }
                for (i, field) in OTHER_STATUS_FIELDS.iter().enumerate() {
                    bundle.insert(*field, DataValue::Bool(ping.other_ok(i)));
                }
            }
            SubpacketBody::Message(text) => {
                bundle.insert(DataEntryId::Message, DataValue::Text(text));
            }
            SubpacketBody::Event(kind) => {
                let value = match kind {
                    EventKind::Unknown(code) => DataValue::UInt(u64::from(code)),
                    known => DataValue::Event(known),
                };
                bundle.insert(DataEntryId::Event, value);
            }
            SubpacketBody::Config(config) => {
                bundle.insert(DataEntryId::IsSim, DataValue::Bool(config.is_sim));
                bundle.insert(DataEntryId::DeviceType, DataValue::DeviceType(config.device_type));
                bundle.insert(DataEntryId::VersionId, DataValue::Text(config.version_id));
            }
            SubpacketBody::Gps(fix) => {
                bundle.insert(DataEntryId::Latitude, DataValue::Float(fix.latitude));
                bundle.insert(DataEntryId::Longitude, DataValue::Float(fix.longitude));
                bundle.insert(DataEntryId::GpsAltitude, DataValue::Float(fix.altitude));
            }
            SubpacketBody::Orientation(q) => {
                bundle.insert(DataEntryId::Orientation1, DataValue::Float(q[0]));
                bundle.insert(DataEntryId::Orientation2, DataValue::Float(q[1]));
                bundle.insert(DataEntryId::Orientation3, DataValue::Float(q[2]));
                bundle.insert(DataEntryId::Orientation4, DataValue::Float(q[3]));
            }
            SubpacketBody::SingleSensor { id, value } => {
                if let Some(field) = DataEntryId::from_single_sensor_id(id) {
                    bundle.insert(field, DataValue::Float(value));
                }
            }
            SubpacketBody::BulkSensor(bulk) => {
                let floats = [
                    (DataEntryId::CalculatedAltitude, bulk.calculated_altitude),
                    (DataEntryId::AccelerationX, bulk.acceleration[0]),
                    (DataEntryId::AccelerationY, bulk.acceleration[1]),
                    (DataEntryId::AccelerationZ, bulk.acceleration[2]),
                    (DataEntryId::Orientation1, bulk.orientation[0]),
                    (DataEntryId::Orientation2, bulk.orientation[1]),
                    (DataEntryId::Orientation3, bulk.orientation[2]),
                    (DataEntryId::Latitude, bulk.latitude),
                    (DataEntryId::Longitude, bulk.longitude),
                ];
                for (field, value) in floats {
                    bundle.insert(field, DataValue::Float(value));
                }
                bundle.insert(DataEntryId::State, DataValue::FlightState(bulk.state));
            }
        }

        bundle.set_time(self.timestamp_ms);
        bundle
    }
}

/// Whether a single-sensor id has an assigned field.
pub fn is_assigned_single_sensor(id: u8) -> bool {
    (ids::SINGLE_SENSOR_FIRST..=ids::SINGLE_SENSOR_LAST).contains(&id)
        && DataEntryId::from_single_sensor_id(id).is_some()
}

// ============================================================================
// Bundle
// ============================================================================

/// Set of `(DataEntryId, value)` pairs decoded from one subpacket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    entries: BTreeMap<DataEntryId, DataValue>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: DataEntryId, value: DataValue) -> Option<DataValue> {
        self.entries.insert(id, value)
    }

    pub fn get(&self, id: DataEntryId) -> Option<&DataValue> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: DataEntryId) -> Option<DataValue> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: DataEntryId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in `DataEntryId` order.
    pub fn iter(&self) -> btree_map::Iter<'_, DataEntryId, DataValue> {
        self.entries.iter()
    }

    /// The `TIME` entry, if present.
    pub fn time(&self) -> Option<u32> {
        self.get(DataEntryId::Time)
            .and_then(DataValue::as_u64)
            .and_then(|t| u32::try_from(t).ok())
    }

    pub fn set_time(&mut self, timestamp_ms: u32) {
        self.insert(DataEntryId::Time, DataValue::UInt(u64::from(timestamp_ms)));
    }

    /// The announced device type, if this bundle came from a config subpacket.
    pub fn device_type(&self) -> Option<DeviceType> {
        match self.get(DataEntryId::DeviceType) {
            Some(DataValue::DeviceType(device)) => Some(*device),
            _ => None,
        }
    }

    /// The calculated altitude, if present.
    pub fn calculated_altitude(&self) -> Option<f32> {
        self.get(DataEntryId::CalculatedAltitude)
            .and_then(DataValue::as_f32)
    }
}

impl FromIterator<(DataEntryId, DataValue)> for Bundle {
    fn from_iter<I: IntoIterator<Item = (DataEntryId, DataValue)>>(iter: I) -> Self {
        Bundle {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Bundle {
    type Item = (DataEntryId, DataValue);
    type IntoIter = btree_map::IntoIter<DataEntryId, DataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Bundle {
    type Item = (&'a DataEntryId, &'a DataValue);
    type IntoIter = btree_map::Iter<'a, DataEntryId, DataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
