//! Subpacket id constants and the length table.
//!
//! Ids fall into three disjoint ranges: control/compound ids
//! (`0x00..=0x06` and `0x30`), single-sensor ids (`0x10..=0x2F`) and
//! everything else, which is unknown.

// ============================================================================
// Control and Compound Ids
// ============================================================================

/// Periodic health report.
pub const STATUS_PING: u8 = 0x00;
/// Free-form ASCII message.
pub const MESSAGE: u8 = 0x01;
/// Flight event notification.
pub const EVENT: u8 = 0x02;
/// Device configuration, sent once when a device comes up.
pub const CONFIG: u8 = 0x03;
/// GPS fix.
pub const GPS: u8 = 0x04;
/// Orientation quaternion.
pub const ORIENTATION: u8 = 0x06;
/// Compound sensor snapshot.
pub const BULK_SENSOR: u8 = 0x30;

// ============================================================================
// Single-Sensor Ids
// ============================================================================

/// First id of the single-sensor block.
pub const SINGLE_SENSOR_FIRST: u8 = 0x10;
/// Last id of the single-sensor block.
pub const SINGLE_SENSOR_LAST: u8 = 0x2F;

pub const ACCELERATION_X: u8 = 0x10;
pub const ACCELERATION_Y: u8 = 0x11;
pub const ACCELERATION_Z: u8 = 0x12;
pub const PRESSURE: u8 = 0x13;
pub const BAROMETER_TEMPERATURE: u8 = 0x14;
pub const TEMPERATURE: u8 = 0x15;
pub const LATITUDE: u8 = 0x19;
pub const LONGITUDE: u8 = 0x1A;
pub const GPS_ALTITUDE: u8 = 0x1B;
pub const CALCULATED_ALTITUDE: u8 = 0x1C;
pub const STATE: u8 = 0x1D;
pub const VOLTAGE: u8 = 0x1E;
pub const GROUND_ALTITUDE: u8 = 0x1F;

// ============================================================================
// Lengths
// ============================================================================

/// Size of the id byte plus the timestamp.
pub const HEADER_LEN: usize = 5;

pub const STATUS_PING_LEN: usize = 5;
pub const EVENT_LEN: usize = 1;
pub const GPS_LEN: usize = 12;
pub const ORIENTATION_LEN: usize = 16;
pub const SINGLE_SENSOR_LEN: usize = 4;
pub const BULK_SENSOR_LEN: usize = 37;

/// Minimum config payload: is_sim + device type + 40-byte version id.
pub const CONFIG_MIN_LEN: usize = 42;
/// Length of the version id field of a config payload.
pub const VERSION_ID_LEN: usize = 40;

/// Payload layout class of a subpacket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubpacketKind {
    StatusPing,
    Message,
    Event,
    Config,
    Gps,
    Orientation,
    /// Any id in the single-sensor block, assigned or reserved.
    SingleSensor(u8),
    BulkSensor,
}

impl SubpacketKind {
    /// Classify an id. Returns `None` for ids outside the known set.
    pub fn from_id(id: u8) -> Option<SubpacketKind> {
        match id {
            STATUS_PING => Some(SubpacketKind::StatusPing),
            MESSAGE => Some(SubpacketKind::Message),
            EVENT => Some(SubpacketKind::Event),
            CONFIG => Some(SubpacketKind::Config),
            GPS => Some(SubpacketKind::Gps),
            ORIENTATION => Some(SubpacketKind::Orientation),
            BULK_SENSOR => Some(SubpacketKind::BulkSensor),
            SINGLE_SENSOR_FIRST..=SINGLE_SENSOR_LAST => Some(SubpacketKind::SingleSensor(id)),
            _ => None,
        }
    }

    /// The subpacket id for this kind.
    pub fn id(&self) -> u8 {
        match self {
            SubpacketKind::StatusPing => STATUS_PING,
            SubpacketKind::Message => MESSAGE,
            SubpacketKind::Event => EVENT,
            SubpacketKind::Config => CONFIG,
            SubpacketKind::Gps => GPS,
            SubpacketKind::Orientation => ORIENTATION,
            SubpacketKind::SingleSensor(id) => *id,
            SubpacketKind::BulkSensor => BULK_SENSOR,
        }
    }

    /// Payload length for constant-length kinds, `None` when a length byte follows
    /// the timestamp.
    pub fn constant_length(&self) -> Option<usize> {
        match self {
            SubpacketKind::StatusPing => Some(STATUS_PING_LEN),
            SubpacketKind::Message | SubpacketKind::Config => None,
            SubpacketKind::Event => Some(EVENT_LEN),
            SubpacketKind::Gps => Some(GPS_LEN),
            SubpacketKind::Orientation => Some(ORIENTATION_LEN),
            SubpacketKind::SingleSensor(_) => Some(SINGLE_SENSOR_LEN),
            SubpacketKind::BulkSensor => Some(BULK_SENSOR_LEN),
        }
    }
}

/// Whether `id` belongs to the known-id set.
pub fn is_known(id: u8) -> bool {
    SubpacketKind::from_id(id).is_some()
}
