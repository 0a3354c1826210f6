//! Telemetry field ids, values and the closed enumerations they carry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::ids;

// ============================================================================
// Data Entry Ids
// ============================================================================

/// Logical telemetry field name.
///
/// Every decoded value in a [`Bundle`](crate::Bundle) is keyed by one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataEntryId {
    Time,
    AccelerationX,
    AccelerationY,
    AccelerationZ,
    Pressure,
    BarometerTemperature,
    Temperature,
    Latitude,
    Longitude,
    GpsAltitude,
    CalculatedAltitude,
    State,
    Voltage,
    GroundAltitude,
    Orientation1,
    Orientation2,
    Orientation3,
    Orientation4,
    Message,
    Event,
    Config,
    BulkSensor,
    IsSim,
    DeviceType,
    VersionId,
    OverallStatus,
    BarometerStatus,
    GpsStatus,
    AccelerometerStatus,
    ImuStatus,
    TemperatureStatus,
    DrogueIgniterContinuity,
    MainIgniterContinuity,
    FileOpenSuccess,
}

impl DataEntryId {
    /// Upper-case constant name, used in CSV headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataEntryId::Time => "TIME",
            DataEntryId::AccelerationX => "ACCELERATION_X",
            DataEntryId::AccelerationY => "ACCELERATION_Y",
            DataEntryId::AccelerationZ => "ACCELERATION_Z",
            DataEntryId::Pressure => "PRESSURE",
            DataEntryId::BarometerTemperature => "BAROMETER_TEMPERATURE",
            DataEntryId::Temperature => "TEMPERATURE",
            DataEntryId::Latitude => "LATITUDE",
            DataEntryId::Longitude => "LONGITUDE",
            DataEntryId::GpsAltitude => "GPS_ALTITUDE",
            DataEntryId::CalculatedAltitude => "CALCULATED_ALTITUDE",
            DataEntryId::State => "STATE",
            DataEntryId::Voltage => "VOLTAGE",
            DataEntryId::GroundAltitude => "GROUND_ALTITUDE",
            DataEntryId::Orientation1 => "ORIENTATION_1",
            DataEntryId::Orientation2 => "ORIENTATION_2",
            DataEntryId::Orientation3 => "ORIENTATION_3",
            DataEntryId::Orientation4 => "ORIENTATION_4",
            DataEntryId::Message => "MESSAGE",
            DataEntryId::Event => "EVENT",
            DataEntryId::Config => "CONFIG",
            DataEntryId::BulkSensor => "BULK_SENSOR",
            DataEntryId::IsSim => "IS_SIM",
            DataEntryId::DeviceType => "DEVICE_TYPE",
            DataEntryId::VersionId => "VERSION_ID",
            DataEntryId::OverallStatus => "OVERALL_STATUS",
            DataEntryId::BarometerStatus => "BAROMETER_STATUS",
            DataEntryId::GpsStatus => "GPS_STATUS",
            DataEntryId::AccelerometerStatus => "ACCELEROMETER_STATUS",
            DataEntryId::ImuStatus => "IMU_STATUS",
            DataEntryId::TemperatureStatus => "TEMPERATURE_STATUS",
            DataEntryId::DrogueIgniterContinuity => "DROGUE_IGNITER_CONTINUITY",
            DataEntryId::MainIgniterContinuity => "MAIN_IGNITER_CONTINUITY",
            DataEntryId::FileOpenSuccess => "FILE_OPEN_SUCCESS",
        }
    }

    /// The field carried by a single-sensor subpacket id, if the id is assigned.
    pub fn from_single_sensor_id(id: u8) -> Option<DataEntryId> {
        match id {
            ids::ACCELERATION_X => Some(DataEntryId::AccelerationX),
            ids::ACCELERATION_Y => Some(DataEntryId::AccelerationY),
            ids::ACCELERATION_Z => Some(DataEntryId::AccelerationZ),
            ids::PRESSURE => Some(DataEntryId::Pressure),
            ids::BAROMETER_TEMPERATURE => Some(DataEntryId::BarometerTemperature),
            ids::TEMPERATURE => Some(DataEntryId::Temperature),
            ids::LATITUDE => Some(DataEntryId::Latitude),
            ids::LONGITUDE => Some(DataEntryId::Longitude),
            ids::GPS_ALTITUDE => Some(DataEntryId::GpsAltitude),
            ids::CALCULATED_ALTITUDE => Some(DataEntryId::CalculatedAltitude),
            ids::STATE => Some(DataEntryId::State),
            ids::VOLTAGE => Some(DataEntryId::Voltage),
            ids::GROUND_ALTITUDE => Some(DataEntryId::GroundAltitude),
            _ => None,
        }
    }

    /// The single-sensor subpacket id for this field, if it has one.
    pub fn single_sensor_id(&self) -> Option<u8> {
        match self {
            DataEntryId::AccelerationX => Some(ids::ACCELERATION_X),
            DataEntryId::AccelerationY => Some(ids::ACCELERATION_Y),
            DataEntryId::AccelerationZ => Some(ids::ACCELERATION_Z),
            DataEntryId::Pressure => Some(ids::PRESSURE),
            DataEntryId::BarometerTemperature => Some(ids::BAROMETER_TEMPERATURE),
            DataEntryId::Temperature => Some(ids::TEMPERATURE),
            DataEntryId::Latitude => Some(ids::LATITUDE),
            DataEntryId::Longitude => Some(ids::LONGITUDE),
            DataEntryId::GpsAltitude => Some(ids::GPS_ALTITUDE),
            DataEntryId::CalculatedAltitude => Some(ids::CALCULATED_ALTITUDE),
            DataEntryId::State => Some(ids::STATE),
            DataEntryId::Voltage => Some(ids::VOLTAGE),
            DataEntryId::GroundAltitude => Some(ids::GROUND_ALTITUDE),
            _ => None,
        }
    }
}

impl fmt::Display for DataEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-sensor status fields of a status ping, in bitfield order.
pub const SENSOR_STATUS_FIELDS: [DataEntryId; 5] = [
    DataEntryId::BarometerStatus,
    DataEntryId::GpsStatus,
    DataEntryId::AccelerometerStatus,
    DataEntryId::ImuStatus,
    DataEntryId::TemperatureStatus,
];

/// Other status fields of a status ping, in bitfield order.
pub const OTHER_STATUS_FIELDS: [DataEntryId; 3] = [
    DataEntryId::DrogueIgniterContinuity,
    DataEntryId::MainIgniterContinuity,
    DataEntryId::FileOpenSuccess,
];

// ============================================================================
// Closed Enumerations
// ============================================================================

/// Flight state reported by the flight computer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightState {
    Standby,
    Armed,
    PoweredAscent,
    MachLock,
    Coast,
    Apogee,
    DrogueDescent,
    MainDescent,
    Landed,
    WinterContingency,
    Test,
    /// A state byte outside the table.
    Unknown(u8),
}

impl FlightState {
    /// Wire value of the state.
    pub fn code(&self) -> u8 {
        match self {
            FlightState::Standby => 0,
            FlightState::Armed => 1,
            FlightState::PoweredAscent => 2,
            FlightState::MachLock => 3,
            FlightState::Coast => 4,
            FlightState::Apogee => 5,
            FlightState::DrogueDescent => 6,
            FlightState::MainDescent => 7,
            FlightState::Landed => 8,
            FlightState::WinterContingency => 9,
            FlightState::Test => 10,
            FlightState::Unknown(code) => *code,
        }
    }

    /// Constant name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            FlightState::Standby => "STANDBY",
            FlightState::Armed => "ARMED",
            FlightState::PoweredAscent => "POWERED_ASCENT",
            FlightState::MachLock => "MACH_LOCK",
            FlightState::Coast => "COAST",
            FlightState::Apogee => "APOGEE",
            FlightState::DrogueDescent => "DROGUE_DESCENT",
            FlightState::MainDescent => "MAIN_DESCENT",
            FlightState::Landed => "LANDED",
            FlightState::WinterContingency => "WINTER_CONTINGENCY",
            FlightState::Test => "TEST",
            FlightState::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for FlightState {
    fn from(code: u8) -> Self {
        match code {
            0 => FlightState::Standby,
            1 => FlightState::Armed,
            2 => FlightState::PoweredAscent,
            3 => FlightState::MachLock,
            4 => FlightState::Coast,
            5 => FlightState::Apogee,
            6 => FlightState::DrogueDescent,
            7 => FlightState::MainDescent,
            8 => FlightState::Landed,
            9 => FlightState::WinterContingency,
            10 => FlightState::Test,
            _ => FlightState::Unknown(code),
        }
    }
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightState::Unknown(code) => write!(f, "UNKNOWN_{code}"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Overall health level from the two low bits of a status ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLevel {
    Nominal,
    NonCritical,
    Critical,
    /// The unassigned `10` pattern.
    Unknown(u8),
}

impl StatusLevel {
    /// Two-bit wire value.
    pub fn code(&self) -> u8 {
        match self {
            StatusLevel::Nominal => 0b00,
            StatusLevel::NonCritical => 0b01,
            StatusLevel::Critical => 0b11,
            StatusLevel::Unknown(code) => *code & 0b11,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatusLevel::Nominal => "NOMINAL",
            StatusLevel::NonCritical => "NON_CRITICAL",
            StatusLevel::Critical => "CRITICAL",
            StatusLevel::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for StatusLevel {
    /// Only the two low bits are considered.
    fn from(byte: u8) -> Self {
        match byte & 0b11 {
            0b00 => StatusLevel::Nominal,
            0b01 => StatusLevel::NonCritical,
            0b11 => StatusLevel::Critical,
            other => StatusLevel::Unknown(other),
        }
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLevel::Unknown(code) => write!(f, "UNKNOWN_{code}"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Flight event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Armed,
    Disarmed,
    Launch,
    Apogee,
    DrogueDeployed,
    MainDeployed,
    Landed,
    IgnitorFired,
    Unknown(u8),
}

impl EventKind {
    pub fn code(&self) -> u8 {
        match self {
            EventKind::Armed => 0x00,
            EventKind::Disarmed => 0x01,
            EventKind::Launch => 0x02,
            EventKind::Apogee => 0x03,
            EventKind::DrogueDeployed => 0x04,
            EventKind::MainDeployed => 0x05,
            EventKind::Landed => 0x06,
            EventKind::IgnitorFired => 0x07,
            EventKind::Unknown(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Armed => "ARMED",
            EventKind::Disarmed => "DISARMED",
            EventKind::Launch => "LAUNCH",
            EventKind::Apogee => "APOGEE",
            EventKind::DrogueDeployed => "DROGUE_DEPLOYED",
            EventKind::MainDeployed => "MAIN_DEPLOYED",
            EventKind::Landed => "LANDED",
            EventKind::IgnitorFired => "IGNITOR_FIRED",
            EventKind::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for EventKind {
    fn from(code: u8) -> Self {
        match code {
            0x00 => EventKind::Armed,
            0x01 => EventKind::Disarmed,
            0x02 => EventKind::Launch,
            0x03 => EventKind::Apogee,
            0x04 => EventKind::DrogueDeployed,
            0x05 => EventKind::MainDeployed,
            0x06 => EventKind::Landed,
            0x07 => EventKind::IgnitorFired,
            _ => EventKind::Unknown(code),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Unknown(code) => write!(f, "{code}"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Logical role of a device in the rocket.
///
/// A device announces its type in its config subpacket. The ground station
/// binds each type to at most one physical device per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceType {
    Stage1Flight,
    Stage2Flight,
    Copilot,
    WhistlerBlackcombFirmware,
    /// A device-type byte this build does not know.
    Unknown(u8),
}

impl DeviceType {
    /// All known device types.
    pub const ALL: [DeviceType; 4] = [
        DeviceType::Stage1Flight,
        DeviceType::Stage2Flight,
        DeviceType::Copilot,
        DeviceType::WhistlerBlackcombFirmware,
    ];

    /// Wire value of the device type.
    pub fn code(&self) -> u8 {
        match self {
            DeviceType::Stage1Flight => 0x00,
            DeviceType::Stage2Flight => 0x01,
            DeviceType::Copilot => 0x02,
            DeviceType::WhistlerBlackcombFirmware => 0x03,
            DeviceType::Unknown(code) => *code,
        }
    }

    /// Upper-case constant name, used in CSV headers and commands.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceType::Stage1Flight => "STAGE1_FLIGHT",
            DeviceType::Stage2Flight => "STAGE2_FLIGHT",
            DeviceType::Copilot => "COPILOT",
            DeviceType::WhistlerBlackcombFirmware => "WHISTLER_BLACKCOMB_FIRMWARE",
            DeviceType::Unknown(_) => "UNKNOWN",
        }
    }

    /// Look up a known device type by name, ignoring case.
    pub fn from_name(name: &str) -> Option<DeviceType> {
        DeviceType::ALL
            .into_iter()
            .find(|device| device.name().eq_ignore_ascii_case(name))
    }

    /// Whether this is a known device type.
    pub fn is_known(&self) -> bool {
        !matches!(self, DeviceType::Unknown(_))
    }

    /// Reject [`DeviceType::Unknown`] with [`CodecError::UnknownDeviceType`].
    pub fn known(self) -> Result<DeviceType, CodecError> {
        match self {
            DeviceType::Unknown(code) => Err(CodecError::UnknownDeviceType(code)),
            known => Ok(known),
        }
    }
}

impl From<u8> for DeviceType {
    fn from(code: u8) -> Self {
        match code {
            0x00 => DeviceType::Stage1Flight,
            0x01 => DeviceType::Stage2Flight,
            0x02 => DeviceType::Copilot,
            0x03 => DeviceType::WhistlerBlackcombFirmware,
            _ => DeviceType::Unknown(code),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Unknown(code) => write!(f, "UNKNOWN_0x{code:02X}"),
            _ => f.write_str(self.name()),
        }
    }
}

// ============================================================================
// Data Values
// ============================================================================

/// One decoded telemetry value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Int(i64),
    UInt(u64),
    Float(f32),
    Bool(bool),
    Text(String),
    FlightState(FlightState),
    StatusLevel(StatusLevel),
    Event(EventKind),
    DeviceType(DeviceType),
}

impl DataValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            DataValue::Float(v) => Some(*v),
            DataValue::Int(v) => Some(*v as f32),
            DataValue::UInt(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Unsigned integer view of the value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::UInt(v) => Some(*v),
            DataValue::Int(v) if *v >= 0 => Some(*v as u64),
            DataValue::Bool(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for DataValue {
    /// Enum values print as their constant names; this is the CSV cell format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Int(v) => write!(f, "{v}"),
            DataValue::UInt(v) => write!(f, "{v}"),
            DataValue::Float(v) => write!(f, "{v}"),
            DataValue::Bool(v) => write!(f, "{}", u8::from(*v)),
            DataValue::Text(s) => f.write_str(s),
            DataValue::FlightState(s) => write!(f, "{s}"),
            DataValue::StatusLevel(s) => write!(f, "{s}"),
            DataValue::Event(e) => write!(f, "{e}"),
            DataValue::DeviceType(d) => write!(f, "{d}"),
        }
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        DataValue::Float(v)
    }
}

impl From<u64> for DataValue {
    fn from(v: u64) -> Self {
        DataValue::UInt(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::Text(v.to_string())
    }
}
