//! Operator command codes sent over the radio.
//!
//! Each command is a single byte. Sensor request codes equal the subpacket id
//! the rocket answers with.

use std::fmt;

use crate::ids;

/// Commands the ground station can send to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Arm,
    Disarm,
    Config,
    Ping,
    Bulk,
    Gps,
    Orient,
    AccelX,
    AccelY,
    AccelZ,
    BaroPres,
    BaroTemp,
    Temp,
    Lat,
    Lon,
    GpsAlt,
    Alt,
    State,
    Volt,
    Ground,
}

impl CommandType {
    /// Every command, in code table order.
    pub const ALL: [CommandType; 20] = [
        CommandType::Arm,
        CommandType::Disarm,
        CommandType::Config,
        CommandType::Ping,
        CommandType::Bulk,
        CommandType::Gps,
        CommandType::Orient,
        CommandType::AccelX,
        CommandType::AccelY,
        CommandType::AccelZ,
        CommandType::BaroPres,
        CommandType::BaroTemp,
        CommandType::Temp,
        CommandType::Lat,
        CommandType::Lon,
        CommandType::GpsAlt,
        CommandType::Alt,
        CommandType::State,
        CommandType::Volt,
        CommandType::Ground,
    ];

    /// One-byte wire code.
    pub fn code(&self) -> u8 {
        match self {
            CommandType::Arm => 0x41,
            CommandType::Disarm => 0x44,
            CommandType::Config => 0x43,
            CommandType::Ping => 0x50,
            CommandType::Bulk => ids::BULK_SENSOR,
            CommandType::Gps => ids::GPS,
            CommandType::Orient => ids::ORIENTATION,
            CommandType::AccelX => ids::ACCELERATION_X,
            CommandType::AccelY => ids::ACCELERATION_Y,
            CommandType::AccelZ => ids::ACCELERATION_Z,
            CommandType::BaroPres => ids::PRESSURE,
            CommandType::BaroTemp => ids::BAROMETER_TEMPERATURE,
            CommandType::Temp => ids::TEMPERATURE,
            CommandType::Lat => ids::LATITUDE,
            CommandType::Lon => ids::LONGITUDE,
            CommandType::GpsAlt => ids::GPS_ALTITUDE,
            CommandType::Alt => ids::CALCULATED_ALTITUDE,
            CommandType::State => ids::STATE,
            CommandType::Volt => ids::VOLTAGE,
            CommandType::Ground => ids::GROUND_ALTITUDE,
        }
    }

    /// Command name as typed by the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Arm => "ARM",
            CommandType::Disarm => "DISARM",
            CommandType::Config => "CONFIG",
            CommandType::Ping => "PING",
            CommandType::Bulk => "BULK",
            CommandType::Gps => "GPS",
            CommandType::Orient => "ORIENT",
            CommandType::AccelX => "ACCELX",
            CommandType::AccelY => "ACCELY",
            CommandType::AccelZ => "ACCELZ",
            CommandType::BaroPres => "BAROPRES",
            CommandType::BaroTemp => "BAROTEMP",
            CommandType::Temp => "TEMP",
            CommandType::Lat => "LAT",
            CommandType::Lon => "LON",
            CommandType::GpsAlt => "GPSALT",
            CommandType::Alt => "ALT",
            CommandType::State => "STATE",
            CommandType::Volt => "VOLT",
            CommandType::Ground => "GROUND",
        }
    }

    /// Look up a command by name, ignoring case.
    pub fn from_name(name: &str) -> Option<CommandType> {
        CommandType::ALL
            .into_iter()
            .find(|cmd| cmd.as_str().eq_ignore_ascii_case(name))
    }

    /// Look up a command by its wire code.
    pub fn from_code(code: u8) -> Option<CommandType> {
        CommandType::ALL.into_iter().find(|cmd| cmd.code() == code)
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(CommandType::Arm.code(), 0x41);
        assert_eq!(CommandType::Disarm.code(), 0x44);
        assert_eq!(CommandType::Config.code(), 0x43);
        assert_eq!(CommandType::Ping.code(), 0x50);
        assert_eq!(CommandType::Lat.code(), 0x19);
        assert_eq!(CommandType::Bulk.code(), 0x30);
    }

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in CommandType::ALL.iter().enumerate() {
            for b in &CommandType::ALL[i + 1..] {
                assert_ne!(a.code(), b.code(), "{a} and {b} share a code");
            }
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(CommandType::from_name("arm"), Some(CommandType::Arm));
        assert_eq!(CommandType::from_name("BaroTemp"), Some(CommandType::BaroTemp));
        assert_eq!(CommandType::from_name("launch"), None);
        assert_eq!(CommandType::from_code(0x1E), Some(CommandType::Volt));
    }
}
