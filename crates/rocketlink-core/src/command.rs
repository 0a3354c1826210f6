//! Operator command parsing.

use rocketlink_packet::{CommandType, DeviceType};

use crate::device_manager::DeviceManager;
use crate::error::CommandParsingError;

/// A parsed `DEVICE.COMMAND` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub device_type: DeviceType,
    pub command: CommandType,
    /// Bytes to put on the radio.
    pub wire: Vec<u8>,
}

/// Parse `DEVICE.COMMAND` (case-insensitive) for a registered device.
pub fn parse_command(text: &str, devices: &DeviceManager) -> Result<ParsedCommand, CommandParsingError> {
    let text = text.trim();
    let (device, command) = text
        .split_once('.')
        .ok_or_else(|| CommandParsingError::new(format!("expected DEVICE.COMMAND, got '{text}'")))?;
    if command.contains('.') {
        return Err(CommandParsingError::new(format!(
            "expected a single '.' in '{text}'"
        )));
    }

    let device_type = DeviceType::from_name(device.trim())
        .ok_or_else(|| CommandParsingError::new(format!("unknown device '{}'", device.trim())))?;
    let command = CommandType::from_name(command.trim())
        .ok_or_else(|| CommandParsingError::new(format!("unknown command '{}'", command.trim())))?;

    if devices.get_full_address(device_type).is_none() {
        return Err(CommandParsingError::new(format!("{device_type} not yet registered")));
    }

    Ok(ParsedCommand {
        device_type,
        command,
        wire: vec![command.code()],
    })
}
