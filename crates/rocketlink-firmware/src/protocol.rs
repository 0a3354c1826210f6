//! Simulator sub-protocol between the firmware process and the ground.
//!
//! After the nibble decoding, the stream is a sequence of packets:
//!
//! ```text
//! +----+-------------+---------+
//! | id | length (BE) | payload |
//! | 1  | 2           | length  |
//! +----+-------------+---------+
//! ```
//!
//! Responses from the ground use the same framing.

use std::io::{self, Read, Write};

use bytes::{Buf, BufMut};
use rocketlink_packet::ByteOrderConfig;

use crate::error::FirmwareError;

pub const SYN: &[u8; 3] = b"SYN";
pub const ACK: &[u8; 3] = b"ACK";

pub const PACKET_CONFIG: u8 = 0x01;
pub const PACKET_BUZZER: u8 = 0x07;
pub const PACKET_PIN_MODE: u8 = 0x4D;
pub const PACKET_DIGITAL_WRITE: u8 = 0x50;
pub const PACKET_RADIO: u8 = 0x52;
pub const PACKET_ANALOG_READ: u8 = 0x61;
pub const PACKET_SENSOR_READ: u8 = 0x73;
pub const PACKET_TIME_UPDATE: u8 = 0x74;

/// Payload length of the config packet.
pub const CONFIG_LEN: usize = 8;
/// Low byte of the integer probe word when integers are big-endian.
pub const CONFIG_BIG_ENDIAN_INTS: u8 = 0x04;
/// Low byte of the float probe word when floats are big-endian.
pub const CONFIG_BIG_ENDIAN_FLOATS: u8 = 0xC0;

/// One framed sub-protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(id: u8, payload: impl Into<Vec<u8>>) -> Self {
        Packet {
            id,
            payload: payload.into(),
        }
    }

    /// Framed bytes, before nibble encoding.
    pub fn encode(&self) -> Result<Vec<u8>, FirmwareError> {
        let len = u16::try_from(self.payload.len()).map_err(|_| {
            FirmwareError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("packet 0x{:02X} payload too long: {}", self.id, self.payload.len()),
            ))
        })?;
        let mut buf = Vec::with_capacity(self.payload.len() + 3);
        buf.put_u8(self.id);
        buf.put_u16(len);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), FirmwareError> {
        writer.write_all(&self.encode()?)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one packet. `None` at a clean end of stream before the id byte.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Packet>, FirmwareError> {
        let mut id = [0u8; 1];
        if reader.read(&mut id)? == 0 {
            return Ok(None);
        }
        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        let mut payload = vec![0u8; usize::from(u16::from_be_bytes(len))];
        reader.read_exact(&mut payload)?;
        Ok(Some(Packet { id: id[0], payload }))
    }
}

// ============================================================================
// Config
// ============================================================================

/// Byte order announced by the firmware's config packet.
pub fn parse_config(packet: &Packet) -> Result<ByteOrderConfig, FirmwareError> {
    if packet.id != PACKET_CONFIG {
        return Err(FirmwareError::invalid_config(format!(
            "expected packet 0x{PACKET_CONFIG:02X}, got 0x{:02X}",
            packet.id
        )));
    }
    if packet.payload.len() != CONFIG_LEN {
        return Err(FirmwareError::invalid_config(format!(
            "expected {CONFIG_LEN} bytes, got {}",
            packet.payload.len()
        )));
    }
    Ok(ByteOrderConfig::new(
        packet.payload[3] == CONFIG_BIG_ENDIAN_INTS,
        packet.payload[7] == CONFIG_BIG_ENDIAN_FLOATS,
    ))
}

/// The config packet a firmware with byte order `cfg` sends.
pub fn config_packet(cfg: &ByteOrderConfig) -> Packet {
    let ints = if cfg.big_endian_ints {
        [0x01, 0x02, 0x03, CONFIG_BIG_ENDIAN_INTS]
    } else {
        [CONFIG_BIG_ENDIAN_INTS, 0x03, 0x02, 0x01]
    };
    let floats = if cfg.big_endian_floats {
        [0x00, 0x00, 0x00, CONFIG_BIG_ENDIAN_FLOATS]
    } else {
        [CONFIG_BIG_ENDIAN_FLOATS, 0x00, 0x00, 0x00]
    };
    let mut payload = Vec::with_capacity(CONFIG_LEN);
    payload.extend_from_slice(&ints);
    payload.extend_from_slice(&floats);
    Packet::new(PACKET_CONFIG, payload)
}

// ============================================================================
// Requests
// ============================================================================

/// A decoded packet from the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Buzzer { song: u8 },
    PinMode { pin: u8, output: bool },
    DigitalWrite { pin: u8, high: bool },
    /// Raw bytes the firmware wrote to its XBee.
    Radio(Vec<u8>),
    AnalogRead { pin: u8 },
    SensorRead { sensor: u8 },
    /// Milliseconds elapsed since the previous update.
    TimeUpdate { elapsed_ms: u32 },
    Unknown(Packet),
}

impl Request {
    /// Interpret `packet` using the negotiated byte order.
    pub fn parse(packet: Packet, cfg: &ByteOrderConfig) -> Result<Request, FirmwareError> {
        let short = |needed: usize| {
            FirmwareError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "packet 0x{:02X} needs {needed} bytes, got {}",
                    packet.id,
                    packet.payload.len()
                ),
            ))
        };
        let mut p = &packet.payload[..];
        let request = match packet.id {
            PACKET_BUZZER => Request::Buzzer {
                song: p.first().copied().ok_or_else(|| short(1))?,
            },
            PACKET_PIN_MODE => {
                if p.remaining() < 2 {
                    return Err(short(2));
                }
                Request::PinMode {
                    pin: p.get_u8(),
                    output: p.get_u8() != 0,
                }
            }
            PACKET_DIGITAL_WRITE => {
                if p.remaining() < 2 {
                    return Err(short(2));
                }
                Request::DigitalWrite {
                    pin: p.get_u8(),
                    high: p.get_u8() != 0,
                }
            }
            PACKET_RADIO => Request::Radio(packet.payload.clone()),
            PACKET_ANALOG_READ => Request::AnalogRead {
                pin: p.first().copied().ok_or_else(|| short(1))?,
            },
            PACKET_SENSOR_READ => Request::SensorRead {
                sensor: p.first().copied().ok_or_else(|| short(1))?,
            },
            PACKET_TIME_UPDATE => {
                let raw: [u8; 4] = p
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| short(4))?;
                Request::TimeUpdate {
                    elapsed_ms: cfg.read_u32(raw),
                }
            }
            _ => Request::Unknown(packet.clone()),
        };
        Ok(request)
    }
}

/// Analog read answer: 2-byte big-endian level.
pub fn analog_response(level: u16) -> Packet {
    Packet::new(PACKET_ANALOG_READ, level.to_be_bytes().to_vec())
}

/// Sensor read answer: every value as a float in the negotiated order.
pub fn sensor_response(values: &[f32], cfg: &ByteOrderConfig) -> Packet {
    let payload: Vec<u8> = values.iter().flat_map(|v| cfg.write_f32(*v)).collect();
    Packet::new(PACKET_SENSOR_READ, payload)
}

/// Time update answer: the new millisecond count.
pub fn time_response(millis: u32, cfg: &ByteOrderConfig) -> Packet {
    Packet::new(PACKET_TIME_UPDATE, cfg.write_u32(millis).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_framing() {
        let packet = Packet::new(PACKET_RADIO, vec![0x7E, 0x00]);
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes, vec![0x52, 0x00, 0x02, 0x7E, 0x00]);
        assert_eq!(Packet::read_from(&mut &bytes[..]).unwrap(), Some(packet));
        assert_eq!(Packet::read_from(&mut &[][..]).unwrap(), None);
        assert!(Packet::read_from(&mut &[0x52, 0x00, 0x05, 1][..]).is_err());
    }

    #[test]
    fn test_config_probe() {
        for cfg in [
            ByteOrderConfig::BIG_ENDIAN,
            ByteOrderConfig::LITTLE_ENDIAN,
            ByteOrderConfig::new(true, false),
        ] {
            assert_eq!(parse_config(&config_packet(&cfg)).unwrap(), cfg);
        }
        assert!(parse_config(&Packet::new(PACKET_CONFIG, vec![0; 7])).is_err());
        assert!(parse_config(&Packet::new(PACKET_RADIO, vec![0; 8])).is_err());
    }

    #[test]
    fn test_request_parsing() {
        let le = ByteOrderConfig::LITTLE_ENDIAN;
        assert_eq!(
            Request::parse(Packet::new(PACKET_TIME_UPDATE, vec![0x10, 0x27, 0, 0]), &le).unwrap(),
            Request::TimeUpdate { elapsed_ms: 10_000 }
        );
        assert_eq!(
            Request::parse(Packet::new(PACKET_DIGITAL_WRITE, vec![9, 1]), &le).unwrap(),
            Request::DigitalWrite { pin: 9, high: true }
        );
        assert!(Request::parse(Packet::new(PACKET_PIN_MODE, vec![9]), &le).is_err());
        assert!(matches!(
            Request::parse(Packet::new(0x99, vec![]), &le).unwrap(),
            Request::Unknown(Packet { id: 0x99, .. })
        ));
    }

    #[test]
    fn test_responses() {
        assert_eq!(analog_response(0x0203).payload, vec![0x02, 0x03]);
        let cfg = ByteOrderConfig::BIG_ENDIAN;
        assert_eq!(sensor_response(&[1.0], &cfg).payload, vec![0x3F, 0x80, 0, 0]);
        assert_eq!(time_response(1, &cfg).payload, vec![0, 0, 0, 1]);
    }
}
