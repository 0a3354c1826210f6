//! Subpacket extraction and the reference encoder.
//!
//! Decoding reads one subpacket at a time from a [`Cursor`] so a caller can
//! walk a radio payload holding several concatenated subpackets. The payload
//! of a subpacket is sliced off in full before its parser runs, so a parser
//! failure always leaves the cursor at the start of the next subpacket.

use std::io::Cursor;

use bytes::{Buf, BufMut};

use crate::byte_order::ByteOrderConfig;
use crate::error::{CodecError, Recovery};
use crate::ids::{self, SubpacketKind};
use crate::subpacket::{BulkSensor, Bundle, ConfigInfo, GpsFix, StatusPing, Subpacket, SubpacketBody};
use crate::types::{DeviceType, EventKind, FlightState, StatusLevel};

// ============================================================================
// Decoding
// ============================================================================

/// Read one subpacket and flatten it into a bundle carrying `TIME`.
pub fn extract(cursor: &mut Cursor<&[u8]>, cfg: &ByteOrderConfig) -> Result<Bundle, CodecError> {
    decode_subpacket(cursor, cfg).map(Subpacket::into_bundle)
}

/// Read one typed subpacket.
///
/// On [`CodecError::UnknownSubpacketId`] only the id byte has been consumed.
/// On [`CodecError::InvalidPayload`] the whole subpacket has been consumed.
pub fn decode_subpacket(
    cursor: &mut Cursor<&[u8]>,
    cfg: &ByteOrderConfig,
) -> Result<Subpacket, CodecError> {
    // 1. Subpacket id
    let id = take(cursor, 1)?[0];
    let kind = SubpacketKind::from_id(id).ok_or(CodecError::UnknownSubpacketId(id))?;

    // 2. Timestamp, always big-endian
    let timestamp_ms = take(cursor, 4)?.get_u32();

    // 3. Payload length, constant or prefixed
    let length = match kind.constant_length() {
        Some(length) => length,
        None => take(cursor, 1)?[0] as usize,
    };

    // 4. Payload
    let payload = take(cursor, length)?;
    let body = decode_body(kind, payload, cfg)?;

    Ok(Subpacket { timestamp_ms, body })
}

/// Take `n` bytes from the cursor, or fail without moving it.
fn take<'a>(cursor: &mut Cursor<&'a [u8]>, n: usize) -> Result<&'a [u8], CodecError> {
    let data: &'a [u8] = *cursor.get_ref();
    let start = (cursor.position() as usize).min(data.len());
    let available = data.len() - start;
    if available < n {
        return Err(CodecError::Truncated {
            offset: start as u64,
            needed: n,
            available,
        });
    }
    cursor.set_position((start + n) as u64);
    Ok(&data[start..start + n])
}

fn decode_body(
    kind: SubpacketKind,
    mut payload: &[u8],
    cfg: &ByteOrderConfig,
) -> Result<SubpacketBody, CodecError> {
    let id = kind.id();
    let body = match kind {
        SubpacketKind::StatusPing => SubpacketBody::StatusPing(StatusPing {
            level: StatusLevel::from(payload.get_u8()),
            sensor_status: payload.get_u16(),
            other_status: payload.get_u16(),
        }),
        SubpacketKind::Message => SubpacketBody::Message(decode_ascii(id, payload)?),
        SubpacketKind::Event => SubpacketBody::Event(EventKind::from(payload.get_u8())),
        SubpacketKind::Config => SubpacketBody::Config(decode_config(payload)?),
        SubpacketKind::Gps => SubpacketBody::Gps(GpsFix {
            latitude: read_f32(&mut payload, cfg),
            longitude: read_f32(&mut payload, cfg),
            altitude: read_f32(&mut payload, cfg),
        }),
        SubpacketKind::Orientation => SubpacketBody::Orientation([
            read_f32(&mut payload, cfg),
            read_f32(&mut payload, cfg),
            read_f32(&mut payload, cfg),
            read_f32(&mut payload, cfg),
        ]),
        SubpacketKind::SingleSensor(id) => SubpacketBody::SingleSensor {
            id,
            value: read_f32(&mut payload, cfg),
        },
        SubpacketKind::BulkSensor => {
            let calculated_altitude = read_f32(&mut payload, cfg);
            let acceleration = [
                read_f32(&mut payload, cfg),
                read_f32(&mut payload, cfg),
                read_f32(&mut payload, cfg),
            ];
            let orientation = [
                read_f32(&mut payload, cfg),
                read_f32(&mut payload, cfg),
                read_f32(&mut payload, cfg),
            ];
            let latitude = read_f32(&mut payload, cfg);
            let longitude = read_f32(&mut payload, cfg);
            let state = FlightState::from(payload.get_u8());
            SubpacketBody::BulkSensor(BulkSensor {
                calculated_altitude,
                acceleration,
                orientation,
                latitude,
                longitude,
                state,
            })
        }
    };
    Ok(body)
}

/// Payload lengths were checked by the caller, so every read here is in bounds.
fn read_f32(payload: &mut &[u8], cfg: &ByteOrderConfig) -> f32 {
    let mut raw = [0u8; 4];
    payload.copy_to_slice(&mut raw);
    cfg.read_f32(raw)
}

fn decode_ascii(id: u8, bytes: &[u8]) -> Result<String, CodecError> {
    if !bytes.is_ascii() {
        return Err(CodecError::invalid_payload(id, "non-ASCII text"));
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn decode_config(payload: &[u8]) -> Result<ConfigInfo, CodecError> {
    if payload.len() < ids::CONFIG_MIN_LEN {
        return Err(CodecError::invalid_payload(
            ids::CONFIG,
            format!(
                "config payload is {} bytes, need at least {}",
                payload.len(),
                ids::CONFIG_MIN_LEN
            ),
        ));
    }

    let is_sim = match payload[0] {
        0 => false,
        1 => true,
        other => {
            return Err(CodecError::invalid_payload(
                ids::CONFIG,
                format!("is_sim flag must be 0 or 1, got {other}"),
            ))
        }
    };
    let device_type = DeviceType::from(payload[1]);
    let version = &payload[2..2 + ids::VERSION_ID_LEN];
    let version_id = decode_ascii(ids::CONFIG, version)?
        .trim_end_matches('\0')
        .to_string();

    Ok(ConfigInfo {
        is_sim,
        device_type,
        version_id,
    })
}

// ============================================================================
// Chunk Iteration
// ============================================================================

/// Iterator over every subpacket in one radio payload.
///
/// Errors are yielded in place and the iterator resumes according to
/// [`CodecError::recovery`], so a bad subpacket never hides the ones after it.
pub struct ExtractAll<'a> {
    cursor: Cursor<&'a [u8]>,
    cfg: ByteOrderConfig,
}

/// Walk every subpacket in `data`.
pub fn extract_all<'a>(data: &'a [u8], cfg: &ByteOrderConfig) -> ExtractAll<'a> {
    ExtractAll {
        cursor: Cursor::new(data),
        cfg: *cfg,
    }
}

impl ExtractAll<'_> {
    /// Current offset into the payload.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }
}

impl Iterator for ExtractAll<'_> {
    type Item = Result<Bundle, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.cursor.get_ref().len() as u64;
        if self.cursor.position() >= len {
            return None;
        }

        let result = extract(&mut self.cursor, &self.cfg);
        if let Err(err) = &result {
            if err.recovery() == Recovery::DiscardChunk {
                self.cursor.set_position(len);
            }
        }
        Some(result)
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a subpacket. Inverse of [`decode_subpacket`].
pub fn encode_subpacket(subpacket: &Subpacket, cfg: &ByteOrderConfig) -> Result<Vec<u8>, CodecError> {
    let body = &subpacket.body;
    let id = body.id();
    let mut buf = Vec::with_capacity(ids::HEADER_LEN + ids::CONFIG_MIN_LEN + 1);

    // 1. Header
    buf.put_u8(id);
    buf.put_u32(subpacket.timestamp_ms);

    // 2. Payload, with a length prefix for variable-length kinds
    match body {
        SubpacketBody::StatusPing(ping) => {
            buf.put_u8(ping.level.code());
            buf.put_u16(ping.sensor_status);
            buf.put_u16(ping.other_status);
        }
        SubpacketBody::Message(text) => {
            if !text.is_ascii() {
                return Err(CodecError::invalid_payload(id, "non-ASCII text"));
            }
            let len = u8::try_from(text.len()).map_err(|_| {
                CodecError::invalid_payload(id, format!("message is {} bytes, max 255", text.len()))
            })?;
            buf.put_u8(len);
            buf.put_slice(text.as_bytes());
        }
        SubpacketBody::Event(kind) => buf.put_u8(kind.code()),
        SubpacketBody::Config(config) => {
            let version = config.version_id.as_bytes();
            if !config.version_id.is_ascii() || version.len() > ids::VERSION_ID_LEN {
                return Err(CodecError::invalid_payload(
                    id,
                    format!("version id must be at most {} ASCII bytes", ids::VERSION_ID_LEN),
                ));
            }
            buf.put_u8(ids::CONFIG_MIN_LEN as u8);
            buf.put_u8(u8::from(config.is_sim));
            buf.put_u8(config.device_type.code());
            buf.put_slice(version);
            buf.put_bytes(0, ids::VERSION_ID_LEN - version.len());
        }
        SubpacketBody::Gps(fix) => {
            for value in [fix.latitude, fix.longitude, fix.altitude] {
                buf.put_slice(&cfg.write_f32(value));
            }
        }
        SubpacketBody::Orientation(q) => {
            for value in q {
                buf.put_slice(&cfg.write_f32(*value));
            }
        }
        SubpacketBody::SingleSensor { value, .. } => buf.put_slice(&cfg.write_f32(*value)),
        SubpacketBody::BulkSensor(bulk) => {
            let floats = [
                bulk.calculated_altitude,
                bulk.acceleration[0],
                bulk.acceleration[1],
                bulk.acceleration[2],
                bulk.orientation[0],
                bulk.orientation[1],
                bulk.orientation[2],
                bulk.latitude,
                bulk.longitude,
            ];
            for value in floats {
                buf.put_slice(&cfg.write_f32(value));
            }
            buf.put_u8(bulk.state.code());
        }
    }

    Ok(buf)
}

/// Encode several subpackets back to back into one radio payload.
pub fn encode_all<'a, I>(subpackets: I, cfg: &ByteOrderConfig) -> Result<Vec<u8>, CodecError>
where
    I: IntoIterator<Item = &'a Subpacket>,
{
    let mut buf = Vec::new();
    for subpacket in subpackets {
        buf.extend_from_slice(&encode_subpacket(subpacket, cfg)?);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataEntryId, DataValue};

    const BE: ByteOrderConfig = ByteOrderConfig::BIG_ENDIAN;

    #[test]
    fn test_message_decode() {
        let data = [0x01, 0, 0, 0, 0, 5, b'H', b'e', b'l', b'l', b'o'];
        let mut cursor = Cursor::new(&data[..]);
        let bundle = extract(&mut cursor, &BE).unwrap();

        assert_eq!(bundle.get(DataEntryId::Message), Some(&DataValue::Text("Hello".into())));
        assert_eq!(bundle.time(), Some(0));
        assert_eq!(cursor.position(), data.len() as u64);
    }

    #[test]
    fn test_unknown_id_consumes_one_byte() {
        let data = [0x05, 0, 0, 0, 0];
        let mut cursor = Cursor::new(&data[..]);
        let err = extract(&mut cursor, &BE).unwrap_err();

        assert_eq!(err, CodecError::UnknownSubpacketId(0x05));
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_truncated_payload() {
        // GPS needs 12 payload bytes, only 4 present
        let data = [0x04, 0, 0, 0, 1, 0x3F, 0x80, 0, 0];
        let mut cursor = Cursor::new(&data[..]);
        let err = extract(&mut cursor, &BE).unwrap_err();

        assert_eq!(
            err,
            CodecError::Truncated {
                offset: 5,
                needed: 12,
                available: 4
            }
        );
    }

    #[test]
    fn test_short_config_consumes_subpacket() {
        let mut data = vec![0x03, 0, 0, 0, 0, 3, 1, 0, b'x'];
        data.extend_from_slice(&[0x02, 0, 0, 0, 9, 0x06]);
        let mut cursor = Cursor::new(&data[..]);

        let err = extract(&mut cursor, &BE).unwrap_err();
        assert_eq!(err.recovery(), Recovery::SkipSubpacket);
        assert_eq!(cursor.position(), 9);

        let bundle = extract(&mut cursor, &BE).unwrap();
        assert_eq!(bundle.get(DataEntryId::Event), Some(&DataValue::Event(EventKind::Landed)));
    }

    #[test]
    fn test_config_unknown_device_type_decodes() {
        let config = Subpacket::new(
            0,
            SubpacketBody::Config(ConfigInfo {
                is_sim: false,
                device_type: DeviceType::Unknown(0x42),
                version_id: "v1".into(),
            }),
        );
        let data = encode_subpacket(&config, &BE).unwrap();
        assert_eq!(data.len(), ids::HEADER_LEN + 1 + ids::CONFIG_MIN_LEN);

        let bundle = extract(&mut Cursor::new(&data[..]), &BE).unwrap();
        let device = bundle.device_type().unwrap();
        assert_eq!(device.known(), Err(CodecError::UnknownDeviceType(0x42)));
    }

    #[test]
    fn test_extract_all_recovers() {
        let mut data = vec![0xFF];
        data.extend_from_slice(&[0x02, 0, 0, 0, 1, 0x03]);
        data.extend_from_slice(&[0x13, 0, 0]);

        let results: Vec<_> = extract_all(&data, &BE).collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Err(CodecError::UnknownSubpacketId(0xFF)));
        assert!(results[1].is_ok());
        assert_eq!(results[2].as_ref().unwrap_err().recovery(), Recovery::DiscardChunk);
    }

    #[test]
    fn test_encode_rejects_long_message() {
        let long = "x".repeat(256);
        let sp = Subpacket::new(0, SubpacketBody::Message(long));
        assert!(matches!(
            encode_subpacket(&sp, &BE),
            Err(CodecError::InvalidPayload { id: 0x01, .. })
        ));
    }
}
