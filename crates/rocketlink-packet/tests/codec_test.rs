//! End-to-end decoding of literal radio payloads.

use std::io::Cursor;

use rocketlink_packet::{
    encode_all, encode_subpacket, extract, extract_all, BulkSensor, Bundle, ByteOrderConfig,
    CodecError, ConfigInfo, DataEntryId, DataValue, DeviceType, EventKind, FlightState, GpsFix,
    StatusLevel, StatusPing, Subpacket, SubpacketBody,
};

fn be_floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn sample_subpackets() -> Vec<Subpacket> {
    vec![
        Subpacket::new(
            1,
            SubpacketBody::StatusPing(StatusPing {
                level: StatusLevel::NonCritical,
                sensor_status: 0xF800,
                other_status: 0x8000,
            }),
        ),
        Subpacket::new(2, SubpacketBody::Message("apogee soon".into())),
        Subpacket::new(3, SubpacketBody::Event(EventKind::Launch)),
        Subpacket::new(
            4,
            SubpacketBody::Config(ConfigInfo {
                is_sim: true,
                device_type: DeviceType::Copilot,
                version_id: "0123456789abcdef".into(),
            }),
        ),
        Subpacket::new(
            5,
            SubpacketBody::Gps(GpsFix {
                latitude: 49.26,
                longitude: -123.25,
                altitude: 100.5,
            }),
        ),
        Subpacket::new(6, SubpacketBody::Orientation([0.5, -0.5, 0.25, 1.0])),
        Subpacket::new(7, SubpacketBody::SingleSensor { id: 0x13, value: 101.3 }),
        Subpacket::new(8, SubpacketBody::SingleSensor { id: 0x2C, value: 9.0 }),
        Subpacket::new(
            9,
            SubpacketBody::BulkSensor(BulkSensor {
                calculated_altitude: 1500.0,
                acceleration: [0.1, 0.2, 9.8],
                orientation: [0.0, 1.0, 0.0],
                latitude: 49.0,
                longitude: -123.0,
                state: FlightState::Coast,
            }),
        ),
    ]
}

#[test]
fn test_bulk_sensor_scenario() {
    let mut data = vec![0x30, 0x00, 0x00, 0x00, 0x01];
    data.extend(be_floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]));
    data.push(0x0A);

    let mut cursor = Cursor::new(&data[..]);
    let bundle = extract(&mut cursor, &ByteOrderConfig::BIG_ENDIAN).unwrap();

    let expected: Bundle = [
        (DataEntryId::Time, DataValue::UInt(1)),
        (DataEntryId::CalculatedAltitude, DataValue::Float(1.0)),
        (DataEntryId::AccelerationX, DataValue::Float(2.0)),
        (DataEntryId::AccelerationY, DataValue::Float(3.0)),
        (DataEntryId::AccelerationZ, DataValue::Float(4.0)),
        (DataEntryId::Orientation1, DataValue::Float(5.0)),
        (DataEntryId::Orientation2, DataValue::Float(6.0)),
        (DataEntryId::Orientation3, DataValue::Float(7.0)),
        (DataEntryId::Latitude, DataValue::Float(8.0)),
        (DataEntryId::Longitude, DataValue::Float(9.0)),
        (DataEntryId::State, DataValue::FlightState(FlightState::Test)),
    ]
    .into_iter()
    .collect();

    assert_eq!(bundle, expected);
    assert_eq!(cursor.position(), data.len() as u64);
    assert_eq!(data.len(), 5 + 37);
}

#[test]
fn test_message_scenario() {
    let data = [0x01, 0x00, 0x00, 0x00, 0x00, 0x05, b'H', b'e', b'l', b'l', b'o'];
    let bundle = extract(&mut Cursor::new(&data[..]), &ByteOrderConfig::BIG_ENDIAN).unwrap();

    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.time(), Some(0));
    assert_eq!(bundle.get(DataEntryId::Message), Some(&DataValue::Text("Hello".into())));
}

#[test]
fn test_status_ping_scenario() {
    let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xFC, 0xFF, 0xE0, 0xFF];
    let bundle = extract(&mut Cursor::new(&data[..]), &ByteOrderConfig::BIG_ENDIAN).unwrap();

    assert_eq!(
        bundle.get(DataEntryId::OverallStatus),
        Some(&DataValue::StatusLevel(StatusLevel::Critical))
    );
    for field in [
        DataEntryId::BarometerStatus,
        DataEntryId::GpsStatus,
        DataEntryId::AccelerometerStatus,
        DataEntryId::ImuStatus,
        DataEntryId::TemperatureStatus,
        DataEntryId::DrogueIgniterContinuity,
        DataEntryId::MainIgniterContinuity,
        DataEntryId::FileOpenSuccess,
    ] {
        assert_eq!(bundle.get(field), Some(&DataValue::Bool(true)), "{field}");
    }
}

#[test]
fn test_round_trip_every_kind() {
    for cfg in [
        ByteOrderConfig::BIG_ENDIAN,
        ByteOrderConfig::LITTLE_ENDIAN,
        ByteOrderConfig::new(true, false),
    ] {
        for subpacket in sample_subpackets() {
            let data = encode_subpacket(&subpacket, &cfg).unwrap();
            let mut cursor = Cursor::new(&data[..]);
            let decoded = extract(&mut cursor, &cfg).unwrap();

            assert_eq!(decoded, subpacket.clone().into_bundle(), "{:?}", subpacket.body.kind());
            assert_eq!(cursor.position(), data.len() as u64);
        }
    }
}

#[test]
fn test_float_order_changes_decoding() {
    let subpacket = Subpacket::new(0, SubpacketBody::SingleSensor { id: 0x1E, value: 3.7 });
    let data = encode_subpacket(&subpacket, &ByteOrderConfig::LITTLE_ENDIAN).unwrap();

    // Timestamp stays big-endian regardless of the float order
    assert_eq!(&data[1..5], &[0, 0, 0, 0]);
    assert_eq!(&data[5..], &3.7f32.to_le_bytes());

    let wrong = extract(&mut Cursor::new(&data[..]), &ByteOrderConfig::BIG_ENDIAN).unwrap();
    assert_ne!(wrong.get(DataEntryId::Voltage), Some(&DataValue::Float(3.7)));
}

#[test]
fn test_length_discipline() {
    let cfg = ByteOrderConfig::BIG_ENDIAN;
    let subpackets = sample_subpackets();
    let data = encode_all(&subpackets, &cfg).unwrap();

    let mut iter = extract_all(&data, &cfg);
    let bundles: Vec<Bundle> = iter.by_ref().collect::<Result<_, _>>().unwrap();

    assert_eq!(bundles.len(), subpackets.len());
    assert_eq!(iter.position(), data.len() as u64);
}

#[test]
fn test_resync_after_garbage_byte() {
    let cfg = ByteOrderConfig::BIG_ENDIAN;
    for subpacket in sample_subpackets() {
        let valid = encode_subpacket(&subpacket, &cfg).unwrap();
        let mut data = vec![0xEE];
        data.extend_from_slice(&valid);

        let mut cursor = Cursor::new(&data[..]);
        assert_eq!(
            extract(&mut cursor, &cfg),
            Err(CodecError::UnknownSubpacketId(0xEE))
        );
        let bundle = extract(&mut cursor, &cfg).unwrap();

        assert_eq!(bundle, subpacket.into_bundle());
        assert_eq!(cursor.position(), valid.len() as u64 + 1);
    }
}

#[test]
fn test_bad_subpacket_does_not_hide_the_rest() {
    let cfg = ByteOrderConfig::BIG_ENDIAN;
    let mut data = vec![0x01, 0, 0, 0, 0, 2, 0xC3, 0xA9];
    data.extend(encode_subpacket(&Subpacket::new(5, SubpacketBody::Event(EventKind::Apogee)), &cfg).unwrap());

    let results: Vec<_> = extract_all(&data, &cfg).collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(CodecError::InvalidPayload { id: 0x01, .. })));
    assert_eq!(results[1].as_ref().unwrap().time(), Some(5));
}
