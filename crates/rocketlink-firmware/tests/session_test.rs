//! Simulated firmware sessions over in-memory streams and a child process.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rocketlink_firmware::{
    analog_response, config_packet, nibble_encode, sensor_response, time_response, ConstantSensor, Hardware,
    Outbound, Packet, PinMode, SensorKind, SimSession, IGNITOR_CONNECTED_LEVEL, PACKET_ANALOG_READ, PACKET_DIGITAL_WRITE,
    PACKET_RADIO, PACKET_SENSOR_READ, PACKET_TIME_UPDATE, SYN,
};
use rocketlink_packet::ByteOrderConfig;
use rocketlink_xbee::{ApiFrame, TxRequest, XBeeCallback, XBeeSimulator};

const GROUND: u64 = 0x0013_A200_400A_0127;

fn packet(id: u8, payload: &[u8]) -> Vec<u8> {
    Packet::new(id, payload.to_vec()).encode().unwrap()
}

fn tx_to_ground(data: &[u8]) -> Vec<u8> {
    ApiFrame::TxRequest(TxRequest::new(1, GROUND, data.to_vec()))
        .encode()
        .unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

#[test]
fn test_session_serves_firmware_requests() {
    let cfg = ByteOrderConfig::LITTLE_ENDIAN;
    let mut stream = b"noise before the handshake".to_vec();
    stream.extend_from_slice(SYN);
    stream.extend(config_packet(&cfg).encode().unwrap());
    stream.extend(packet(PACKET_DIGITAL_WRITE, &[2, 1]));
    stream.extend(packet(PACKET_ANALOG_READ, &[14]));
    stream.extend(packet(PACKET_SENSOR_READ, &[SensorKind::Barometer.code()]));
    stream.extend(packet(PACKET_TIME_UPDATE, &cfg.write_u32(1500)));
    stream.extend(packet(0x99, &[1, 2, 3]));
    stream.extend(packet(PACKET_RADIO, &tx_to_ground(b"telemetry")));
    let encoded = nibble_encode(&stream);

    let to_ground = Arc::new(Mutex::new(Vec::new()));
    let sink = to_ground.clone();
    let ground_cb: XBeeCallback = Arc::new(move |data: &[u8]| sink.lock().push(data.to_vec()));
    let (tx, rx) = crossbeam_channel::unbounded();
    let xbee = Arc::new(XBeeSimulator::start(GROUND, rocketlink_firmware::radio_callback(tx.clone()), ground_cb).unwrap());

    let mut hardware = Hardware::default();
    hardware.add_sensor(Box::new(ConstantSensor::new(SensorKind::Barometer, vec![101.3])));
    let mut session = SimSession::new(Cursor::new(encoded), tx, hardware, xbee.clone());

    assert_eq!(session.handshake().unwrap(), cfg);
    session.run().unwrap();
    assert!(wait_until(|| !to_ground.lock().is_empty()));
    xbee.shutdown();

    assert_eq!(*to_ground.lock(), vec![b"telemetry".to_vec()]);
    assert_eq!(session.hardware().millis(), 1500);
    assert!(session.hardware().pin(2).high);
    assert_eq!(session.hardware().pin(2).mode, PinMode::Input);

    // Replies in request order; radio frames from the simulator interleave
    let replies: Vec<Vec<u8>> = rx
        .try_iter()
        .filter_map(|item| match item {
            Outbound::Bytes(bytes) if bytes[0] != PACKET_RADIO => Some(bytes),
            _ => None,
        })
        .collect();
    assert_eq!(
        replies,
        vec![
            b"ACK".to_vec(),
            analog_response(IGNITOR_CONNECTED_LEVEL).encode().unwrap(),
            sensor_response(&[101.3], &cfg).encode().unwrap(),
            time_response(1500, &cfg).encode().unwrap(),
        ]
    );
    assert!(!session.history().contents().is_empty());
}

#[test]
fn test_handshake_requires_syn() {
    let (rocket_cb, ground_cb): (XBeeCallback, XBeeCallback) = (Arc::new(|_: &[u8]| {}), Arc::new(|_: &[u8]| {}));
    let xbee = Arc::new(XBeeSimulator::start(GROUND, rocket_cb, ground_cb).unwrap());
    let (tx, _rx) = crossbeam_channel::unbounded();

    let mut session = SimSession::new(Cursor::new(nibble_encode(b"SY")), tx.clone(), Hardware::default(), xbee.clone());
    assert!(session.handshake().is_err());

    let mut stream = SYN.to_vec();
    stream.extend(packet(PACKET_RADIO, &[0; 8]));
    let mut session = SimSession::new(Cursor::new(nibble_encode(&stream)), tx, Hardware::default(), xbee.clone());
    assert!(session.handshake().is_err());
    xbee.shutdown();
}

#[cfg(unix)]
mod child_process {
    use super::*;
    use rocketlink_core::{AppContext, ContextConfig, Transport};
    use rocketlink_firmware::{SimConfig, SimTransport};
    use rocketlink_packet::{encode_all, ConfigInfo, DeviceType, Subpacket, SubpacketBody};

    fn script(cfg: &ByteOrderConfig) -> String {
        let telemetry = encode_all(
            &[Subpacket::new(
                0,
                SubpacketBody::Config(ConfigInfo {
                    is_sim: true,
                    device_type: DeviceType::Stage2Flight,
                    version_id: "sim-firmware".into(),
                }),
            )],
            cfg,
        )
        .unwrap();

        let mut stream = SYN.to_vec();
        stream.extend(config_packet(cfg).encode().unwrap());
        stream.extend(packet(PACKET_RADIO, &tx_to_ground(&telemetry)));
        let text = String::from_utf8(nibble_encode(&stream)).unwrap();
        format!("printf '{text}'; exec sleep 2")
    }

    #[test]
    fn test_sim_transport_registers_firmware() {
        let cfg = ByteOrderConfig::LITTLE_ENDIAN;
        let mut config = SimConfig::new("sim0", "sh", "HW_SIM", GROUND);
        config.args = vec!["-c".into(), script(&cfg)];
        let transport = Arc::new(SimTransport::new(config));

        let context = AppContext::start(ContextConfig::default()).unwrap();
        context.add_transport(transport.clone()).unwrap();

        assert!(wait_until(|| context.devices().get_full_address(DeviceType::Stage2Flight).is_some()));
        assert_eq!(
            context.devices().get_full_address(DeviceType::Stage2Flight),
            Some(transport.full_address())
        );
        assert!(wait_until(|| transport.byte_order() == cfg));

        // Commands go back over the radio as RX indicators
        context.execute_command("stage2_flight.ping").unwrap();
        context.shutdown();
        assert!(transport.send(&transport.full_address(), &[0]).is_err());
    }
}
