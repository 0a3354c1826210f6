//! Metric emission from the core workers.
//!
//! The recorder is process global, so every test here runs serially.

use std::sync::Arc;

use rocketlink_core::{ConnectionMessage, DebugTransport, DeviceManager, ReadWorker, RocketData, Transport};
use rocketlink_metrics::global_recorder;
use rocketlink_metrics::metric_defs::{
    DEVICES_REGISTERED, PACKETS_DECODED, PACKET_DECODE_ERRORS, REGISTRATIONS,
};
use rocketlink_packet::{encode_subpacket, ByteOrderConfig, ConfigInfo, DeviceType, Subpacket, SubpacketBody};
use serial_test::serial;

fn config_bytes(device_type: DeviceType) -> Vec<u8> {
    let config = Subpacket::new(
        0,
        SubpacketBody::Config(ConfigInfo {
            is_sim: false,
            device_type,
            version_id: String::new(),
        }),
    );
    encode_subpacket(&config, &ByteOrderConfig::BIG_ENDIAN).unwrap()
}

#[test]
#[serial]
fn test_read_worker_counts_packets_and_errors() {
    let recorder = global_recorder();
    recorder.reset();

    let devices = Arc::new(DeviceManager::new());
    let store = Arc::new(RocketData::new(devices.clone()));
    let mut worker = ReadWorker::new(devices, store);
    let transport: Arc<dyn Transport> = Arc::new(DebugTransport::new("metrics0", "HW_M"));

    let mut data = vec![0xEE];
    data.extend(config_bytes(DeviceType::Stage2Flight));
    worker.process(&ConnectionMessage {
        hwid: Some("HW_M".into()),
        transport,
        data,
    });

    assert_eq!(recorder.counter(PACKETS_DECODED.name, &[("transport", "metrics0")]), 1);
    assert_eq!(
        recorder.counter(
            PACKET_DECODE_ERRORS.name,
            &[("transport", "metrics0"), ("kind", "unknown_subpacket_id")]
        ),
        1
    );
    assert_eq!(recorder.counter(REGISTRATIONS.name, &[("result", "registered")]), 1);
    assert_eq!(recorder.gauge(DEVICES_REGISTERED.name, &[]), Some(1.0));
}

#[test]
#[serial]
fn test_invalid_registration_counted() {
    let recorder = global_recorder();
    recorder.reset();

    let devices = DeviceManager::new();
    let t: Arc<dyn Transport> = Arc::new(DebugTransport::new("metrics1", "HW_1"));
    devices.register(DeviceType::Copilot, "HW_1", t.clone()).unwrap();
    devices.register(DeviceType::Copilot, "HW_1", t.clone()).unwrap();
    assert!(devices.register(DeviceType::Copilot, "HW_2", t).is_err());

    assert_eq!(recorder.counter(REGISTRATIONS.name, &[("result", "registered")]), 1);
    assert_eq!(recorder.counter(REGISTRATIONS.name, &[("result", "unchanged")]), 1);
    assert_eq!(recorder.counter(REGISTRATIONS.name, &[("result", "invalid")]), 1);
}
