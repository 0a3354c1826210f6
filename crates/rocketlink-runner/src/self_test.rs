//! Built-in self test.
//!
//! Replays the reference scenarios against the real codec, XBee simulator,
//! device manager and store. Nothing touches a radio or a firmware process.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rocketlink_core::{DebugTransport, DeviceManager, FullAddress, Registration, RegistrationError, RocketData, Transport};
use rocketlink_packet::{
    extract, Bundle, ByteOrderConfig, DataEntryId, DataValue, DeviceType, FlightState, StatusLevel,
};
use rocketlink_xbee::{parse_address, ApiFrame, FrameParser, XBeeCallback, XBeeSimulator};
use tracing::{error, info};

type ScenarioResult = Result<(), String>;

/// One named scenario.
pub struct Scenario {
    pub name: &'static str,
    run: fn() -> ScenarioResult,
}

impl Scenario {
    pub fn run(&self) -> ScenarioResult {
        (self.run)()
    }
}

/// Every scenario, in order.
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario { name: "S1 bulk sensor", run: bulk_sensor },
        Scenario { name: "S2 message", run: message },
        Scenario { name: "S3 status ping", run: status_ping },
        Scenario { name: "S4 xbee tx request", run: xbee_tx_request },
        Scenario { name: "S5 registration conflict", run: registration_conflict },
        Scenario { name: "S6 autosave snapshot", run: autosave_snapshot },
    ]
}

/// Outcome of a self-test run.
#[derive(Debug, Default)]
pub struct SelfTestReport {
    pub results: Vec<(&'static str, ScenarioResult)>,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, result)| result.is_err()).count()
    }
}

impl fmt::Display for SelfTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, result) in &self.results {
            match result {
                Ok(()) => writeln!(f, "PASS  {name}")?,
                Err(reason) => writeln!(f, "FAIL  {name}: {reason}")?,
            }
        }
        write!(
            f,
            "{} passed, {} failed",
            self.results.len() - self.failures(),
            self.failures()
        )
    }
}

/// Run every scenario, logging each outcome.
pub fn run_all() -> SelfTestReport {
    let mut report = SelfTestReport::default();
    for scenario in scenarios() {
        let result = scenario.run();
        match &result {
            Ok(()) => info!(scenario = scenario.name, "self-test passed"),
            Err(reason) => error!(scenario = scenario.name, %reason, "self-test failed"),
        }
        report.results.push((scenario.name, result));
    }
    report
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> ScenarioResult {
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

fn expect_eq<T: PartialEq + fmt::Debug>(what: &str, actual: T, expected: T) -> ScenarioResult {
    ensure(actual == expected, || format!("{what}: expected {expected:?}, got {actual:?}"))
}

fn decode(data: &[u8]) -> Result<Bundle, String> {
    let mut cursor = Cursor::new(data);
    let bundle = extract(&mut cursor, &ByteOrderConfig::BIG_ENDIAN).map_err(|e| e.to_string())?;
    expect_eq("bytes consumed", cursor.position(), data.len() as u64)?;
    Ok(bundle)
}

// ============================================================================
// Codec
// ============================================================================

fn bulk_sensor() -> ScenarioResult {
    let mut data = vec![0x30, 0x00, 0x00, 0x00, 0x01];
    for value in 1..=9u8 {
        data.extend_from_slice(&f32::from(value).to_be_bytes());
    }
    data.push(0x0A);

    let bundle = decode(&data)?;
    let fields = [
        DataEntryId::CalculatedAltitude,
        DataEntryId::AccelerationX,
        DataEntryId::AccelerationY,
        DataEntryId::AccelerationZ,
        DataEntryId::Orientation1,
        DataEntryId::Orientation2,
        DataEntryId::Orientation3,
        DataEntryId::Latitude,
        DataEntryId::Longitude,
    ];
    expect_eq("time", bundle.time(), Some(1))?;
    for (field, value) in fields.into_iter().zip(1..=9u8) {
        expect_eq(field.as_str(), bundle.get(field), Some(&DataValue::Float(f32::from(value))))?;
    }
    expect_eq(
        "state",
        bundle.get(DataEntryId::State),
        Some(&DataValue::FlightState(FlightState::Test)),
    )?;
    expect_eq("fields", bundle.len(), 11)
}

fn message() -> ScenarioResult {
    let bundle = decode(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x05, b'H', b'e', b'l', b'l', b'o'])?;
    expect_eq("time", bundle.time(), Some(0))?;
    expect_eq(
        "message",
        bundle.get(DataEntryId::Message),
        Some(&DataValue::Text("Hello".to_string())),
    )
}

fn status_ping() -> ScenarioResult {
    let bundle = decode(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xFC, 0xFF, 0xE0, 0xFF])?;
    expect_eq(
        "overall status",
        bundle.get(DataEntryId::OverallStatus),
        Some(&DataValue::StatusLevel(StatusLevel::Critical)),
    )?;
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
        expect_eq(field.as_str(), bundle.get(field), Some(&DataValue::Bool(true)))?;
    }
    Ok(())
}

// ============================================================================
// XBee
// ============================================================================

type Sink = Arc<Mutex<Vec<Vec<u8>>>>;

fn collector() -> (XBeeCallback, Sink) {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let store = sink.clone();
    let callback: XBeeCallback = Arc::new(move |data: &[u8]| store.lock().push(data.to_vec()));
    (callback, sink)
}

fn wait_for(sink: &Sink, count: usize) -> Vec<Vec<u8>> {
    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.lock().len() < count && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    sink.lock().clone()
}

fn xbee_tx_request() -> ScenarioResult {
    let ground = parse_address("0013A200400A0127").map_err(|e| e.to_string())?;
    let (rocket_cb, to_rocket) = collector();
    let (ground_cb, to_ground) = collector();
    let sim = XBeeSimulator::start(ground, rocket_cb, ground_cb).map_err(|e| e.to_string())?;

    let input = [
        0x7E, 0x00, 0x16, 0x10, 0x01, 0x00, 0x7D, 0x33, 0xA2, 0x00, 0x40, 0x0A, 0x01, 0x27, 0xFF,
        0xFE, 0x00, 0x00, 0x54, 0x78, 0x44, 0x61, 0x74, 0x61, 0x30, 0x41, 0x7D, 0x33,
    ];
    sim.received_from_rocket(&input).map_err(|e| e.to_string())?;
    let delivered = wait_for(&to_ground, 1);
    let acks = wait_for(&to_rocket, 1);
    sim.shutdown();

    expect_eq("ground payloads", delivered, vec![b"TxData0A".to_vec()])?;
    let first = acks.first().ok_or("no frame sent to the rocket")?;
    let frames: Vec<ApiFrame> = FrameParser::new()
        .feed(first)
        .into_iter()
        .map(|raw| raw.and_then(|raw| raw.decode()).map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    match frames.as_slice() {
        [ApiFrame::TxStatus(status)] => expect_eq("tx status frame id", status.frame_id, 0x01),
        other => Err(format!("expected one TX status frame, got {other:?}")),
    }
}

// ============================================================================
// Core
// ============================================================================

fn registration_conflict() -> ScenarioResult {
    let devices = DeviceManager::new();
    let t1: Arc<dyn Transport> = Arc::new(DebugTransport::new("t1", "HW_A"));
    let t2: Arc<dyn Transport> = Arc::new(DebugTransport::new("t2", "HW_A"));

    expect_eq(
        "first registration",
        devices.register(DeviceType::Stage1Flight, "HW_A", t1.clone()),
        Ok(Registration::Registered),
    )?;
    ensure(
        matches!(
            devices.register(DeviceType::Stage1Flight, "HW_B", t1.clone()),
            Err(RegistrationError::InvalidRegistration { .. })
        ),
        || "same device with another hwid was accepted".to_string(),
    )?;
    ensure(
        matches!(
            devices.register(DeviceType::Stage2Flight, "HW_A", t1),
            Err(RegistrationError::InvalidRegistration { .. })
        ),
        || "same hwid as another device was accepted".to_string(),
    )?;
    expect_eq(
        "transport move",
        devices.register(DeviceType::Stage1Flight, "HW_A", t2),
        Ok(Registration::Moved { from: "t1".to_string() }),
    )?;
    expect_eq(
        "address after move",
        devices.get_full_address(DeviceType::Stage1Flight),
        Some(FullAddress::new("t2", "HW_A")),
    )
}

fn autosave_snapshot() -> ScenarioResult {
    let devices = Arc::new(DeviceManager::new());
    let transport = Arc::new(DebugTransport::new("debug", "HW_1"));
    devices
        .register(DeviceType::Stage1Flight, "HW_1", transport.clone())
        .map_err(|e| e.to_string())?;
    let store = RocketData::new(devices);
    let address = transport.full_address();

    for (time, id, value) in [
        (1, DataEntryId::Pressure, 100.0),
        (2, DataEntryId::Pressure, 110.0),
        (2, DataEntryId::Temperature, 25.0),
    ] {
        let mut bundle: Bundle = [(id, DataValue::Float(value))].into_iter().collect();
        bundle.set_time(time);
        store.add_bundle(&address, bundle);
    }

    let path = std::env::temp_dir().join(format!("rocketlink-self-test-{}.csv", std::process::id()));
    let rows = store.save(&path).map_err(|e| e.to_string());
    let text = std::fs::read_to_string(&path).map_err(|e| e.to_string());
    let _ = std::fs::remove_file(&path);

    expect_eq("data rows", rows?, 2)?;
    let text = text?;
    let lines: Vec<&str> = text.lines().collect();
    expect_eq(
        "csv",
        lines,
        vec![
            "TIME_STAGE1_FLIGHT,PRESSURE_STAGE1_FLIGHT,TEMPERATURE_STAGE1_FLIGHT",
            "1,100,",
            "2,110,25",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scenario_passes() {
        let report = run_all();
        assert!(report.passed(), "{report}");
        assert_eq!(report.results.len(), 6);
    }

    #[test]
    fn test_report_counts_failures() {
        let report = SelfTestReport {
            results: vec![("ok", Ok(())), ("bad", Err("boom".into()))],
        };
        assert!(!report.passed());
        assert_eq!(report.to_string(), "PASS  ok\nFAIL  bad: boom\n1 passed, 1 failed");
    }
}
