//! Configuration files driving a full application context.

use std::time::Duration;

use rocketlink_core::AppContext;
use rocketlink_runner::{self_test, ConfigError, GroundStationConfig, TransportConfig};

#[test]
fn test_config_file_opens_transports() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("flight.csv");
    let path = dir.path().join("station.yaml");
    std::fs::write(
        &path,
        format!(
            r#"
autosave:
  path: {}
  interval_secs: 1
transports:
  - type: debug
    name: bench
    hwid: HW_BENCH
"#,
            csv.display()
        ),
    )
    .unwrap();

    let config = GroundStationConfig::load(&path).unwrap();
    assert_eq!(
        config.transports,
        vec![TransportConfig::Debug {
            name: "bench".into(),
            hwid: "HW_BENCH".into()
        }]
    );

    let context = AppContext::start(config.context_config()).unwrap();
    for transport in &config.transports {
        context
            .add_transport(transport.build(config.ground_address, config.send_timeout()))
            .unwrap();
    }
    assert!(context.transport("bench").is_some());
    assert!(context.transport("sim0").is_none());

    // A second transport with the same name is refused
    let again = config.transports[0].build(config.ground_address, Duration::from_secs(1));
    assert!(context.add_transport(again).is_err());

    context.shutdown();
    // Nothing was received, so nothing was saved
    assert!(!csv.exists());
}

#[test]
fn test_missing_config_file() {
    let err = GroundStationConfig::load(std::path::Path::new("/nonexistent/station.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/station.yaml"));
}

#[test]
fn test_self_test_report() {
    let report = self_test::run_all();
    assert!(report.passed(), "{report}");
    assert!(report.to_string().ends_with("6 passed, 0 failed"));
}

#[test]
fn test_bundled_station_config_parses() {
    let config = GroundStationConfig::from_yaml(include_str!("../../../station.yaml")).unwrap();
    assert_eq!(config.ground_address.to_string(), "0013A200400A0127");
    let names: Vec<&str> = config.transports.iter().map(TransportConfig::name).collect();
    assert_eq!(names, vec!["sim0", "bench"]);
    assert_eq!(config.send_timeout(), Duration::from_secs(5));
}
