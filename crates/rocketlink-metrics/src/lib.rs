//! Metric declarations for the rocketlink ground station.
//!
//! Every metric the workspace emits is declared here as a [`Metric`] constant
//! so names and label keys live in one place. The `metrics` crate is
//! re-exported; emitting a metric is a no-op until the embedding application
//! installs a recorder.
//!
//! ```rust
//! use rocketlink_metrics::metric_defs::PACKETS_DECODED;
//!
//! rocketlink_metrics::metrics::counter!(PACKETS_DECODED.name, "transport" => "sim0").increment(1);
//! ```

pub use metrics;

mod recorder;

pub use recorder::{global_recorder, InMemoryRecorder};

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use rocketlink_metrics::{Metric, MetricKind};
/// use rocketlink_metrics::metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("example.frames")
///     .with_description("Frames seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["frame_type"]);
///
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name, dot separated.
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys every emission of this metric carries.
    pub labels: &'static [&'static str],
}

impl Metric {
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description)
            }
            (MetricKind::Histogram, None) => describe_histogram!(self.name, self.description),
        }
    }
}

/// All metric definitions of the ground station.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Read Path
    // ========================================================================

    /// Subpackets decoded into bundles.
    ///
    /// Labels: transport
    pub const PACKETS_DECODED: Metric = Metric::counter("rocketlink.packets.decoded")
        .with_description("Subpackets decoded into bundles")
        .with_unit(Unit::Count)
        .with_labels(&["transport"]);

    /// Subpacket decode failures.
    ///
    /// Labels: transport, kind (`unknown_subpacket_id`, `truncated`, ...)
    pub const PACKET_DECODE_ERRORS: Metric = Metric::counter("rocketlink.packets.decode_errors")
        .with_description("Subpacket decode failures")
        .with_unit(Unit::Count)
        .with_labels(&["transport", "kind"]);

    /// Registration attempts by outcome.
    ///
    /// Labels: result (`registered`, `unchanged`, `moved`, `invalid`)
    pub const REGISTRATIONS: Metric = Metric::counter("rocketlink.registrations")
        .with_description("Device registration attempts")
        .with_unit(Unit::Count)
        .with_labels(&["result"]);

    /// Devices currently registered.
    pub const DEVICES_REGISTERED: Metric = Metric::gauge("rocketlink.devices.registered")
        .with_description("Devices currently registered")
        .with_unit(Unit::Count);

    // ========================================================================
    // XBee Simulator
    // ========================================================================

    /// Valid API frames handled by the XBee simulator.
    ///
    /// Labels: frame_type (`tx_request`, `rx_indicator`, `tx_status`, `other`)
    pub const XBEE_FRAMES: Metric = Metric::counter("rocketlink.xbee.frames")
        .with_description("API frames handled by the XBee simulator")
        .with_unit(Unit::Count)
        .with_labels(&["frame_type"]);

    /// Frames or bytes dropped by the XBee simulator.
    ///
    /// Labels: reason (`unescaped_delimiter`, `checksum`, `address`, `malformed`)
    pub const XBEE_DROPPED: Metric = Metric::counter("rocketlink.xbee.dropped")
        .with_description("API frames dropped by the XBee simulator")
        .with_unit(Unit::Count)
        .with_labels(&["reason"]);

    // ========================================================================
    // Send Path and Autosave
    // ========================================================================

    /// Commands handed to a transport.
    ///
    /// Labels: result (`ok`, `timeout`, `error`, `unroutable`)
    pub const COMMANDS_SENT: Metric = Metric::counter("rocketlink.commands.sent")
        .with_description("Commands handed to a transport")
        .with_unit(Unit::Count)
        .with_labels(&["result"]);

    /// Completed autosave writes.
    pub const AUTOSAVE_WRITES: Metric = Metric::counter("rocketlink.autosave.writes")
        .with_description("Completed autosave writes")
        .with_unit(Unit::Count);

    /// Time spent writing one autosave snapshot.
    pub const AUTOSAVE_DURATION: Metric = Metric::histogram("rocketlink.autosave.duration_ms")
        .with_description("Time spent writing one autosave snapshot")
        .with_unit(Unit::Milliseconds);

    pub const ALL: &[&Metric] = &[
        &PACKETS_DECODED,
        &PACKET_DECODE_ERRORS,
        &REGISTRATIONS,
        &DEVICES_REGISTERED,
        &XBEE_FRAMES,
        &XBEE_DROPPED,
        &COMMANDS_SENT,
        &AUTOSAVE_WRITES,
        &AUTOSAVE_DURATION,
    ];
}

/// Describe every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
