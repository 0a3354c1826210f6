//! In-memory metrics recorder for tests and the self-test.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use metrics::{
    Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use parking_lot::Mutex;

/// Metric key rendered as name plus sorted labels.
type CellKey = (String, Vec<(String, String)>);

fn cell_key(key: &Key) -> CellKey {
    let mut labels: Vec<(String, String)> = key
        .labels()
        .map(|label| (label.key().to_string(), label.value().to_string()))
        .collect();
    labels.sort();
    (key.name().to_string(), labels)
}

fn matches(cell: &CellKey, name: &str, labels: &[(&str, &str)]) -> bool {
    cell.0 == name
        && labels
            .iter()
            .all(|(k, v)| cell.1.iter().any(|(ck, cv)| ck == k && cv == v))
}

#[derive(Debug, Default)]
struct HistogramCell {
    samples: Mutex<Vec<f64>>,
}

impl HistogramFn for HistogramCell {
    fn record(&self, value: f64) {
        self.samples.lock().push(value);
    }
}

/// Recorder that keeps every value in memory.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    counters: Mutex<HashMap<CellKey, Arc<AtomicU64>>>,
    gauges: Mutex<HashMap<CellKey, Arc<AtomicU64>>>,
    histograms: Mutex<HashMap<CellKey, Arc<HistogramCell>>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of every counter named `name` whose labels include `labels`.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .lock()
            .iter()
            .filter(|(key, _)| matches(key, name, labels))
            .map(|(_, cell)| cell.load(Ordering::Relaxed))
            .sum()
    }

    /// Current value of a gauge, if it was ever touched.
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.gauges
            .lock()
            .iter()
            .find(|(key, _)| matches(key, name, labels))
            .map(|(_, cell)| f64::from_bits(cell.load(Ordering::Relaxed)))
    }

    /// Every sample recorded for a histogram.
    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Vec<f64> {
        self.histograms
            .lock()
            .iter()
            .filter(|(key, _)| matches(key, name, labels))
            .flat_map(|(_, cell)| cell.samples.lock().clone())
            .collect()
    }

    /// Forget every recorded value.
    pub fn reset(&self) {
        self.counters.lock().clear();
        self.gauges.lock().clear();
        self.histograms.lock().clear();
    }
}

impl Recorder for InMemoryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        let cell = self.counters.lock().entry(cell_key(key)).or_default().clone();
        Counter::from_arc(cell)
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        let cell = self.gauges.lock().entry(cell_key(key)).or_default().clone();
        Gauge::from_arc(cell)
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        let cell = self.histograms.lock().entry(cell_key(key)).or_default().clone();
        Histogram::from_arc(cell)
    }
}

static GLOBAL: OnceLock<Arc<InMemoryRecorder>> = OnceLock::new();

/// Install an [`InMemoryRecorder`] as the process-wide recorder on first call
/// and return it.
///
/// If another recorder was installed first, the returned recorder stays empty.
pub fn global_recorder() -> Arc<InMemoryRecorder> {
    GLOBAL
        .get_or_init(|| {
            let recorder = Arc::new(InMemoryRecorder::new());
            if metrics::set_global_recorder(recorder.clone()).is_ok() {
                crate::describe_metrics();
            }
            recorder
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_recording() {
        let recorder = InMemoryRecorder::new();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("test.frames", "frame_type" => "tx_request").increment(2);
            metrics::counter!("test.frames", "frame_type" => "tx_status").increment(1);
            metrics::gauge!("test.devices").set(3.0);
            metrics::histogram!("test.duration").record(1.5);
        });

        assert_eq!(recorder.counter("test.frames", &[]), 3);
        assert_eq!(recorder.counter("test.frames", &[("frame_type", "tx_status")]), 1);
        assert_eq!(recorder.gauge("test.devices", &[]), Some(3.0));
        assert_eq!(recorder.histogram("test.duration", &[]), vec![1.5]);

        recorder.reset();
        assert_eq!(recorder.counter("test.frames", &[]), 0);
    }
}
