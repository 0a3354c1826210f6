//! Periodic CSV autosave of the rocket data store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rocketlink_metrics::metric_defs::{AUTOSAVE_DURATION, AUTOSAVE_WRITES};
use rocketlink_metrics::metrics::{counter, histogram};
use tracing::{debug, error, warn};

use crate::error::PipelineError;
use crate::store::RocketData;

/// Default interval between saves.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(10);

struct Signal {
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Background worker that saves the store every `interval`.
pub struct AutosaveWorker {
    path: PathBuf,
    signal: Arc<Signal>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AutosaveWorker {
    /// Start the worker thread.
    pub fn start(store: Arc<RocketData>, path: PathBuf, interval: Duration) -> Result<Self, PipelineError> {
        let signal = Arc::new(Signal {
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });

        let thread = {
            let signal = signal.clone();
            let path = path.clone();
            thread::Builder::new()
                .name("autosave".to_string())
                .spawn(move || autosave_main(store, path, interval, signal))
                .map_err(|e| PipelineError::spawn("autosave", e))?
        };

        debug!(path = %path.display(), ?interval, "autosave started");
        Ok(AutosaveWorker {
            path,
            signal,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wake the worker, let it finish a last save and join it. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut stop = self.signal.stop.lock();
            if *stop {
                return;
            }
            *stop = true;
        }
        self.signal.wake.notify_all();
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("autosave thread panicked");
            }
        }
        debug!("autosave stopped");
    }
}

impl Drop for AutosaveWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn autosave_main(store: Arc<RocketData>, path: PathBuf, interval: Duration, signal: Arc<Signal>) {
    loop {
        let stopping = {
            let mut stop = signal.stop.lock();
            if !*stop {
                signal.wake.wait_for(&mut stop, interval);
            }
            *stop
        };

        save_once(&store, &path);
        if stopping {
            break;
        }
    }
}

fn save_once(store: &RocketData, path: &Path) {
    if store.is_empty() {
        return;
    }
    let started = Instant::now();
    match store.save(path) {
        Ok(rows) => {
            counter!(AUTOSAVE_WRITES.name).increment(1);
            histogram!(AUTOSAVE_DURATION.name).record(started.elapsed().as_secs_f64() * 1000.0);
            debug!(path = %path.display(), rows, "autosave written");
        }
        Err(err) => error!(path = %path.display(), error = %err, "autosave failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_manager::DeviceManager;
    use crate::transport::FullAddress;
    use rocketlink_packet::{Bundle, DataEntryId, DataValue};

    #[test]
    fn test_saves_periodically_and_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autosave.csv");
        let store = Arc::new(RocketData::new(Arc::new(DeviceManager::new())));

        let worker = AutosaveWorker::start(store.clone(), path.clone(), Duration::from_millis(20)).unwrap();
        let mut bundle = Bundle::new();
        bundle.set_time(1);
        bundle.insert(DataEntryId::Pressure, DataValue::Float(100.0));
        store.add_bundle(&FullAddress::new("debug", "HW_1"), bundle);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !path.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(path.exists());

        worker.shutdown();
        worker.shutdown();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("TIME_debug:HW_1,PRESSURE_debug:HW_1"));
    }

    #[test]
    fn test_shutdown_is_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RocketData::new(Arc::new(DeviceManager::new())));
        let worker =
            AutosaveWorker::start(store, dir.path().join("a.csv"), Duration::from_secs(3600)).unwrap();

        let started = Instant::now();
        worker.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));
        // Nothing stored, nothing written
        assert!(!dir.path().join("a.csv").exists());
    }
}
