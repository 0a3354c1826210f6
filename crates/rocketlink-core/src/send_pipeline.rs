//! Outbound pipeline: operator commands to transports.
//!
//! Commands are queued by device type and resolved to a transport and
//! address only when the worker sends them, so a device that moved between
//! queueing and sending is still reached. Failures never stop the worker;
//! they come back to the operator as [`OperatorNotice`]s.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rocketlink_metrics::metric_defs::COMMANDS_SENT;
use rocketlink_metrics::metrics::counter;
use rocketlink_packet::DeviceType;
use tracing::{debug, error, trace, warn};

use crate::device_manager::DeviceManager;
use crate::error::{PipelineError, TransportError};
use crate::transport::{FullAddress, Transport};

/// A single-line message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorNotice {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl OperatorNotice {
    pub fn new(message: impl Into<String>) -> Self {
        OperatorNotice {
            timestamp: Local::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for OperatorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

#[derive(Debug)]
enum Job {
    /// `None` targets every registered device.
    Send { target: Option<DeviceType>, data: Vec<u8> },
    Shutdown,
}

// ============================================================================
// Worker
// ============================================================================

struct SendWorker {
    devices: Arc<DeviceManager>,
    notices: Sender<OperatorNotice>,
}

impl SendWorker {
    fn run(&self, target: Option<DeviceType>, data: &[u8]) {
        match target {
            Some(device_type) => match self.devices.get_full_address(device_type) {
                Some(address) => self.send_to(device_type, &address, data),
                None => {
                    warn!(device = %device_type, "command for unregistered device dropped");
                    counter!(COMMANDS_SENT.name, "result" => "unroutable").increment(1);
                    self.notify(format!("{device_type} is not registered"));
                }
            },
            None => self.broadcast(data),
        }
    }

    fn send_to(&self, device_type: DeviceType, address: &FullAddress, data: &[u8]) {
        let Some(transport) = self.devices.get_transport(address) else {
            counter!(COMMANDS_SENT.name, "result" => "unroutable").increment(1);
            self.notify(format!("{device_type} has no transport"));
            return;
        };
        let result = transport.send(address, data);
        self.report(&address.to_string(), &device_type.to_string(), data.len(), result);
    }

    /// One broadcast per transport that has a registered device behind it.
    fn broadcast(&self, data: &[u8]) {
        let mut transports: BTreeMap<String, Arc<dyn Transport>> = BTreeMap::new();
        for (_, address) in self.devices.devices() {
            if let Some(transport) = self.devices.get_transport(&address) {
                transports.entry(address.transport.clone()).or_insert(transport);
            }
        }
        if transports.is_empty() {
            warn!("broadcast with no registered devices dropped");
            counter!(COMMANDS_SENT.name, "result" => "unroutable").increment(1);
            self.notify("no devices registered".to_string());
            return;
        }
        for (name, transport) in transports {
            let result = transport.broadcast(data);
            self.report(&name, &format!("broadcast on {name}"), data.len(), result);
        }
    }

    fn report(&self, destination: &str, target: &str, len: usize, result: Result<(), TransportError>) {
        match result {
            Ok(()) => {
                trace!(destination, len, "command sent");
                counter!(COMMANDS_SENT.name, "result" => "ok").increment(1);
            }
            Err(err @ TransportError::Timeout { .. }) => {
                warn!(destination, error = %err, "send timed out");
                counter!(COMMANDS_SENT.name, "result" => "timeout").increment(1);
                self.notify(format!("send to {target} timed out"));
            }
            Err(err) => {
                error!(destination, error = %err, "send failed");
                counter!(COMMANDS_SENT.name, "result" => "error").increment(1);
                self.notify(format!("send to {target} failed: {err}"));
            }
        }
    }

    fn notify(&self, message: String) {
        let _ = self.notices.send(OperatorNotice::new(message));
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Outbound queue plus its worker thread.
pub struct SendPipeline {
    tx: Sender<Job>,
    notices: Receiver<OperatorNotice>,
    shutdown: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SendPipeline {
    pub fn start(devices: Arc<DeviceManager>) -> Result<Self, PipelineError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (notice_tx, notices) = crossbeam_channel::unbounded();
        let worker = SendWorker {
            devices,
            notices: notice_tx,
        };

        let thread = thread::Builder::new()
            .name("send-pipeline".to_string())
            .spawn(move || send_main(worker, rx))
            .map_err(|e| PipelineError::spawn("send-pipeline", e))?;

        debug!("send pipeline started");
        Ok(SendPipeline {
            tx,
            notices,
            shutdown: AtomicBool::new(false),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Queue `data` for `device_type`.
    pub fn send(&self, device_type: DeviceType, data: Vec<u8>) -> Result<(), PipelineError> {
        self.enqueue(Some(device_type), data)
    }

    /// Queue `data` for every registered device. Each transport with a
    /// registered device gets one [`Transport::broadcast`].
    pub fn broadcast(&self, data: Vec<u8>) -> Result<(), PipelineError> {
        self.enqueue(None, data)
    }

    fn enqueue(&self, target: Option<DeviceType>, data: Vec<u8>) -> Result<(), PipelineError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PipelineError::Closed("send"));
        }
        self.tx
            .send(Job::Send { target, data })
            .map_err(|_| PipelineError::Closed("send"))
    }

    /// Receiver of operator notices. Every clone competes for the same notices.
    pub fn notices(&self) -> Receiver<OperatorNotice> {
        self.notices.clone()
    }

    /// Let the worker finish queued jobs, then join it. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Job::Shutdown);
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("send pipeline thread panicked");
            }
        }
        debug!("send pipeline stopped");
    }
}

impl Drop for SendPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn send_main(worker: SendWorker, rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Send { target, data } => worker.run(target, &data),
            Job::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DebugTransport, SentFrame};
    use std::time::Duration;

    fn setup() -> (Arc<DeviceManager>, Arc<DebugTransport>, Arc<DebugTransport>) {
        let devices = Arc::new(DeviceManager::new());
        let t1 = Arc::new(DebugTransport::new("t1", "HW_1"));
        let t2 = Arc::new(DebugTransport::new("t2", "HW_2"));
        devices.register(DeviceType::Stage1Flight, "HW_1", t1.clone()).unwrap();
        devices.register(DeviceType::Copilot, "HW_2", t2.clone()).unwrap();
        (devices, t1, t2)
    }

    #[test]
    fn test_routes_by_device_type() {
        let (devices, t1, t2) = setup();
        let pipeline = SendPipeline::start(devices).unwrap();

        pipeline.send(DeviceType::Copilot, vec![0x41]).unwrap();
        pipeline.broadcast(vec![0x50]).unwrap();
        pipeline.shutdown();

        assert_eq!(
            t2.sent(),
            vec![
                SentFrame {
                    address: Some(t2.full_address()),
                    data: vec![0x41]
                },
                SentFrame {
                    address: None,
                    data: vec![0x50]
                },
            ]
        );
        assert_eq!(t1.sent().len(), 1);
        assert_eq!(pipeline.send(DeviceType::Copilot, vec![1]), Err(PipelineError::Closed("send")));
    }

    #[test]
    fn test_timeout_becomes_notice() {
        let (devices, t1, _) = setup();
        t1.set_simulate_timeout(true);
        let pipeline = SendPipeline::start(devices).unwrap();
        let notices = pipeline.notices();

        pipeline.send(DeviceType::Stage1Flight, vec![0x41]).unwrap();
        pipeline.send(DeviceType::Stage2Flight, vec![0x41]).unwrap();

        let first = notices.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.message, "send to STAGE1_FLIGHT timed out");
        let second = notices.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(second.message, "STAGE2_FLIGHT is not registered");
        assert!(first.to_string().ends_with("] send to STAGE1_FLIGHT timed out"));
    }

    #[test]
    fn test_broadcast_once_per_transport() {
        let (devices, t1, t2) = setup();
        devices.register(DeviceType::Stage2Flight, "HW_3", t1.clone()).unwrap();
        t2.set_simulate_timeout(true);
        let pipeline = SendPipeline::start(devices).unwrap();
        let notices = pipeline.notices();

        pipeline.broadcast(vec![0x50]).unwrap();
        pipeline.shutdown();

        // Two devices share t1, which still sees a single broadcast frame
        assert_eq!(
            t1.sent(),
            vec![SentFrame {
                address: None,
                data: vec![0x50]
            }]
        );
        let notice = notices.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(notice.message, "send to broadcast on t2 timed out");
    }

    #[test]
    fn test_broadcast_without_devices_notifies() {
        let pipeline = SendPipeline::start(Arc::new(DeviceManager::new())).unwrap();
        let notices = pipeline.notices();
        pipeline.broadcast(vec![0x50]).unwrap();
        let notice = notices.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(notice.message, "no devices registered");
    }
}
