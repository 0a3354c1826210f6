//! Application context.
//!
//! Owns the device manager, the store, both pipelines, the autosave worker
//! and every transport. Worker threads only ever see the handles they were
//! built with.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::autosave::{AutosaveWorker, DEFAULT_AUTOSAVE_INTERVAL};
use crate::command::{parse_command, ParsedCommand};
use crate::device_manager::DeviceManager;
use crate::error::{Result, TransportError};
use crate::read_pipeline::{ReadPipeline, DEFAULT_READ_QUEUE_CAPACITY};
use crate::send_pipeline::{OperatorNotice, SendPipeline};
use crate::store::RocketData;
use crate::transport::Transport;

/// Settings for [`AppContext::start`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// CSV autosave target; `None` disables autosave.
    pub autosave_path: Option<PathBuf>,
    pub autosave_interval: Duration,
    pub read_queue_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            autosave_path: None,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            read_queue_capacity: DEFAULT_READ_QUEUE_CAPACITY,
        }
    }
}

/// The running ground station core.
pub struct AppContext {
    devices: Arc<DeviceManager>,
    store: Arc<RocketData>,
    read: ReadPipeline,
    send: SendPipeline,
    autosave: Option<AutosaveWorker>,
    transports: Mutex<Vec<Arc<dyn Transport>>>,
    shutdown: AtomicBool,
}

impl AppContext {
    /// Build the store and start every worker.
    pub fn start(config: ContextConfig) -> Result<Self> {
        let devices = Arc::new(DeviceManager::new());
        let store = Arc::new(RocketData::new(devices.clone()));
        let read = ReadPipeline::start(devices.clone(), store.clone(), config.read_queue_capacity)?;
        let send = SendPipeline::start(devices.clone())?;
        let autosave = config
            .autosave_path
            .map(|path| AutosaveWorker::start(store.clone(), path, config.autosave_interval))
            .transpose()?;

        Ok(AppContext {
            devices,
            store,
            read,
            send,
            autosave,
            transports: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn devices(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    pub fn store(&self) -> &Arc<RocketData> {
        &self.store
    }

    pub fn read_pipeline(&self) -> &ReadPipeline {
        &self.read
    }

    pub fn send_pipeline(&self) -> &SendPipeline {
        &self.send
    }

    /// Operator notices from the send pipeline.
    pub fn notices(&self) -> Receiver<OperatorNotice> {
        self.send.notices()
    }

    /// Start `transport` feeding the read pipeline. Names must be unique.
    pub fn add_transport(&self, transport: Arc<dyn Transport>) -> Result<()> {
        let mut transports = self.transports.lock();
        if transports.iter().any(|t| t.name() == transport.name()) {
            return Err(TransportError::startup(transport.name(), "duplicate transport name").into());
        }
        transport.start(self.read.callback_for(&transport))?;
        info!(transport = transport.name(), "transport added");
        transports.push(transport);
        Ok(())
    }

    /// Transport with the given name.
    pub fn transport(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.lock().iter().find(|t| t.name() == name).cloned()
    }

    /// Parse an operator line and queue the command.
    pub fn execute_command(&self, text: &str) -> Result<ParsedCommand> {
        let parsed = parse_command(text, &self.devices)?;
        self.send.send(parsed.device_type, parsed.wire.clone())?;
        Ok(parsed)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop transports, then pipelines, then autosave. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let transports: Vec<_> = self.transports.lock().drain(..).collect();
        for transport in transports {
            transport.shutdown();
        }
        self.read.shutdown();
        self.send.shutdown();
        if let Some(autosave) = &self.autosave {
            autosave.shutdown();
        }
        if !self.devices.is_empty() {
            info!(devices = self.devices.len(), "ground station stopped");
        } else {
            warn!("ground station stopped before any device registered");
        }
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
