//! Inbound pipeline: radio payloads to stored bundles.
//!
//! Transports push [`ConnectionMessage`]s into a bounded queue without
//! blocking. One worker thread drains the queue, decodes every subpacket,
//! registers devices on their config packets and files the bundles in the
//! store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use rocketlink_metrics::metric_defs::{PACKETS_DECODED, PACKET_DECODE_ERRORS};
use rocketlink_metrics::metrics::counter;
use rocketlink_packet::{extract_all, Bundle, Recovery};
use tracing::{debug, error, trace, warn};

use crate::device_manager::DeviceManager;
use crate::error::PipelineError;
use crate::store::RocketData;
use crate::transport::{ConnectionMessage, FullAddress, ReceiveCallback, Transport};

/// Default capacity of the inbound queue.
pub const DEFAULT_READ_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Item {
    Message(ConnectionMessage),
    Shutdown,
}

// ============================================================================
// Worker
// ============================================================================

/// Decoding and routing state, confined to the worker thread.
pub struct ReadWorker {
    devices: Arc<DeviceManager>,
    store: Arc<RocketData>,
    /// Hardware ids whose registration was refused.
    rejected: HashSet<String>,
    /// Unregistered addresses already warned about.
    warned: HashSet<FullAddress>,
}

impl ReadWorker {
    pub fn new(devices: Arc<DeviceManager>, store: Arc<RocketData>) -> Self {
        ReadWorker {
            devices,
            store,
            rejected: HashSet::new(),
            warned: HashSet::new(),
        }
    }

    /// Decode and file every subpacket of one message, in wire order.
    ///
    /// Returns the number of bundles decoded.
    pub fn process(&mut self, message: &ConnectionMessage) -> usize {
        let transport = message.transport.name().to_string();
        let address = message.full_address();
        let cfg = message.transport.byte_order();

        let mut decoded = 0;
        let mut subpackets = extract_all(&message.data, &cfg);
        while let Some(result) = subpackets.next() {
            match result {
                Ok(bundle) => {
                    decoded += 1;
                    counter!(PACKETS_DECODED.name, "transport" => transport.clone()).increment(1);
                    self.handle_bundle(message, address.as_ref(), bundle);
                }
                Err(err) => {
                    let origin = address
                        .as_ref()
                        .map_or_else(|| transport.clone(), ToString::to_string);
                    if err.recovery() == Recovery::DiscardChunk {
                        error!(address = %origin, error = %err, "decode error, discarding rest of chunk");
                    } else {
                        error!(
                            address = %origin,
                            error = %err,
                            offset = subpackets.position(),
                            "decode error"
                        );
                    }
                    counter!(
                        PACKET_DECODE_ERRORS.name,
                        "transport" => transport.clone(),
                        "kind" => err.kind()
                    )
                    .increment(1);
                }
            }
        }
        trace!(transport = %transport, decoded, len = message.data.len(), "message processed");
        decoded
    }

    fn handle_bundle(&mut self, message: &ConnectionMessage, address: Option<&FullAddress>, bundle: Bundle) {
        let Some(address) = address else {
            debug!(transport = message.transport.name(), "dropping bundle without hwid");
            return;
        };
        if self.rejected.contains(&address.device) {
            warn!(%address, "dropping packet from rejected device");
            return;
        }

        if let Some(device_type) = bundle.device_type() {
            match device_type.known() {
                Ok(device_type) => {
                    if self
                        .devices
                        .register(device_type, &address.device, message.transport.clone())
                        .is_err()
                    {
                        self.rejected.insert(address.device.clone());
                        return;
                    }
                    self.warned.remove(address);
                }
                Err(err) => {
                    error!(%address, error = %err, "config from unknown device type");
                    counter!(
                        PACKET_DECODE_ERRORS.name,
                        "transport" => address.transport.clone(),
                        "kind" => err.kind()
                    )
                    .increment(1);
                }
            }
        }

        if self.devices.get_device_type(address).is_none() && self.warned.insert(address.clone()) {
            warn!(%address, "storing data from unregistered device");
        }
        self.store.add_bundle(address, bundle);
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Bounded inbound queue plus its worker thread.
pub struct ReadPipeline {
    tx: Sender<Item>,
    shutdown: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ReadPipeline {
    /// Start the worker with a queue of `capacity` messages.
    pub fn start(
        devices: Arc<DeviceManager>,
        store: Arc<RocketData>,
        capacity: usize,
    ) -> Result<Self, PipelineError> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let worker = ReadWorker::new(devices, store);

        let thread = thread::Builder::new()
            .name("read-pipeline".to_string())
            .spawn(move || read_main(worker, rx))
            .map_err(|e| PipelineError::spawn("read-pipeline", e))?;

        debug!(capacity, "read pipeline started");
        Ok(ReadPipeline {
            tx,
            shutdown: AtomicBool::new(false),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Queue a message without blocking.
    pub fn submit(&self, message: ConnectionMessage) -> Result<(), PipelineError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PipelineError::Closed("read"));
        }
        submit_to(&self.tx, message)
    }

    /// Receive callback to hand to `transport.start()`.
    ///
    /// Holds only a weak reference to the transport so the callback stored
    /// inside the transport does not keep it alive.
    pub fn callback_for(&self, transport: &Arc<dyn Transport>) -> ReceiveCallback {
        let tx = self.tx.clone();
        let weak: Weak<dyn Transport> = Arc::downgrade(transport);
        Arc::new(move |hwid, data| {
            let Some(transport) = weak.upgrade() else {
                return;
            };
            let name = transport.name().to_string();
            if let Err(err) = submit_to(&tx, ConnectionMessage { hwid, transport, data }) {
                warn!(transport = %name, error = %err, "inbound message dropped");
            }
        })
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Let the worker drain the queue, then join it. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Item::Shutdown);
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("read pipeline thread panicked");
            }
        }
        debug!("read pipeline stopped");
    }
}

impl Drop for ReadPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn submit_to(tx: &Sender<Item>, message: ConnectionMessage) -> Result<(), PipelineError> {
    tx.try_send(Item::Message(message)).map_err(|err| match err {
        TrySendError::Full(_) => PipelineError::QueueFull("read"),
        TrySendError::Disconnected(_) => PipelineError::Closed("read"),
    })
}

fn read_main(mut worker: ReadWorker, rx: Receiver<Item>) {
    while let Ok(item) = rx.recv() {
        match item {
            Item::Message(message) => {
                worker.process(&message);
            }
            Item::Shutdown => break,
        }
    }
}
