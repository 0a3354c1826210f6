//! Transport backed by a simulated firmware child process.
//!
//! Three threads per transport: the session thread reads the child's output,
//! the writer thread owns the child's input, and the XBee simulator's parser
//! thread turns radio bytes into payloads for the ground.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use rocketlink_core::{FullAddress, ReceiveCallback, Transport, TransportError};
use rocketlink_packet::ByteOrderConfig;
use rocketlink_xbee::{rx_indicator, XBeeCallback, XBeeSimulator};
use tracing::{debug, error, info, warn};

use crate::hardware::{Hardware, Ignitor, Sensor};
use crate::nibble::NibbleWriter;
use crate::protocol::{Packet, PACKET_RADIO};
use crate::session::{radio_callback, Outbound, SimSession};

/// Default time a send may wait for room in the firmware's input queue.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the queue feeding the firmware's input.
pub const OUTBOUND_CAPACITY: usize = 256;

/// How to launch one simulated flight computer.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Transport name.
    pub name: String,
    pub firmware: PathBuf,
    pub args: Vec<String>,
    /// Hardware id reported for everything this firmware sends.
    pub hwid: String,
    /// 64-bit XBee address of the ground station.
    pub ground_address: u64,
    pub ignitors: Vec<Ignitor>,
    pub send_timeout: Duration,
}

impl SimConfig {
    pub fn new(name: impl Into<String>, firmware: impl Into<PathBuf>, hwid: impl Into<String>, ground_address: u64) -> Self {
        SimConfig {
            name: name.into(),
            firmware: firmware.into(),
            args: Vec::new(),
            hwid: hwid.into(),
            ground_address,
            ignitors: Ignitor::defaults(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

struct Running {
    child: Child,
    xbee: Arc<XBeeSimulator>,
    outbound: Sender<Outbound>,
    session: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// A [`Transport`] talking to a firmware child process through the XBee
/// simulator.
pub struct SimTransport {
    config: SimConfig,
    byte_order: Arc<RwLock<ByteOrderConfig>>,
    hardware: Mutex<Option<Hardware>>,
    running: Mutex<Option<Running>>,
    closed: AtomicBool,
}

impl SimTransport {
    pub fn new(config: SimConfig) -> Self {
        let hardware = Hardware::new(config.ignitors.clone());
        SimTransport {
            config,
            byte_order: Arc::new(RwLock::new(ByteOrderConfig::default())),
            hardware: Mutex::new(Some(hardware)),
            running: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Attach a sensor. Only effective before [`Transport::start`].
    pub fn add_sensor(&self, sensor: Box<dyn Sensor>) {
        match self.hardware.lock().as_mut() {
            Some(hardware) => hardware.add_sensor(sensor),
            None => warn!(transport = %self.config.name, "sensor added after start ignored"),
        }
    }

    pub fn hwid(&self) -> &str {
        &self.config.hwid
    }

    pub fn full_address(&self) -> FullAddress {
        FullAddress::new(self.config.name.clone(), self.config.hwid.clone())
    }

    fn spawn_child(&self) -> Result<Child, TransportError> {
        Command::new(&self.config.firmware)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                TransportError::startup(
                    &self.config.name,
                    format!("failed to launch {}: {e}", self.config.firmware.display()),
                )
            })
    }

    fn outbound(&self) -> Result<Sender<Outbound>, TransportError> {
        self.running
            .lock()
            .as_ref()
            .map(|running| running.outbound.clone())
            .ok_or_else(|| TransportError::Closed(self.config.name.clone()))
    }
}

impl Transport for SimTransport {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn byte_order(&self) -> ByteOrderConfig {
        *self.byte_order.read()
    }

    fn start(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        let name = self.config.name.clone();
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed(name));
        }
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(TransportError::startup(name, "already started"));
        }

        let mut child = self.spawn_child()?;
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                return Err(TransportError::startup(name, "child pipes unavailable"));
            }
        };

        let (outbound, outbound_rx) = crossbeam_channel::bounded(OUTBOUND_CAPACITY);
        let writer = thread::Builder::new()
            .name(format!("sim-writer-{name}"))
            .spawn({
                let name = name.clone();
                move || writer_main(&name, NibbleWriter::new(stdin), outbound_rx)
            })
            .map_err(|e| TransportError::startup(&name, e))?;

        let hwid = self.config.hwid.clone();
        let ground_callback: XBeeCallback = Arc::new(move |data: &[u8]| callback(Some(hwid.clone()), data.to_vec()));
        let xbee = XBeeSimulator::start(
            self.config.ground_address,
            radio_callback(outbound.clone()),
            ground_callback,
        )
        .map(Arc::new)
        .map_err(|e| TransportError::startup(&name, e))?;

        let hardware = self.hardware.lock().take().unwrap_or_default();
        let session = thread::Builder::new()
            .name(format!("sim-session-{name}"))
            .spawn({
                let name = name.clone();
                let outbound = outbound.clone();
                let xbee = xbee.clone();
                let byte_order = self.byte_order.clone();
                move || {
                    let mut session = SimSession::new(stdout, outbound, hardware, xbee);
                    match session.handshake() {
                        Ok(cfg) => *byte_order.write() = cfg,
                        Err(err) => {
                            error!(transport = %name, error = %err, "firmware handshake failed");
                            return;
                        }
                    }
                    if let Err(err) = session.run() {
                        error!(transport = %name, error = %err, "firmware session failed");
                    }
                    info!(transport = %name, "firmware output closed");
                }
            })
            .map_err(|e| TransportError::startup(&name, e))?;

        info!(transport = %name, firmware = %self.config.firmware.display(), "simulated firmware started");
        *running = Some(Running {
            child,
            xbee,
            outbound,
            session,
            writer,
        });
        Ok(())
    }

    fn send(&self, address: &FullAddress, data: &[u8]) -> Result<(), TransportError> {
        if address.device != self.config.hwid {
            debug!(%address, hwid = %self.config.hwid, "sim transport has a single device");
        }
        let frame = rx_indicator(self.config.ground_address, data)
            .encode()
            .map_err(|e| TransportError::io(&self.config.name, e))?;
        let packet = Packet::new(PACKET_RADIO, frame)
            .encode()
            .map_err(|e| TransportError::io(&self.config.name, e))?;

        self.outbound()?
            .send_timeout(Outbound::Bytes(packet), self.config.send_timeout)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => TransportError::Timeout {
                    transport: self.config.name.clone(),
                    timeout: self.config.send_timeout,
                },
                SendTimeoutError::Disconnected(_) => TransportError::Closed(self.config.name.clone()),
            })
    }

    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError> {
        self.send(&self.full_address(), data)
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(mut running) = self.running.lock().take() else {
            return;
        };

        if let Err(err) = running.child.kill() {
            debug!(transport = %self.config.name, error = %err, "firmware already exited");
        }
        let _ = running.child.wait();
        running.xbee.shutdown();
        let _ = running
            .outbound
            .send_timeout(Outbound::Shutdown, Duration::from_secs(1));
        for (label, handle) in [("writer", running.writer), ("session", running.session)] {
            if handle.join().is_err() {
                warn!(transport = %self.config.name, thread = label, "sim thread panicked");
            }
        }
        info!(transport = %self.config.name, "simulated firmware stopped");
    }
}

impl Drop for SimTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn writer_main<W: Write>(name: &str, mut writer: NibbleWriter<W>, rx: Receiver<Outbound>) {
    while let Ok(item) = rx.recv() {
        match item {
            Outbound::Bytes(bytes) => {
                if let Err(err) = writer.write_all(&bytes).and_then(|()| writer.flush()) {
                    warn!(transport = %name, error = %err, "firmware input closed");
                    break;
                }
            }
            Outbound::Shutdown => break,
        }
    }
}
