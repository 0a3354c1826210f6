//! Threaded XBee module simulator.
//!
//! Sits between the simulated firmware and the ground station. Bytes the
//! firmware writes to its radio go through [`XBeeSimulator::received_from_rocket`]
//! into a queue drained by a dedicated parser thread. Payloads addressed to
//! the ground station come out of `ground_callback`; TX status frames and
//! RX indicators for the firmware come out of `rocket_callback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rocketlink_metrics::metric_defs::{XBEE_DROPPED, XBEE_FRAMES};
use rocketlink_metrics::metrics::counter;
use tracing::{debug, trace, warn};

use crate::constants::{
    BROADCAST_ADDRESS, DELIVERY_SUCCESS, DISCOVERY_NONE, RX_OPTIONS_BROADCAST,
    UNKNOWN_NETWORK_ADDRESS,
};
use crate::error::XBeeError;
use crate::frame::{format_address, ApiFrame, RxIndicator, TxRequest, TxStatus};
use crate::parser::FrameParser;

/// Receives one complete output: an encoded API frame for the rocket side,
/// or a payload for the ground side.
pub type XBeeCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Parser-thread input.
#[derive(Debug)]
enum Input {
    Bytes(Vec<u8>),
    Shutdown,
}

// ============================================================================
// Frame Handler
// ============================================================================

/// Frame-level behaviour of the module, confined to one thread.
pub struct FrameHandler {
    ground_address: u64,
    parser: FrameParser,
    rocket_callback: XBeeCallback,
    ground_callback: XBeeCallback,
}

impl FrameHandler {
    pub fn new(ground_address: u64, rocket_callback: XBeeCallback, ground_callback: XBeeCallback) -> Self {
        FrameHandler {
            ground_address,
            parser: FrameParser::new(),
            rocket_callback,
            ground_callback,
        }
    }

    /// Process raw bytes written by the firmware.
    pub fn handle_bytes(&mut self, data: &[u8]) {
        for result in self.parser.feed(data) {
            match result.and_then(|raw| raw.decode()) {
                Ok(frame) => self.handle_frame(frame),
                Err(err) => {
                    warn!(error = %err, "xbee frame dropped");
                    counter!(XBEE_DROPPED.name, "reason" => err.reason()).increment(1);
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: ApiFrame) {
        counter!(XBEE_FRAMES.name, "frame_type" => frame.type_name()).increment(1);
        match frame {
            ApiFrame::TxRequest(request) => self.handle_tx_request(request),
            other => {
                debug!(frame_type = other.frame_type(), "ignoring frame from firmware");
            }
        }
    }

    fn handle_tx_request(&mut self, request: TxRequest) {
        if request.destination == self.ground_address || request.destination == BROADCAST_ADDRESS {
            trace!(
                frame_id = request.frame_id,
                len = request.data.len(),
                "delivering tx request to ground"
            );
            (self.ground_callback)(&request.data);
        } else {
            debug!(
                destination = %format_address(request.destination),
                "tx request not addressed to ground station"
            );
            counter!(XBEE_DROPPED.name, "reason" => "address").increment(1);
        }

        let status = ApiFrame::TxStatus(TxStatus {
            frame_id: request.frame_id,
            network_address: request.network_address,
            retry_count: 0,
            delivery_status: DELIVERY_SUCCESS,
            discovery_status: DISCOVERY_NONE,
        });
        self.send_frame(&status);
    }

    fn send_frame(&self, frame: &ApiFrame) {
        match frame.encode() {
            Ok(bytes) => {
                counter!(XBEE_FRAMES.name, "frame_type" => frame.type_name()).increment(1);
                (self.rocket_callback)(&bytes);
            }
            Err(err) => warn!(error = %err, "failed to encode frame for firmware"),
        }
    }
}

/// Build the RX indicator the firmware sees for a ground transmission.
pub fn rx_indicator(ground_address: u64, data: &[u8]) -> ApiFrame {
    ApiFrame::RxIndicator(RxIndicator {
        source: ground_address,
        network_address: UNKNOWN_NETWORK_ADDRESS,
        options: RX_OPTIONS_BROADCAST,
        data: data.to_vec(),
    })
}

// ============================================================================
// Simulator
// ============================================================================

/// XBee module simulator with its own parser thread.
pub struct XBeeSimulator {
    ground_address: u64,
    rocket_callback: XBeeCallback,
    input_tx: Sender<Input>,
    shutdown: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl XBeeSimulator {
    /// Start the parser thread.
    pub fn start(
        ground_address: u64,
        rocket_callback: XBeeCallback,
        ground_callback: XBeeCallback,
    ) -> Result<Self, XBeeError> {
        let (input_tx, input_rx) = crossbeam_channel::unbounded();
        let handler = FrameHandler::new(ground_address, rocket_callback.clone(), ground_callback);

        let thread = thread::Builder::new()
            .name("xbee-parser".to_string())
            .spawn(move || parser_thread_main(handler, input_rx))
            .map_err(|e| XBeeError::Spawn(e.to_string()))?;

        debug!(ground = %format_address(ground_address), "xbee simulator started");
        Ok(XBeeSimulator {
            ground_address,
            rocket_callback,
            input_tx,
            shutdown: AtomicBool::new(false),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn ground_address(&self) -> u64 {
        self.ground_address
    }

    /// Queue raw bytes written by the firmware to its radio.
    pub fn received_from_rocket(&self, data: &[u8]) -> Result<(), XBeeError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(XBeeError::Closed);
        }
        self.input_tx
            .send(Input::Bytes(data.to_vec()))
            .map_err(|_| XBeeError::Closed)
    }

    /// Deliver a ground transmission to the firmware as an RX indicator.
    pub fn send_to_rocket(&self, data: &[u8]) -> Result<(), XBeeError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(XBeeError::Closed);
        }
        let frame = rx_indicator(self.ground_address, data);
        let bytes = frame.encode()?;
        counter!(XBEE_FRAMES.name, "frame_type" => frame.type_name()).increment(1);
        (self.rocket_callback)(&bytes);
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop the parser thread after it drains queued input. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.input_tx.send(Input::Shutdown);
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("xbee parser thread panicked");
            }
        }
        debug!("xbee simulator stopped");
    }
}

impl Drop for XBeeSimulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn parser_thread_main(mut handler: FrameHandler, input_rx: Receiver<Input>) {
    while let Ok(input) = input_rx.recv() {
        match input {
            Input::Bytes(data) => handler.handle_bytes(&data),
            Input::Shutdown => break,
        }
    }
}
