//! One conversation with a simulated flight computer.
//!
//! A [`SimSession`] reads the firmware's nibble-encoded output, performs the
//! SYN/ACK handshake, learns the byte order from the config packet and then
//! answers sub-protocol requests from its [`Hardware`]. Radio bytes are
//! handed to the XBee simulator. Everything going back to the firmware is
//! queued as [`Outbound`] for a writer that owns the firmware's input.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;

use crossbeam_channel::Sender;
use rocketlink_packet::ByteOrderConfig;
use rocketlink_xbee::{XBeeCallback, XBeeSimulator};
use tracing::{debug, error, info, trace, warn};

use crate::error::FirmwareError;
use crate::hardware::{Hardware, PinMode};
use crate::nibble::NibbleReader;
use crate::protocol::{
    analog_response, parse_config, sensor_response, time_response, Packet, Request, ACK, PACKET_RADIO, SYN,
};

/// Bytes of firmware output kept for diagnostics.
pub const HISTORY_LEN: usize = 256;

/// Bytes read before giving up on the handshake.
pub const MAX_HANDSHAKE_BYTES: usize = 64 * 1024;

/// Queued for the firmware writer. Bytes are raw; the writer nibble-encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Bytes(Vec<u8>),
    Shutdown,
}

/// XBee callback that wraps each frame in a radio packet for the firmware.
pub fn radio_callback(outbound: Sender<Outbound>) -> XBeeCallback {
    Arc::new(move |frame: &[u8]| match Packet::new(PACKET_RADIO, frame.to_vec()).encode() {
        Ok(bytes) => {
            if outbound.send(Outbound::Bytes(bytes)).is_err() {
                debug!("firmware writer gone, radio frame dropped");
            }
        }
        Err(err) => warn!(error = %err, "radio frame too long for firmware"),
    })
}

// ============================================================================
// History
// ============================================================================

/// Ring buffer of the most recent bytes.
#[derive(Debug, Clone)]
pub struct ByteHistory {
    bytes: VecDeque<u8>,
    capacity: usize,
}

impl ByteHistory {
    pub fn new(capacity: usize) -> Self {
        ByteHistory {
            bytes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            if self.bytes.len() == self.capacity {
                self.bytes.pop_front();
            }
            self.bytes.push_back(byte);
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.iter().copied().collect()
    }

    pub fn hex_dump(&self) -> String {
        hex::encode_upper(self.contents())
    }
}

/// Decoding reader that remembers what it returned.
struct HistoryReader<R> {
    inner: NibbleReader<R>,
    history: ByteHistory,
}

impl<R: Read> Read for HistoryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.history.extend(&buf[..n]);
        Ok(n)
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct SimSession<R> {
    reader: HistoryReader<R>,
    outbound: Sender<Outbound>,
    hardware: Hardware,
    xbee: Arc<XBeeSimulator>,
    cfg: ByteOrderConfig,
}

impl<R: Read> SimSession<R> {
    /// `reader` is the firmware's raw (nibble-encoded) output.
    pub fn new(reader: R, outbound: Sender<Outbound>, hardware: Hardware, xbee: Arc<XBeeSimulator>) -> Self {
        SimSession {
            reader: HistoryReader {
                inner: NibbleReader::new(reader),
                history: ByteHistory::new(HISTORY_LEN),
            },
            outbound,
            hardware,
            xbee,
            cfg: ByteOrderConfig::default(),
        }
    }

    pub fn byte_order(&self) -> ByteOrderConfig {
        self.cfg
    }

    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    pub fn history(&self) -> &ByteHistory {
        &self.reader.history
    }

    /// Wait for `SYN`, answer `ACK` and read the config packet.
    pub fn handshake(&mut self) -> Result<ByteOrderConfig, FirmwareError> {
        let mut window = [0u8; 3];
        let mut seen = 0usize;
        while window != *SYN {
            let mut byte = [0u8; 1];
            if self.reader.read(&mut byte)? == 0 {
                return Err(FirmwareError::handshake("stream closed before SYN"));
            }
            seen += 1;
            if seen > MAX_HANDSHAKE_BYTES {
                return Err(FirmwareError::handshake(format!("no SYN in {MAX_HANDSHAKE_BYTES} bytes")));
            }
            window = [window[1], window[2], byte[0]];
        }
        self.send(ACK.to_vec())?;

        let packet = Packet::read_from(&mut self.reader)?
            .ok_or_else(|| FirmwareError::handshake("stream closed before config"))?;
        self.cfg = parse_config(&packet)?;
        info!(
            big_endian_ints = self.cfg.big_endian_ints,
            big_endian_floats = self.cfg.big_endian_floats,
            "firmware handshake complete"
        );
        Ok(self.cfg)
    }

    /// Serve requests until the firmware's output ends.
    ///
    /// Malformed requests are logged and skipped; only read errors end the
    /// session early.
    pub fn run(&mut self) -> Result<(), FirmwareError> {
        loop {
            let packet = match Packet::read_from(&mut self.reader) {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(()),
                Err(err) if err.is_eof() => {
                    debug!("firmware output ended mid-packet");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            if let Err(err) = self.handle(packet) {
                warn!(error = %err, "firmware request failed");
            }
        }
    }

    /// Handle one sub-protocol packet.
    pub fn handle(&mut self, packet: Packet) -> Result<(), FirmwareError> {
        trace!(id = packet.id, len = packet.payload.len(), "firmware packet");
        match Request::parse(packet, &self.cfg)? {
            Request::Buzzer { song } => self.hardware.play(song),
            Request::PinMode { pin, output } => {
                let mode = if output { PinMode::Output } else { PinMode::Input };
                self.hardware.set_pin_mode(pin, mode);
            }
            Request::DigitalWrite { pin, high } => self.hardware.digital_write(pin, high),
            Request::Radio(bytes) => self.xbee.received_from_rocket(&bytes)?,
            Request::AnalogRead { pin } => {
                let level = self.hardware.analog_read(pin);
                self.respond(analog_response(level))?;
            }
            Request::SensorRead { sensor } => {
                let values = self.hardware.sensor_read(sensor.into());
                self.respond(sensor_response(&values, &self.cfg))?;
            }
            Request::TimeUpdate { elapsed_ms } => {
                let millis = self.hardware.advance_clock(elapsed_ms);
                self.respond(time_response(millis, &self.cfg))?;
            }
            Request::Unknown(packet) => {
                error!(
                    id = %format!("0x{:02X}", packet.id),
                    len = packet.payload.len(),
                    history = %self.reader.history.hex_dump(),
                    "unknown packet from firmware"
                );
            }
        }
        Ok(())
    }

    fn respond(&self, packet: Packet) -> Result<(), FirmwareError> {
        self.send(packet.encode()?)
    }

    fn send(&self, bytes: Vec<u8>) -> Result<(), FirmwareError> {
        self.outbound
            .send(Outbound::Bytes(bytes))
            .map_err(|_| FirmwareError::Io(io::ErrorKind::BrokenPipe.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut history = ByteHistory::new(4);
        history.extend(&[1, 2, 3]);
        history.extend(&[4, 5, 6]);
        assert_eq!(history.contents(), vec![3, 4, 5, 6]);
        assert_eq!(history.hex_dump(), "03040506");
    }

    #[test]
    fn test_radio_callback_wraps_frames() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let callback = radio_callback(tx);
        callback(&[0x7E, 0x01]);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Bytes(vec![0x52, 0x00, 0x02, 0x7E, 0x01]));
    }
}
