//! Simulated flight computer hardware.
//!
//! The firmware drives pins, reads analog levels and sensors, and asks for
//! the time. This module answers those requests from plain in-memory state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

/// Analog level read on an ignitor's read pin with continuity.
pub const IGNITOR_CONNECTED_LEVEL: u16 = 300;
/// Analog level read on an ignitor's read pin without continuity.
pub const IGNITOR_DISCONNECTED_LEVEL: u16 = 0;

// ============================================================================
// Pins
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinMode {
    #[default]
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pin {
    pub mode: PinMode,
    pub high: bool,
}

// ============================================================================
// Ignitors
// ============================================================================

/// Notified with the ignitor name when it fires.
pub type FireCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A pyrotechnic ignitor wired to three pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ignitor {
    pub name: String,
    /// Driven high by the firmware to test continuity.
    pub test_pin: u8,
    /// Analog pin the continuity level is read on.
    pub read_pin: u8,
    /// Driven high by the firmware to fire.
    pub fire_pin: u8,
    pub continuity: bool,
    pub fired: bool,
}

impl Ignitor {
    pub fn new(name: impl Into<String>, test_pin: u8, read_pin: u8, fire_pin: u8) -> Self {
        Ignitor {
            name: name.into(),
            test_pin,
            read_pin,
            fire_pin,
            continuity: true,
            fired: false,
        }
    }

    /// Standard drogue and main ignitors of the flight computer.
    pub fn defaults() -> Vec<Ignitor> {
        vec![Ignitor::new("drogue", 2, 14, 3), Ignitor::new("main", 4, 15, 5)]
    }
}

// ============================================================================
// Sensors
// ============================================================================

/// Sensor families the firmware can poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Barometer,
    Gps,
    Accelerometer,
    Imu,
    Temperature,
    Unknown(u8),
}

impl From<u8> for SensorKind {
    fn from(code: u8) -> Self {
        match code {
            0 => SensorKind::Barometer,
            1 => SensorKind::Gps,
            2 => SensorKind::Accelerometer,
            3 => SensorKind::Imu,
            4 => SensorKind::Temperature,
            other => SensorKind::Unknown(other),
        }
    }
}

impl SensorKind {
    pub fn code(&self) -> u8 {
        match self {
            SensorKind::Barometer => 0,
            SensorKind::Gps => 1,
            SensorKind::Accelerometer => 2,
            SensorKind::Imu => 3,
            SensorKind::Temperature => 4,
            SensorKind::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Unknown(code) => write!(f, "sensor 0x{code:02X}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Source of simulated sensor readings.
pub trait Sensor: Send {
    fn kind(&self) -> SensorKind;

    /// Current reading, one float per channel.
    fn read(&mut self) -> Vec<f32>;
}

/// A sensor that always reports the same values.
#[derive(Debug, Clone)]
pub struct ConstantSensor {
    kind: SensorKind,
    values: Vec<f32>,
}

impl ConstantSensor {
    pub fn new(kind: SensorKind, values: impl Into<Vec<f32>>) -> Self {
        ConstantSensor {
            kind,
            values: values.into(),
        }
    }
}

impl Sensor for ConstantSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn read(&mut self) -> Vec<f32> {
        self.values.clone()
    }
}

// ============================================================================
// Hardware
// ============================================================================

/// All simulated peripherals of one flight computer.
pub struct Hardware {
    pins: HashMap<u8, Pin>,
    ignitors: Vec<Ignitor>,
    sensors: HashMap<SensorKind, Box<dyn Sensor>>,
    millis: u32,
    songs: Vec<u8>,
    on_fire: Option<FireCallback>,
}

impl Default for Hardware {
    fn default() -> Self {
        Self::new(Ignitor::defaults())
    }
}

impl Hardware {
    pub fn new(ignitors: Vec<Ignitor>) -> Self {
        Hardware {
            pins: HashMap::new(),
            ignitors,
            sensors: HashMap::new(),
            millis: 0,
            songs: Vec::new(),
            on_fire: None,
        }
    }

    pub fn add_sensor(&mut self, sensor: Box<dyn Sensor>) {
        self.sensors.insert(sensor.kind(), sensor);
    }

    pub fn set_fire_callback(&mut self, callback: FireCallback) {
        self.on_fire = Some(callback);
    }

    pub fn pin(&self, pin: u8) -> Pin {
        self.pins.get(&pin).copied().unwrap_or_default()
    }

    pub fn ignitors(&self) -> &[Ignitor] {
        &self.ignitors
    }

    pub fn ignitor_mut(&mut self, name: &str) -> Option<&mut Ignitor> {
        self.ignitors.iter_mut().find(|i| i.name == name)
    }

    pub fn millis(&self) -> u32 {
        self.millis
    }

    /// Songs played on the buzzer, oldest first.
    pub fn songs(&self) -> &[u8] {
        &self.songs
    }

    pub fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        self.pins.entry(pin).or_default().mode = mode;
        debug!(pin, ?mode, "pin mode set");
    }

    /// Drive `pin`. The firmware's write request resets the pin to an input
    /// before setting the level.
    pub fn digital_write(&mut self, pin: u8, high: bool) {
        let state = self.pins.entry(pin).or_default();
        state.mode = PinMode::Input;
        state.high = high;
        if !high {
            return;
        }

        let mut fired = Vec::new();
        for ignitor in self.ignitors.iter_mut().filter(|i| i.fire_pin == pin) {
            if ignitor.fired {
                continue;
            }
            ignitor.fired = true;
            ignitor.continuity = false;
            info!(ignitor = %ignitor.name, pin, "ignitor fired");
            fired.push(ignitor.name.clone());
        }
        if let Some(callback) = &self.on_fire {
            for name in &fired {
                callback(name);
            }
        }
    }

    /// Level on an analog pin.
    pub fn analog_read(&self, pin: u8) -> u16 {
        let Some(ignitor) = self.ignitors.iter().find(|i| i.read_pin == pin) else {
            return 0;
        };
        if ignitor.continuity && self.pin(ignitor.test_pin).high {
            IGNITOR_CONNECTED_LEVEL
        } else {
            IGNITOR_DISCONNECTED_LEVEL
        }
    }

    /// Poll a sensor. Missing sensors read as no channels.
    pub fn sensor_read(&mut self, kind: SensorKind) -> Vec<f32> {
        match self.sensors.get_mut(&kind) {
            Some(sensor) => sensor.read(),
            None => {
                warn!(sensor = %kind, "no simulated sensor attached");
                Vec::new()
            }
        }
    }

    /// Advance the clock. Returns the new millisecond count.
    pub fn advance_clock(&mut self, elapsed_ms: u32) -> u32 {
        self.millis = self.millis.wrapping_add(elapsed_ms);
        self.millis
    }

    pub fn play(&mut self, song: u8) {
        info!(song, "buzzer");
        self.songs.push(song);
    }
}
