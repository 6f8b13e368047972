//! Sensor readings.
//!
//! The node carries a climate sensor (temperature, pressure, humidity) and an
//! ambient light sensor. Their register-level drivers live outside this crate
//! and plug in through [`Sensor`]; this module turns their samples plus the
//! wall-clock time into the ordered [`Reading`] that gets published.
//!
//! The orchestrator only sees the [`Telemetry`] trait.

/// Ordered field → value mapping
pub mod reading;

/// Driver seam, lifecycle wrapper and mode selection
pub mod sensor;

/// The collector combining both sensors and the calendar
pub mod collector;

pub use collector::Collector;
pub use reading::{FieldList, FieldName, Reading, Value};
pub use sensor::{Channel, Climate, Lifecycle, Lux, Managed, Sample, Sensor, SensorMode};

/// Field names the collector can fill.
pub const KNOWN_FIELDS: [&str; 6] = ["date", "time", "temp", "pressure", "humidity", "lux"];

/// Which physical sensor a fault belongs to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SensorId {
    /// Temperature / pressure / humidity sensor.
    Climate,
    /// Ambient light sensor.
    Light,
}

impl SensorId {
    /// Short name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            SensorId::Climate => "climate",
            SensorId::Light => "light",
        }
    }
}

/// What went wrong with a sensor.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SensorFault {
    /// The driver was read before a successful init.
    NotInitialized,
    /// Init failed.
    InitFailed,
    /// The bus transaction failed.
    Bus,
    /// The driver returned an impossible value.
    InvalidSample,
}

/// A sensor could not deliver its sample this cycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SensorError {
    /// The failing sensor.
    pub sensor: SensorId,
    /// The failure.
    pub fault: SensorFault,
}

impl SensorError {
    /// Shorthand constructor.
    pub const fn new(sensor: SensorId, fault: SensorFault) -> Self {
        Self { sensor, fault }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, f: defmt::Formatter) {
        let sensor = self.sensor.name();
        match self.fault {
            SensorFault::NotInitialized => defmt::write!(f, "{=str}: NotInitialized", sensor),
            SensorFault::InitFailed => defmt::write!(f, "{=str}: InitFailed", sensor),
            SensorFault::Bus => defmt::write!(f, "{=str}: Bus", sensor),
            SensorFault::InvalidSample => defmt::write!(f, "{=str}: InvalidSample", sensor),
        }
    }
}

/// Produces one reading per cycle.
pub trait Telemetry {
    /// Bring every enabled sensor up. Called once before the first cycle.
    fn start(&mut self) -> Result<(), SensorError>;

    /// Read every enabled sensor and build the reading for the configured
    /// field list.
    fn read_all(&mut self) -> Result<Reading, SensorError>;

    /// Best-effort recovery of a failing sensor, e.g. a power cycle.
    fn reset(&mut self, sensor: SensorId);
}

/// Broken-down local time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    /// Full year, e.g. 2024.
    pub year: u16,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    /// 0..=23
    pub hour: u8,
    /// 0..=59
    pub minute: u8,
    /// 0..=59
    pub second: u8,
}

/// Wall-clock source, typically the RTC after NTP sync.
pub trait Calendar {
    /// Current local time.
    fn now(&self) -> DateTime;
}
