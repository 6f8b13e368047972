//! Sensor drivers and how the node runs them.
//!
//! A register-level driver implements [`Sensor`]. The node never calls it
//! directly:
//!
//! - [`Managed`] adds an explicit `Uninitialized → Ready` lifecycle. Drivers
//!   are initialised eagerly at startup; reading an uninitialised driver is an
//!   error instead of an implicit init.
//! - [`Channel`] is what the configured [`SensorMode`] resolves to once at
//!   startup: the real driver, a simulator, or nothing.

use super::{SensorError, SensorFault, SensorId};
use crate::config::ConfigError;
use core::str::FromStr;
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A value a sensor produces.
pub trait Sample: Copy {
    /// Whether the value is physically possible.
    fn is_plausible(&self) -> bool {
        true
    }

    /// A believable value for dummy mode.
    fn simulate(rng: &mut SmallRng) -> Self;
}

/// Temperature, pressure and humidity from the climate sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Hectopascal.
    pub pressure: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
}

impl Sample for Climate {
    fn is_plausible(&self) -> bool {
        self.temperature.is_finite() && self.pressure.is_finite() && self.humidity.is_finite()
    }

    fn simulate(rng: &mut SmallRng) -> Self {
        Self {
            temperature: rng.gen_range(20.0..25.0),
            pressure: rng.gen_range(990.0..1010.0),
            humidity: rng.gen_range(40.0..60.0),
        }
    }
}

/// Illuminance from the light sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lux(pub f32);

impl Sample for Lux {
    fn is_plausible(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }

    fn simulate(rng: &mut SmallRng) -> Self {
        Lux(rng.gen_range(300u16..=800) as f32)
    }
}

/// A register-level sensor driver.
pub trait Sensor {
    /// What one read produces.
    type Sample: Sample;

    /// Configure the device after power-up.
    fn init(&mut self) -> Result<(), SensorFault>;

    /// Take one measurement.
    fn read(&mut self) -> Result<Self::Sample, SensorFault>;

    /// Switch the sensor's supply off and on again.
    fn power_cycle(&mut self) -> Result<(), SensorFault>;
}

/// Lifecycle of a [`Managed`] driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not (successfully) initialised yet.
    Uninitialized,
    /// Initialised, reads go to the device.
    Ready,
}

/// A driver with an explicit lifecycle.
#[derive(Debug)]
pub struct Managed<S: Sensor> {
    id: SensorId,
    driver: S,
    lifecycle: Lifecycle,
}

impl<S: Sensor> Managed<S> {
    /// Wrap an uninitialised driver.
    pub fn new(id: SensorId, driver: S) -> Self {
        Self {
            id,
            driver,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    /// Initialise the driver.
    pub fn start(&mut self) -> Result<(), SensorError> {
        match self.driver.init() {
            Ok(()) => {
                self.lifecycle = Lifecycle::Ready;
                info!("sensor: {} ready", self.id.name());
                Ok(())
            }
            Err(fault) => {
                self.lifecycle = Lifecycle::Uninitialized;
                warn!("sensor: {} init failed: {:?}", self.id.name(), fault);
                Err(SensorError::new(self.id, SensorFault::InitFailed))
            }
        }
    }

    /// Read one sample; fails while `Uninitialized`.
    pub fn read(&mut self) -> Result<S::Sample, SensorError> {
        if self.lifecycle != Lifecycle::Ready {
            return Err(SensorError::new(self.id, SensorFault::NotInitialized));
        }
        let sample = self
            .driver
            .read()
            .map_err(|fault| SensorError::new(self.id, fault))?;
        if !sample.is_plausible() {
            return Err(SensorError::new(self.id, SensorFault::InvalidSample));
        }
        Ok(sample)
    }

    /// Power-cycle and re-initialise.
    pub fn reset(&mut self) -> Result<(), SensorError> {
        info!("sensor: power-cycling {}", self.id.name());
        self.lifecycle = Lifecycle::Uninitialized;
        self.driver
            .power_cycle()
            .map_err(|fault| SensorError::new(self.id, fault))?;
        self.start()
    }

    /// Current lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &S {
        &self.driver
    }
}

/// How a sensor is run, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorMode {
    /// Read the real device.
    #[default]
    Active,
    /// Publish simulated values.
    Dummy,
    /// Publish `null` for the sensor's fields.
    Inactive,
}

impl FromStr for SensorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(SensorMode::Active),
            "dummy" => Ok(SensorMode::Dummy),
            "inactive" => Ok(SensorMode::Inactive),
            _ => Err(ConfigError::UnknownSensorMode),
        }
    }
}

/// A sensor slot resolved from its [`SensorMode`].
#[derive(Debug)]
pub enum Channel<S: Sensor> {
    /// The real device.
    Active(Managed<S>),
    /// Simulated samples.
    Dummy(SmallRng),
    /// No samples.
    Inactive,
}

impl<S: Sensor> Channel<S> {
    /// Resolve `mode` for `driver`. `seed` feeds the simulator in dummy mode;
    /// the driver is dropped unless the mode is `Active`.
    pub fn resolve(mode: SensorMode, id: SensorId, driver: S, seed: u64) -> Self {
        match mode {
            SensorMode::Active => Channel::Active(Managed::new(id, driver)),
            SensorMode::Dummy => Channel::Dummy(SmallRng::seed_from_u64(seed)),
            SensorMode::Inactive => Channel::Inactive,
        }
    }

    /// The mode this channel was resolved from.
    pub fn mode(&self) -> SensorMode {
        match self {
            Channel::Active(_) => SensorMode::Active,
            Channel::Dummy(_) => SensorMode::Dummy,
            Channel::Inactive => SensorMode::Inactive,
        }
    }

    /// Initialise an active driver.
    pub fn start(&mut self) -> Result<(), SensorError> {
        match self {
            Channel::Active(managed) => managed.start(),
            _ => Ok(()),
        }
    }

    /// One sample, or `None` when inactive.
    pub fn read(&mut self) -> Result<Option<S::Sample>, SensorError> {
        match self {
            Channel::Active(managed) => managed.read().map(Some),
            Channel::Dummy(rng) => Ok(Some(S::Sample::simulate(rng))),
            Channel::Inactive => Ok(None),
        }
    }

    /// Recover an active driver.
    pub fn reset(&mut self) -> Result<(), SensorError> {
        match self {
            Channel::Active(managed) => managed.reset(),
            _ => Ok(()),
        }
    }
}
