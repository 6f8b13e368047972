//! Builds the per-cycle reading from both sensors and the calendar.

use super::reading::{FieldList, Reading, TEXT_LEN, Value};
use super::sensor::{Channel, Climate, Lux, Sensor};
use super::{Calendar, DateTime, SensorError, SensorId, Telemetry};
use core::fmt::Write as _;
use heapless::String;
use log::{info, warn};

/// The node's [`Telemetry`] implementation.
///
/// Source fields are `date`, `time`, `temp`, `pressure`, `humidity` and
/// `lux`; the published reading carries exactly the configured field list.
#[derive(Debug)]
pub struct Collector<C, L, K>
where
    C: Sensor<Sample = Climate>,
    L: Sensor<Sample = Lux>,
    K: Calendar,
{
    climate: Channel<C>,
    light: Channel<L>,
    calendar: K,
    fields: FieldList,
}

impl<C, L, K> Collector<C, L, K>
where
    C: Sensor<Sample = Climate>,
    L: Sensor<Sample = Lux>,
    K: Calendar,
{
    /// Combine two resolved channels, the calendar and the publish field list.
    ///
    /// Configured fields no source can fill are published as `null`.
    pub fn new(climate: Channel<C>, light: Channel<L>, calendar: K, fields: FieldList) -> Self {
        Self {
            climate,
            light,
            calendar,
            fields,
        }
    }

    /// The configured publish fields.
    pub fn fields(&self) -> &FieldList {
        &self.fields
    }

    /// The climate channel.
    pub fn climate(&self) -> &Channel<C> {
        &self.climate
    }

    /// The light channel.
    pub fn light(&self) -> &Channel<L> {
        &self.light
    }
}

impl<C, L, K> Telemetry for Collector<C, L, K>
where
    C: Sensor<Sample = Climate>,
    L: Sensor<Sample = Lux>,
    K: Calendar,
{
    /// Initialise every active driver; both are attempted even if the first
    /// fails, the first error is returned.
    fn start(&mut self) -> Result<(), SensorError> {
        let climate = self.climate.start();
        let light = self.light.start();
        info!(
            "telemetry: climate {:?}, light {:?}",
            self.climate.mode(),
            self.light.mode()
        );
        climate.and(light)
    }

    fn read_all(&mut self) -> Result<Reading, SensorError> {
        let now = self.calendar.now();
        let light = self.light.read()?;
        let climate = self.climate.read()?;

        Ok(Reading::from_fields(&self.fields, |field| match field {
            "date" => Some(Value::Text(format_date(&now))),
            "time" => Some(Value::Text(format_time(&now))),
            "temp" => climate.map(|c| Value::number(round1(c.temperature))),
            "pressure" => climate.map(|c| Value::number(round1(c.pressure))),
            "humidity" => climate.map(|c| Value::number(round1(c.humidity))),
            "lux" => light.map(|Lux(lux)| Value::number(lux)),
            _ => None,
        }))
    }

    fn reset(&mut self, sensor: SensorId) {
        let result = match sensor {
            SensorId::Climate => self.climate.reset(),
            SensorId::Light => self.light.reset(),
        };
        if let Err(e) = result {
            warn!("telemetry: reset of {} failed: {:?}", sensor.name(), e.fault);
        }
    }
}

/// `DD.MM.YYYY`
fn format_date(t: &DateTime) -> String<TEXT_LEN> {
    let mut s = String::new();
    let _ = write!(s, "{:02}.{:02}.{:04}", t.day, t.month, t.year);
    s
}

/// `HH:MM:SS`
fn format_time(t: &DateTime) -> String<TEXT_LEN> {
    let mut s = String::new();
    let _ = write!(s, "{:02}:{:02}:{:02}", t.hour, t.minute, t.second);
    s
}

/// Round half away from zero to one decimal.
fn round1(v: f32) -> f32 {
    let scaled = v * 10.0;
    let rounded = if scaled >= 0.0 {
        scaled + 0.5
    } else {
        scaled - 0.5
    };
    (rounded as i32) as f32 / 10.0
}
