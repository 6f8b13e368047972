mod common;

use common::*;
use sensornode::telemetry::{
    Channel, Climate, Collector, Lifecycle, Lux, Managed, Reading, SensorError, SensorFault,
    SensorId, SensorMode, Telemetry, Value,
};

fn collector(
    climate_mode: SensorMode,
    light_mode: SensorMode,
    names: &[&str],
) -> Collector<FakeSensor<Climate>, FakeSensor<Lux>, FixedCalendar> {
    Collector::new(
        Channel::resolve(climate_mode, SensorId::Climate, climate(), 7),
        Channel::resolve(light_mode, SensorId::Light, light(), 11),
        calendar(),
        fields(names),
    )
}

fn number(reading: &Reading, field: &str) -> f32 {
    match reading.get(field) {
        Some(Value::Number(v)) => *v,
        other => panic!("{field}: expected a number, got {other:?}"),
    }
}

#[test]
fn test_reading_follows_configured_order() {
    let mut c = collector(SensorMode::Active, SensorMode::Active, &["lux", "date", "temp"]);
    c.start().unwrap();

    let reading = c.read_all().unwrap();

    let names: Vec<&str> = reading.iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["lux", "date", "temp"]);
    assert_eq!(reading.get("date"), Some(&Value::text("01.06.2024")));
    assert_eq!(number(&reading, "temp"), 21.3);
    assert_eq!(number(&reading, "lux"), 420.5);
}

#[test]
fn test_unknown_field_is_null() {
    let mut c = collector(SensorMode::Active, SensorMode::Active, &["temp", "co2"]);
    c.start().unwrap();

    let reading = c.read_all().unwrap();

    assert_eq!(reading.len(), 2);
    assert_eq!(reading.get("co2"), Some(&Value::Null));
}

#[test]
fn test_inactive_sensor_publishes_null() {
    let mut c = collector(
        SensorMode::Inactive,
        SensorMode::Active,
        &["temp", "pressure", "humidity", "lux"],
    );
    c.start().unwrap();

    let reading = c.read_all().unwrap();

    assert!(reading.get("temp").unwrap().is_null());
    assert!(reading.get("pressure").unwrap().is_null());
    assert!(reading.get("humidity").unwrap().is_null());
    assert_eq!(number(&reading, "lux"), 420.5);

    let mut buf = [0u8; 128];
    let len = reading.write_json(&mut buf).unwrap();
    assert_eq!(
        core::str::from_utf8(&buf[..len]).unwrap(),
        r#"{"temp":null,"pressure":null,"humidity":null,"lux":420.5}"#
    );
}

#[test]
fn test_dummy_values_are_plausible() {
    let mut c = collector(
        SensorMode::Dummy,
        SensorMode::Dummy,
        &["temp", "pressure", "humidity", "lux"],
    );
    c.start().unwrap();

    for _ in 0..50 {
        let reading = c.read_all().unwrap();
        let temp = number(&reading, "temp");
        let pressure = number(&reading, "pressure");
        let humidity = number(&reading, "humidity");
        let lux = number(&reading, "lux");
        assert!((20.0..=25.0).contains(&temp), "temp {temp}");
        assert!((990.0..=1010.0).contains(&pressure), "pressure {pressure}");
        assert!((40.0..=60.0).contains(&humidity), "humidity {humidity}");
        assert!((300.0..=800.0).contains(&lux), "lux {lux}");
        assert_eq!(lux.fract(), 0.0);
    }
}

#[test]
fn test_failing_sensor_aborts_reading() {
    let mut light = light();
    light.failing_reads = 1;
    let mut c = Collector::new(
        Channel::resolve(SensorMode::Active, SensorId::Climate, climate(), 0),
        Channel::resolve(SensorMode::Active, SensorId::Light, light, 0),
        calendar(),
        fields(&["temp", "lux"]),
    );
    c.start().unwrap();

    assert_eq!(
        c.read_all(),
        Err(SensorError::new(SensorId::Light, SensorFault::Bus))
    );
    assert!(c.read_all().is_ok());
}

#[test]
fn test_reset_power_cycles_and_reinitialises() {
    let mut c = collector(SensorMode::Active, SensorMode::Active, &["lux"]);
    c.start().unwrap();

    c.reset(SensorId::Light);

    let Channel::Active(managed) = c.light() else {
        panic!("light channel should be active");
    };
    assert_eq!(managed.driver().power_cycles, 1);
    assert_eq!(managed.driver().inits, 2);
    assert_eq!(managed.lifecycle(), Lifecycle::Ready);
}

#[test]
fn test_start_reports_init_failure_but_starts_both() {
    let mut climate = climate();
    climate.init_ok = false;
    let mut c = Collector::new(
        Channel::resolve(SensorMode::Active, SensorId::Climate, climate, 0),
        Channel::resolve(SensorMode::Active, SensorId::Light, light(), 0),
        calendar(),
        fields(&["temp", "lux"]),
    );

    assert_eq!(
        c.start(),
        Err(SensorError::new(SensorId::Climate, SensorFault::InitFailed))
    );
    let Channel::Active(light) = c.light() else {
        panic!("light channel should be active");
    };
    assert_eq!(light.lifecycle(), Lifecycle::Ready);
    assert_eq!(
        c.read_all(),
        Err(SensorError::new(SensorId::Climate, SensorFault::NotInitialized))
    );
}

#[test]
fn test_uninitialised_driver_is_not_read() {
    let mut managed = Managed::new(SensorId::Light, light());

    assert_eq!(
        managed.read(),
        Err(SensorError::new(SensorId::Light, SensorFault::NotInitialized))
    );
    assert_eq!(managed.driver().reads, 0);
    assert_eq!(managed.lifecycle(), Lifecycle::Uninitialized);
}

#[test]
fn test_negative_lux_is_invalid() {
    let mut managed = Managed::new(SensorId::Light, FakeSensor::new(Lux(-1.0)));
    managed.start().unwrap();

    assert_eq!(
        managed.read(),
        Err(SensorError::new(SensorId::Light, SensorFault::InvalidSample))
    );
}

#[test]
fn test_nan_climate_is_invalid() {
    let mut managed = Managed::new(
        SensorId::Climate,
        FakeSensor::new(Climate {
            temperature: f32::NAN,
            pressure: 1000.0,
            humidity: 50.0,
        }),
    );
    managed.start().unwrap();

    assert_eq!(
        managed.read(),
        Err(SensorError::new(SensorId::Climate, SensorFault::InvalidSample))
    );
}

#[test]
fn test_sensor_mode_parsing() {
    assert_eq!("active".parse(), Ok(SensorMode::Active));
    assert_eq!(" dummy ".parse(), Ok(SensorMode::Dummy));
    assert_eq!("inactive".parse(), Ok(SensorMode::Inactive));
    assert!("off".parse::<SensorMode>().is_err());
    assert_eq!(SensorMode::default(), SensorMode::Active);
}

#[test]
fn test_channel_resolution() {
    let active: Channel<FakeSensor<Lux>> =
        Channel::resolve(SensorMode::Active, SensorId::Light, light(), 0);
    let dummy: Channel<FakeSensor<Lux>> =
        Channel::resolve(SensorMode::Dummy, SensorId::Light, light(), 0);
    let mut inactive: Channel<FakeSensor<Lux>> =
        Channel::resolve(SensorMode::Inactive, SensorId::Light, light(), 0);

    assert_eq!(active.mode(), SensorMode::Active);
    assert_eq!(dummy.mode(), SensorMode::Dummy);
    assert_eq!(inactive.mode(), SensorMode::Inactive);
    assert_eq!(inactive.read(), Ok(None));
}

#[test]
fn test_non_finite_number_becomes_null() {
    assert_eq!(Value::number(f32::INFINITY), Value::Null);
    assert_eq!(Value::number(1.5), Value::Number(1.5));
}
