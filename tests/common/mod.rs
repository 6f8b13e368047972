//! Test doubles shared by the integration tests.
//!
//! The broker and the air are shared through `Rc<RefCell<_>>` so a test can
//! keep a handle while the node owns the mock.
#![allow(dead_code)]

use core::net::Ipv4Addr;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sensornode::network::error::TransportError;
use sensornode::network::link::{Addressing, LinkManager, LinkTiming, Profile, Radio};
use sensornode::network::mqtt::{Endpoint, Session, SessionOptions};
use sensornode::network::{Close, Connect, Connection, Read, Write};
use sensornode::system::{BlinkPattern, Delay, Platform, Signal};
use sensornode::telemetry::sensor::{Climate, Lux, Sensor};
use sensornode::telemetry::{
    Calendar, DateTime, FieldList, Reading, SensorError, SensorFault, SensorId, Telemetry, Value,
};

pub const ACCEPT: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// What the fake broker does and what it saw.
#[derive(Debug)]
pub struct Broker {
    /// Refuse every TCP connect while set.
    pub unreachable: bool,
    /// Refuse this many upcoming TCP connects.
    pub refuse_next: usize,
    /// Error a refused connect reports.
    pub refusal: TransportError,
    /// Answer to CONNECT.
    pub connack: Vec<u8>,
    /// Fail this many upcoming PUBLISH writes.
    pub fail_publishes: usize,
    /// Refuse the reconnect that follows a failed PUBLISH write.
    pub refuse_rebuild: bool,
    pub publish_attempts: usize,
    /// Every frame written, one entry per write call.
    pub frames: Vec<Vec<u8>>,
    pub opened: usize,
    pub closed: usize,
    pub last_timeout_ms: u32,
}

impl Default for Broker {
    fn default() -> Self {
        Self {
            unreachable: false,
            refuse_next: 0,
            refusal: TransportError::ConnectionRefused,
            connack: ACCEPT.to_vec(),
            fail_publishes: 0,
            refuse_rebuild: false,
            publish_attempts: 0,
            frames: Vec::new(),
            opened: 0,
            closed: 0,
            last_timeout_ms: 0,
        }
    }
}

impl Broker {
    /// Connections opened and not closed yet.
    pub fn live(&self) -> usize {
        self.opened - self.closed
    }

    /// Frames whose fixed header type matches `packet_type`.
    pub fn count(&self, packet_type: u8) -> usize {
        self.frames
            .iter()
            .filter(|f| f.first().map(|b| b & 0xF0) == Some(packet_type))
            .count()
    }

    pub fn publishes(&self) -> Vec<&Vec<u8>> {
        self.frames.iter().filter(|f| f[0] & 0xF0 == 0x30).collect()
    }
}

pub type SharedBroker = Rc<RefCell<Broker>>;

#[derive(Debug)]
pub struct MockConnection {
    broker: SharedBroker,
    reply: VecDeque<u8>,
}

impl Read for MockConnection {
    type Error = TransportError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let len = buf.len().min(self.reply.len());
        for slot in buf.iter_mut().take(len) {
            *slot = self.reply.pop_front().unwrap_or_default();
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = TransportError;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut broker = self.broker.borrow_mut();
        let is_publish = buf.first().map(|b| b & 0xF0) == Some(0x30);
        if is_publish {
            broker.publish_attempts += 1;
        }
        if is_publish && broker.fail_publishes > 0 {
            broker.fail_publishes -= 1;
            if broker.refuse_rebuild {
                broker.refuse_next += 1;
            }
            return Err(TransportError::WriteError);
        }
        broker.frames.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = TransportError;

    fn close(self) -> Result<(), Self::Error> {
        self.broker.borrow_mut().closed += 1;
        Ok(())
    }
}

impl Connection for MockConnection {}

#[derive(Debug, Clone)]
pub struct MockNetwork {
    pub broker: SharedBroker,
}

impl MockNetwork {
    pub fn new() -> (Self, SharedBroker) {
        let broker = SharedBroker::default();
        (
            Self {
                broker: broker.clone(),
            },
            broker,
        )
    }
}

impl Connect for MockNetwork {
    type Connection = MockConnection;
    type Error = TransportError;

    fn connect(
        &mut self,
        _host: &str,
        _port: u16,
        read_timeout_ms: u32,
    ) -> Result<Self::Connection, Self::Error> {
        let mut broker = self.broker.borrow_mut();
        broker.last_timeout_ms = read_timeout_ms;
        if broker.unreachable {
            return Err(broker.refusal);
        }
        if broker.refuse_next > 0 {
            broker.refuse_next -= 1;
            return Err(broker.refusal);
        }
        broker.opened += 1;
        Ok(MockConnection {
            broker: self.broker.clone(),
            reply: broker.connack.iter().copied().collect(),
        })
    }
}

pub fn session() -> (Session<MockNetwork>, SharedBroker) {
    let (network, broker) = MockNetwork::new();
    let endpoint = Endpoint::new("192.168.1.100", 1883, "sensor1").unwrap();
    (Session::new(network, endpoint, SessionOptions::default()), broker)
}

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

pub const PRIMARY: &str = "home";
pub const FALLBACK: &str = "backup";

/// The WiFi environment.
#[derive(Debug, Default)]
pub struct Air {
    pub primary_up: bool,
    pub fallback_up: bool,
    /// `is_associated` answers `false` this many times after a join.
    pub settle_polls: usize,
    pub fail_activate: bool,
    pub active: bool,
    pub associated: Option<String>,
    pub joins: Vec<String>,
    pub addressing: Vec<Addressing>,
}

impl Air {
    pub fn drop_link(&mut self) {
        self.associated = None;
    }
}

pub type SharedAir = Rc<RefCell<Air>>;

#[derive(Debug, Clone)]
pub struct MockRadio {
    pub air: SharedAir,
}

impl Radio for MockRadio {
    type Error = ();

    fn is_active(&self) -> bool {
        self.air.borrow().active
    }

    fn activate(&mut self) -> Result<(), Self::Error> {
        let mut air = self.air.borrow_mut();
        if air.fail_activate {
            return Err(());
        }
        air.active = true;
        Ok(())
    }

    fn configure(&mut self, addressing: &Addressing) -> Result<(), Self::Error> {
        self.air.borrow_mut().addressing.push(*addressing);
        Ok(())
    }

    fn associate(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        let mut air = self.air.borrow_mut();
        air.joins.push(ssid.to_string());
        let reachable = match ssid {
            PRIMARY => air.primary_up,
            FALLBACK => air.fallback_up,
            _ => false,
        };
        air.associated = reachable.then(|| ssid.to_string());
        Ok(())
    }

    fn is_associated(&self) -> bool {
        let mut air = self.air.borrow_mut();
        if air.associated.is_none() {
            return false;
        }
        if air.settle_polls > 0 {
            air.settle_polls -= 1;
            return false;
        }
        true
    }

    fn ip(&self) -> Option<Ipv4Addr> {
        match self.air.borrow().associated.as_deref() {
            Some(PRIMARY) => Some(Ipv4Addr::new(192, 168, 1, 50)),
            Some(_) => Some(Ipv4Addr::new(192, 168, 2, 50)),
            None => None,
        }
    }
}

pub fn link(primary_up: bool, fallback_up: bool) -> (LinkManager<MockRadio>, SharedAir) {
    let air = SharedAir::default();
    {
        let mut a = air.borrow_mut();
        a.primary_up = primary_up;
        a.fallback_up = fallback_up;
    }
    let manager = LinkManager::new(
        MockRadio { air: air.clone() },
        Profile::new(PRIMARY, "primary-secret").unwrap(),
        Profile::new(FALLBACK, "fallback-secret").unwrap(),
        LinkTiming {
            max_retries: 3,
            retry_delay_ms: 500,
        },
    );
    (manager, air)
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Clock that only moves when someone waits.
#[derive(Debug, Default)]
pub struct MockPlatform {
    pub elapsed_ms: u64,
    pub delays: Vec<u32>,
    pub syncs: usize,
    pub fail_sync: bool,
    pub resets: usize,
}

impl Delay for MockPlatform {
    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.elapsed_ms += u64::from(ms);
    }
}

impl Platform for MockPlatform {
    fn uptime_secs(&self) -> u64 {
        self.elapsed_ms / 1000
    }

    fn sync_time(&mut self) -> Result<(), TransportError> {
        self.syncs += 1;
        if self.fail_sync {
            Err(TransportError::Timeout)
        } else {
            Ok(())
        }
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

#[derive(Debug, Default)]
pub struct MockSignal {
    pub blinks: Vec<BlinkPattern>,
}

impl Signal for MockSignal {
    fn blink(&mut self, pattern: BlinkPattern) {
        self.blinks.push(pattern);
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

pub fn fields(names: &[&str]) -> FieldList {
    let mut list = FieldList::new();
    for name in names {
        list.push((*name).try_into().unwrap()).unwrap();
    }
    list
}

pub fn reading() -> Reading {
    Reading::from_fields(&fields(&["temp", "lux"]), |field| match field {
        "temp" => Some(Value::number(21.5)),
        "lux" => Some(Value::number(420.0)),
        _ => None,
    })
}

/// Telemetry answering from a script, then with [`reading`].
#[derive(Debug, Default)]
pub struct MockTelemetry {
    pub script: VecDeque<Result<Reading, SensorError>>,
    /// Returned by `start` when set.
    pub start_error: Option<SensorError>,
    pub starts: usize,
    pub reads: usize,
    pub resets: Vec<SensorId>,
}

impl MockTelemetry {
    pub fn failing_once(sensor: SensorId) -> Self {
        let mut telemetry = Self::default();
        telemetry
            .script
            .push_back(Err(SensorError::new(sensor, SensorFault::Bus)));
        telemetry
    }
}

impl Telemetry for MockTelemetry {
    fn start(&mut self) -> Result<(), SensorError> {
        self.starts += 1;
        self.start_error.map_or(Ok(()), Err)
    }

    fn read_all(&mut self) -> Result<Reading, SensorError> {
        self.reads += 1;
        self.script.pop_front().unwrap_or_else(|| Ok(reading()))
    }

    fn reset(&mut self, sensor: SensorId) {
        self.resets.push(sensor);
    }
}

/// A sensor driver whose behaviour is set by the test.
#[derive(Debug)]
pub struct FakeSensor<T> {
    pub sample: T,
    pub init_ok: bool,
    pub failing_reads: usize,
    pub inits: usize,
    pub reads: usize,
    pub power_cycles: usize,
}

impl<T> FakeSensor<T> {
    pub fn new(sample: T) -> Self {
        Self {
            sample,
            init_ok: true,
            failing_reads: 0,
            inits: 0,
            reads: 0,
            power_cycles: 0,
        }
    }
}

impl<T: sensornode::telemetry::Sample> FakeSensor<T> {
    fn init_impl(&mut self) -> Result<(), SensorFault> {
        self.inits += 1;
        if self.init_ok {
            Ok(())
        } else {
            Err(SensorFault::Bus)
        }
    }

    fn read_impl(&mut self) -> Result<T, SensorFault> {
        self.reads += 1;
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(SensorFault::Bus);
        }
        Ok(self.sample)
    }
}

impl Sensor for FakeSensor<Climate> {
    type Sample = Climate;

    fn init(&mut self) -> Result<(), SensorFault> {
        self.init_impl()
    }

    fn read(&mut self) -> Result<Climate, SensorFault> {
        self.read_impl()
    }

    fn power_cycle(&mut self) -> Result<(), SensorFault> {
        self.power_cycles += 1;
        Ok(())
    }
}

impl Sensor for FakeSensor<Lux> {
    type Sample = Lux;

    fn init(&mut self) -> Result<(), SensorFault> {
        self.init_impl()
    }

    fn read(&mut self) -> Result<Lux, SensorFault> {
        self.read_impl()
    }

    fn power_cycle(&mut self) -> Result<(), SensorFault> {
        self.power_cycles += 1;
        Ok(())
    }
}

pub fn climate() -> FakeSensor<Climate> {
    FakeSensor::new(Climate {
        temperature: 21.34,
        pressure: 1013.26,
        humidity: 45.06,
    })
}

pub fn light() -> FakeSensor<Lux> {
    FakeSensor::new(Lux(420.5))
}

#[derive(Debug, Clone, Copy)]
pub struct FixedCalendar(pub DateTime);

impl Calendar for FixedCalendar {
    fn now(&self) -> DateTime {
        self.0
    }
}

pub fn calendar() -> FixedCalendar {
    FixedCalendar(DateTime {
        year: 2024,
        month: 6,
        day: 1,
        hour: 14,
        minute: 30,
        second: 5,
    })
}
