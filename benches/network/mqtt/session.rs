use criterion::{Criterion, Throughput};
use std::hint::black_box;
use sensornode::network::error::TransportError;
use sensornode::network::mqtt::{Endpoint, Session, SessionOptions};
use sensornode::network::{Close, Connect, Connection, Read, Write};
use sensornode::telemetry::{FieldList, Reading, Value};

/// Accepts CONNECT with a CONNACK and swallows everything else.
struct SinkConnection {
    connack: [u8; 4],
    pending: usize,
}

impl Read for SinkConnection {
    type Error = TransportError;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let start = 4 - self.pending;
        let len = buf.len().min(self.pending);
        buf[..len].copy_from_slice(&self.connack[start..start + len]);
        self.pending -= len;
        Ok(len)
    }
}

impl Write for SinkConnection {
    type Error = TransportError;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for SinkConnection {
    type Error = TransportError;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for SinkConnection {}

struct SinkNetwork;

impl Connect for SinkNetwork {
    type Connection = SinkConnection;
    type Error = TransportError;

    fn connect(&mut self, _: &str, _: u16, _: u32) -> Result<SinkConnection, TransportError> {
        Ok(SinkConnection {
            connack: [0x20, 0x02, 0x00, 0x00],
            pending: 4,
        })
    }
}

fn reading() -> Reading {
    let mut fields = FieldList::new();
    for name in ["date", "time", "temp", "pressure", "humidity", "lux"] {
        fields.push(name.try_into().unwrap()).unwrap();
    }
    Reading::from_fields(&fields, |field| match field {
        "date" => Some(Value::text("01.06.2024")),
        "time" => Some(Value::text("14:30:05")),
        "temp" => Some(Value::number(21.3)),
        "pressure" => Some(Value::number(1013.3)),
        "humidity" => Some(Value::number(45.1)),
        "lux" => Some(Value::number(420.5)),
        _ => None,
    })
}

pub fn bench_publish_reading(c: &mut Criterion) {
    let reading = reading();
    let mut buf = [0u8; 512];
    let len = reading.write_json(&mut buf).unwrap();

    let endpoint = Endpoint::new("192.168.1.100", 1883, "sensor_default").unwrap();
    let mut session = Session::new(SinkNetwork, endpoint, SessionOptions::default());
    session.connect().expect("Failed to connect");

    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Bytes(len as u64));
    group.bench_function("publish_reading", |b| {
        b.iter(|| session.publish(black_box(&reading)).expect("Failed to publish"))
    });
    group.finish();
}
