use criterion::{BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use sensornode::network::mqtt::QoS;
use sensornode::network::mqtt::codec::{
    self, MAX_PACKET_LEN, Packet, decode_remaining_length, encode_remaining_length,
};

pub fn bench_encode_connect(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_connect");
    group.bench_function("anonymous", |b| {
        b.iter(|| {
            let packet: Packet =
                codec::encode_connect(black_box("sensor_default"), 60, None, None).unwrap();
            black_box(packet)
        })
    });
    group.bench_function("credentials", |b| {
        b.iter(|| {
            let packet: Packet = codec::encode_connect(
                black_box("sensor_default"),
                60,
                Some("node"),
                Some("secret"),
            )
            .unwrap();
            black_box(packet)
        })
    });
    group.finish();
}

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_publish");
    for size in [32usize, 128, 512] {
        let payload = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let packet = codec::encode_publish::<MAX_PACKET_LEN>(
                    black_box("sensor/default"),
                    black_box(payload),
                    QoS::AtMostOnce,
                    false,
                )
                .unwrap();
                black_box(packet)
            })
        });
    }
    group.finish();
}

pub fn bench_remaining_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("remaining_length");
    for value in [127usize, 16_383, 268_435_455] {
        group.bench_with_input(BenchmarkId::from_parameter(value), &value, |b, &value| {
            b.iter(|| {
                let mut out: heapless::Vec<u8, 4> = heapless::Vec::new();
                encode_remaining_length(&mut out, black_box(value)).unwrap();
                black_box(decode_remaining_length(&out).unwrap())
            })
        });
    }
    group.finish();
}
