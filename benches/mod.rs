use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::mqtt::codec::bench_encode_connect,
    network::mqtt::codec::bench_encode_publish,
    network::mqtt::codec::bench_remaining_length,
    network::mqtt::session::bench_publish_reading
);
criterion_main!(benches);
