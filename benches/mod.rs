use criterion::{criterion_group, criterion_main};


use broker::register_benchmarks as register_broker_benchmarks;
use order_queue::register_benchmarks as register_order_queue_benchmarks;

// Define the benchmark groups
criterion_group!(
    benches,
    register_order_queue_benchmarks,
    register_broker_benchmarks,
);

criterion_main!(benches);
