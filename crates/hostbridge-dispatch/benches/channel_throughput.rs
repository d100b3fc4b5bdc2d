//! Dispatch channel throughput
//!
//! Measures the cost of moving events from an engine thread onto the host
//! loop, for small and larger copied payloads.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hostbridge_dispatch::{DispatchChannel, Host, RetireMode};
use std::hint::black_box;
use std::thread;

const BATCH: u64 = 1_000;

fn bench_same_thread(c: &mut Criterion) {
    let host = Host::new();
    let channel = DispatchChannel::create(&host, "bench", |_: &Host, value: u64| {
        black_box(value);
    })
    .unwrap();

    let mut group = c.benchmark_group("same_thread");
    group.throughput(Throughput::Elements(BATCH));
    group.bench_function("enqueue_and_drain", |b| {
        b.iter(|| {
            for n in 0..BATCH {
                channel.enqueue(n).unwrap();
            }
            host.run_until_idle()
        })
    });
    group.finish();
    channel.retire(RetireMode::Drain);
}

fn bench_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_thread");
    for size in [16_usize, 1_024, 16_384] {
        let host = Host::new();
        let channel = DispatchChannel::create(&host, "bench", |_: &Host, payload: Vec<u8>| {
            black_box(payload.len());
        })
        .unwrap();
        let payload = vec![0xA5_u8; size];

        group.throughput(Throughput::Bytes(size as u64 * BATCH));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let producer = channel.clone();
                let payload = payload.clone();
                let engine = thread::spawn(move || {
                    for _ in 0..BATCH {
                        producer.enqueue(payload.clone()).unwrap();
                    }
                });
                engine.join().unwrap();
                host.run_until_idle()
            })
        });
        channel.retire(RetireMode::Drain);
    }
    group.finish();
}

criterion_group!(benches, bench_same_thread, bench_cross_thread);
criterion_main!(benches);
