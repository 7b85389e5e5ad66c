use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mirror_ring::{Mapping, MirroredRingBuffer};
use pprof::criterion::PProfProfiler;

/// Example element handed between producer and consumer
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct Quote {
    pub instrument: u32,
    pub bid: f64,
    pub ask: f64,
    pub timestamp_ns: u64,
}

const QUOTE: Quote = Quote {
    instrument: 7,
    bid: 101.25,
    ask: 101.5,
    timestamp_ns: 1_700_000_000_000,
};

pub fn bench_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring");
    group.throughput(Throughput::Elements(1));

    for (name, mapping) in [("mirrored", Mapping::Mirrored), ("split", Mapping::Split)] {
        let mut ring = MirroredRingBuffer::<Quote>::with_mapping(1 << 16, mapping)
            .expect("failed to map ring");

        group.bench_function(format!("deposit_get/{name}"), |b| {
            b.iter(|| {
                ring.deposit(black_box(&QUOTE)).expect("ring full");
                black_box(ring.get().expect("ring empty"));
            })
        });
    }

    let ring = MirroredRingBuffer::<Quote>::new(1 << 16).expect("failed to map ring");
    group.bench_function("multi_deposit_get/uncontended", |b| {
        b.iter(|| {
            ring.multi_deposit(black_box(&QUOTE)).expect("ring full");
            black_box(ring.multi_get().expect("ring empty"));
        })
    });

    group.finish();
}

pub fn bench_spsc(c: &mut Criterion) {
    const BATCH: u64 = 10_000;

    let mut group = c.benchmark_group("spsc");
    group.throughput(Throughput::Elements(BATCH));

    group.bench_function("handoff", |b| {
        b.iter(|| {
            let ring = MirroredRingBuffer::<Quote>::new(1 << 16).expect("failed to map ring");
            let (mut producer, mut consumer) = ring.split();

            let writer = thread::spawn(move || {
                for i in 0..BATCH {
                    let quote = Quote {
                        timestamp_ns: i,
                        ..QUOTE
                    };
                    while producer.deposit(&quote).is_err() {
                        std::hint::spin_loop();
                    }
                }
            });

            let mut received = 0;
            while received < BATCH {
                if let Ok(quote) = consumer.get() {
                    black_box(quote);
                    received += 1;
                }
            }
            writer.join().expect("producer panicked");
        })
    });

    group.bench_function("mpmc/2x2", |b| {
        b.iter(|| {
            let ring = Arc::new(
                MirroredRingBuffer::<Quote>::new(1 << 16).expect("failed to map ring"),
            );
            let workers: Vec<_> = (0..2)
                .flat_map(|_| {
                    let producer_ring = ring.clone();
                    let consumer_ring = ring.clone();
                    [
                        thread::spawn(move || {
                            for _ in 0..BATCH / 2 {
                                while producer_ring.multi_deposit(&QUOTE).is_err() {
                                    std::hint::spin_loop();
                                }
                            }
                        }),
                        thread::spawn(move || {
                            let mut received = 0;
                            while received < BATCH / 2 {
                                if consumer_ring.multi_get().is_ok() {
                                    received += 1;
                                }
                            }
                        }),
                    ]
                })
                .collect();
            for worker in workers {
                worker.join().expect("worker panicked");
            }
        })
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, pprof::criterion::Output::Protobuf));
    targets = bench_ring, bench_spsc
}
criterion_main!(benches);
