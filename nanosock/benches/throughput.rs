//! Throughput benchmarks: messages per second through the socket runtime.
//!
//! Each iteration builds a fresh PUSH/PULL (and PUB/SUB) pair on an isolated
//! in-process transport and pushes `MESSAGE_COUNT` messages through it in
//! windows that fit the receiver's inbox. Setup is included but amortized over the run.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nanosock::{LoopbackTransport, Protocol, SharedTransport, Socket, SocketOptions};
use std::rc::Rc;
use std::time::Duration;

const MESSAGE_SIZES: &[usize] = &[64, 1024, 16384];
const MESSAGE_COUNT: usize = 10_000;
const WINDOW: usize = 100;

fn pair(sender: Protocol, receiver: Protocol) -> (Socket, Socket) {
    let transport: SharedTransport = Rc::new(LoopbackTransport::new());
    let rx = Socket::with_transport(transport.clone(), receiver, SocketOptions::default()).unwrap();
    let tx = Socket::with_transport(transport, sender, SocketOptions::default()).unwrap();
    rx.bind("inproc://bench").unwrap();
    tx.connect("inproc://bench").unwrap();
    (tx, rx)
}

fn run(c: &mut Criterion, group_name: &str, sender: Protocol, receiver: Protocol) {
    nanosock::dev_tracing::init_tracing();
    let mut group = c.benchmark_group(group_name);
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    // One runtime for every iteration of the group.
    let rt = compio::runtime::Runtime::new().unwrap();

    for &size in MESSAGE_SIZES {
        let payload = Bytes::from(vec![0u8; size]);
        group.throughput(Throughput::Bytes((size * MESSAGE_COUNT) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let (tx, rx) = pair(sender, receiver);
                    let reader = rx.reader().unwrap();

                    // PUB drops on a full inbox, so stay within one buffer
                    for _ in 0..MESSAGE_COUNT / WINDOW {
                        for _ in 0..WINDOW {
                            tx.write(black_box(payload.clone())).unwrap();
                        }
                        for _ in 0..WINDOW {
                            black_box(reader.recv().await.unwrap());
                        }
                    }
                });
            });
        });
    }
    group.finish();
}

fn push_pull_throughput(c: &mut Criterion) {
    run(c, "throughput/push_pull", Protocol::Push, Protocol::Pull);
}

fn pub_sub_throughput(c: &mut Criterion) {
    run(c, "throughput/pub_sub", Protocol::Pub, Protocol::Sub);
}

criterion_group!(benches, push_pull_throughput, pub_sub_throughput);
criterion_main!(benches);
