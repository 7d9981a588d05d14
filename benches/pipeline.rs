//! Pipelined Consumption Benchmark
//!
//! Measures how fast a session chews through batches of back-to-back
//! frames, which is exactly what a deeply pipelining client produces:
//! one buffer, many commands, no reads in between.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rapidkv::protocol::scanner;
use rapidkv::session::Session;
use rapidkv::storage::StorageEngine;
use std::sync::Arc;

/// Frames per batch buffer.
const BATCH_SIZE: usize = 128;

const INLINE_PING: &[u8] = b"PING\r\n";
const SET: &[u8] = b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\na\r\n";
const GET: &[u8] = b"*2\r\n$3\r\nGET\r\n$1\r\nb\r\n";

/// Builds a buffer of `BATCH_SIZE` identical back-to-back frames.
fn batch(frame: &[u8]) -> Vec<u8> {
    frame.repeat(BATCH_SIZE)
}

fn create_session() -> Session {
    Session::new(Arc::new(StorageEngine::new()))
}

/// Full consumption: scan + dispatch + reply for every frame in the batch.
fn bench_consume(c: &mut Criterion) {
    let mut group = c.benchmark_group("consume");

    for (name, frame) in [("inline_ping", INLINE_PING), ("set", SET), ("get", GET)] {
        let buf = batch(frame);
        let mut session = create_session();

        group.throughput(Throughput::Bytes(buf.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let consumed = session.consume(black_box(&buf)).unwrap();
                black_box(consumed);
                black_box(session.take_output());
            });
        });
    }

    group.finish();
}

/// A batch interleaving all three frame shapes.
fn bench_mixed_batch(c: &mut Criterion) {
    let mut buf = Vec::new();
    for _ in 0..BATCH_SIZE {
        buf.extend_from_slice(SET);
        buf.extend_from_slice(GET);
        buf.extend_from_slice(INLINE_PING);
    }

    let mut session = create_session();

    let mut group = c.benchmark_group("consume");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("mixed", |b| {
        b.iter(|| {
            let consumed = session.consume(black_box(&buf)).unwrap();
            black_box(consumed);
            black_box(session.take_output());
        });
    });
    group.finish();
}

/// Scanner in isolation: frame recognition without dispatch or replies.
fn bench_scan_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for (name, frame) in [("inline_ping", INLINE_PING), ("set", SET), ("get", GET)] {
        let buf = batch(frame);

        group.throughput(Throughput::Bytes(buf.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut cursor = 0;
                while cursor < buf.len() {
                    match scanner::scan(black_box(&buf[cursor..])).unwrap() {
                        Some((frame, used)) => {
                            black_box(frame.name());
                            cursor += used;
                        }
                        None => break,
                    }
                }
                black_box(cursor);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_consume, bench_mixed_batch, bench_scan_only);
criterion_main!(benches);
