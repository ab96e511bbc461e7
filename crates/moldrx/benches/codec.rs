// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode Path Benchmarks
//!
//! Measures the two halves of the hot path in isolation:
//! - packet decode + message iteration at several messages-per-packet shapes
//! - frame dissection (Ethernet/IPv4/UDP walk) for feed and foreign frames
//! - a full burst over the heap backend, injection to release
//!
//! Throughput is reported in bytes so runs at different packet shapes stay
//! comparable.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::net::Ipv4Addr;

use moldrx::capture::{FrameClass, FrameFilter, HeapBackend};
use moldrx::config::{BURST_SIZE, HEAP_POOL_CAPACITY, RING_FRAME_SIZE};
use moldrx::protocol::{build_packet, decode};
use moldrx::BurstReceiver;

const GROUP: Ipv4Addr = Ipv4Addr::new(239, 1, 1, 1);
const PORT: u16 = 9000;

/// Deterministic packet with `count` messages of `size` bytes each.
fn sample_packet(count: usize, size: usize) -> Vec<u8> {
    let payloads: Vec<Vec<u8>> = (0..count)
        .map(|i| (0..size).map(|j| (i + j) as u8).collect())
        .collect();
    let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
    build_packet("BENCH", 1_000_000, &refs).expect("sample packet builds")
}

/// Wrap a UDP payload in Ethernet + IPv4 + UDP headers.
fn sample_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(42 + payload.len());
    frame.extend_from_slice(&[0x01, 0x00, 0x5E, 0x01, 0x01, 0x01]);
    frame.extend_from_slice(&[0x02, 0x42, 0x0A, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&0x0800u16.to_be_bytes());

    let mut ip = [0u8; 20];
    ip[0] = 0x45;
    ip[2..4].copy_from_slice(&((20 + 8 + payload.len()) as u16).to_be_bytes());
    ip[8] = 64;
    ip[9] = 17;
    ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
    ip[16..20].copy_from_slice(&GROUP.octets());
    frame.extend_from_slice(&ip);

    frame.extend_from_slice(&0x1234u16.to_be_bytes());
    frame.extend_from_slice(&PORT.to_be_bytes());
    frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Benchmark: decode + iterate at typical feed shapes.
fn bench_packet_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_decode");

    for (label, count, size) in [
        ("heartbeat", 0, 0),
        ("1x40", 1, 40),
        ("16x40", 16, 40),
        ("64x40", 64, 40),
        ("16x200", 16, 200),
    ] {
        let datagram = sample_packet(count, size);
        group.throughput(Throughput::Bytes(datagram.len() as u64));
        group.bench_function(label, |b| {
            b.iter(|| {
                let packet = decode(black_box(&datagram)).expect("decodes");
                let mut bytes = 0usize;
                for message in packet.messages() {
                    bytes += message.expect("intact").data.len();
                }
                black_box(bytes)
            });
        });
    }

    group.finish();
}

/// Benchmark: frame classification for accepted and rejected frames.
fn bench_frame_classify(c: &mut Criterion) {
    let filter = FrameFilter::new(GROUP, PORT);
    let datagram = sample_packet(16, 40);

    let feed = sample_frame(&datagram);
    let mut other_port = feed.clone();
    other_port[36..38].copy_from_slice(&(PORT + 1).to_be_bytes());

    let mut group = c.benchmark_group("frame_classify");
    group.throughput(Throughput::Bytes(feed.len() as u64));

    group.bench_function("feed", |b| {
        b.iter(|| match filter.classify(black_box(&feed)) {
            FrameClass::Feed(payload) => black_box(payload.len()),
            FrameClass::Skipped(_) => unreachable!("feed frame must classify as feed"),
        });
    });
    group.bench_function("other_port", |b| {
        b.iter(|| black_box(filter.classify(black_box(&other_port))));
    });

    group.finish();
}

/// Benchmark: inject + burst + decode + release over the heap backend.
fn bench_heap_burst(c: &mut Criterion) {
    let datagram = sample_packet(16, 40);
    let frame = sample_frame(&datagram);
    let burst_len = BURST_SIZE;

    let backend = HeapBackend::new(HEAP_POOL_CAPACITY, RING_FRAME_SIZE).expect("pool creation");
    let mut rx = BurstReceiver::new(backend, GROUP, PORT).expect("valid group");

    let mut group = c.benchmark_group("heap_burst");
    group.throughput(Throughput::Bytes((frame.len() * burst_len) as u64));

    group.bench_function(format!("{burst_len}_frames"), |b| {
        b.iter(|| {
            for _ in 0..burst_len {
                rx.backend_mut().inject(&frame).expect("inject");
            }
            let mut messages = 0usize;
            rx.receive_and_process(|packet| {
                messages += packet.expect("decodes").messages().count();
            })
            .expect("burst");
            black_box(messages)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_packet_decode,
    bench_frame_classify,
    bench_heap_burst
);
criterion_main!(benches);
