//! Reassembly benchmarks - heap throughput through the stream state
//! machine and allocator costs.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use spead::{
    decode_packet, Flavour, MemoryAllocator, MemoryPool, NullSink, SendHeap, StreamBase,
    StreamConfig,
};

/// Wire image of `heaps` heaps of `heap_size` bytes each.
fn wire_image(heaps: u64, heap_size: usize, max_packet_size: usize) -> Vec<u8> {
    let flavour = Flavour::default();
    let mut wire = Vec::new();
    for cnt in 0..heaps {
        let mut heap = SendHeap::new(cnt as i64, flavour);
        heap.add_item(0x1000, vec![cnt as u8; heap_size], false)
            .unwrap();
        for packet in heap.packets(max_packet_size).unwrap() {
            wire.extend_from_slice(&packet);
        }
    }
    wire
}

/// Benchmark complete heap reassembly at various heap sizes.
fn bench_reassemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble");

    for heap_size in [1024, 65_536, 1_048_576] {
        let wire = wire_image(8, heap_size, 8952);
        group.throughput(Throughput::Bytes(wire.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(heap_size), &wire, |b, wire| {
            b.iter(|| {
                let mut stream = StreamBase::new(StreamConfig::new(), Box::new(NullSink));
                let consumed = spead::mem_to_stream(&mut stream, black_box(wire));
                black_box(consumed)
            });
        });
    }

    group.finish();
}

/// Benchmark reassembly backed by the pooled allocator.
fn bench_reassemble_pooled(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble_pooled");

    let heap_size = 65_536;
    let wire = wire_image(8, heap_size, 8952);
    let pool = MemoryPool::new(heap_size, 16);
    pool.preallocate(16);
    group.throughput(Throughput::Bytes(wire.len() as u64));

    group.bench_function("pooled", |b| {
        b.iter(|| {
            let mut stream = StreamBase::new(StreamConfig::new(), Box::new(NullSink));
            stream.set_allocator(Arc::new(pool.clone()));
            let consumed = spead::mem_to_stream(&mut stream, black_box(&wire));
            black_box(consumed)
        });
    });

    group.finish();
}

/// Benchmark allocator acquire/release in isolation.
fn bench_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator");

    let pool = MemoryPool::new(4096, 16);
    pool.preallocate(16);

    group.bench_function("pool_allocate_release", |b| {
        b.iter(|| {
            let chunk = pool.allocate(4096);
            black_box(&chunk);
            // chunk returns to the pool on drop
        });
    });

    group.finish();
}

/// Benchmark single-packet decode-and-dispatch latency.
fn bench_dispatch(c: &mut Criterion) {
    let wire = wire_image(1, 512, 8952);
    let (header, _) = decode_packet(&wire).unwrap();

    c.bench_function("dispatch_single_packet", |b| {
        b.iter(|| {
            let mut stream = StreamBase::new(StreamConfig::new(), Box::new(NullSink));
            black_box(stream.add_packet(black_box(&header)))
        });
    });
}

criterion_group!(
    benches,
    bench_reassemble,
    bench_reassemble_pooled,
    bench_allocator,
    bench_dispatch,
);

criterion_main!(benches);
