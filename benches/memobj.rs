//! Memory-object benchmarks
//!
//! Measures the alloc/free cycle and cross-chunk IO against pools sized
//! like typical packet-buffer configurations.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use memobj::{BlockPoolConfig, MemObjPool};

fn bench_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free");
    group.throughput(Throughput::Elements(1));

    for &(block_size, object_size) in &[(64usize, 48usize), (64, 200), (256, 1024)] {
        let pool = MemObjPool::with_config(block_size, 64, BlockPoolConfig::production()).unwrap();
        group.bench_function(format!("{block_size}B_blocks_{object_size}B_object"), |b| {
            b.iter(|| {
                let obj = pool.alloc(black_box(object_size)).unwrap();
                black_box(obj.capacity());
                obj.free();
            });
        });
    }

    group.finish();
}

fn bench_cross_chunk_io(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_chunk_io");

    let pool = MemObjPool::with_config(64, 64, BlockPoolConfig::production()).unwrap();
    let obj = pool.alloc(1024).unwrap();
    let data = vec![0x42u8; 1024];
    let mut out = vec![0u8; 1024];

    group.throughput(Throughput::Bytes(1024));
    group.bench_function("write_1k", |b| {
        b.iter(|| obj.write(black_box(&data), 0));
    });
    group.bench_function("read_1k", |b| {
        b.iter(|| obj.read(black_box(&mut out), 0));
    });

    // Small writes landing on a chunk seam.
    group.throughput(Throughput::Bytes(8));
    group.bench_function("write_8_at_seam", |b| {
        b.iter(|| obj.write(black_box(&data[..8]), 58));
    });

    group.finish();
}

criterion_group!(benches, bench_alloc_free, bench_cross_chunk_io);
criterion_main!(benches);
