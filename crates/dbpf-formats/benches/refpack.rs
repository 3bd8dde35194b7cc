//! RefPack codec throughput.
//!
//! Run with:
//! ```bash
//! cargo bench --bench refpack
//! ```

#![allow(clippy::expect_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use dbpf_formats::refpack;
use std::hint::black_box;

/// Semi-repetitive payload resembling a property set or string table.
fn sample(len: usize) -> Vec<u8> {
    let words: [&[u8]; 6] = [b"name", b"0x00000001", b"family", b"<AnyString>", b"age", b"\x00\x00"];
    let mut data = Vec::with_capacity(len);
    let mut i = 0usize;
    while data.len() < len {
        data.extend_from_slice(words[i % words.len()]);
        data.push((i % 251) as u8);
        i += 1;
    }
    data.truncate(len);
    data
}

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("refpack_compress");
    for size in [1024usize, 16 * 1024, 256 * 1024] {
        let data = sample(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| refpack::compress(black_box(data)).expect("Failed to compress sample"));
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("refpack_decompress");
    for size in [1024usize, 16 * 1024, 256 * 1024] {
        let data = sample(size);
        let packed = refpack::compress(&data).expect("Failed to compress sample");
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &packed, |b, packed| {
            b.iter(|| {
                refpack::decompress(black_box(packed), size as u32)
                    .expect("Failed to decompress sample")
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
