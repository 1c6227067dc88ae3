//! Benchmarks for flate64 compression and decompression throughput.
//!
//! Covers the three encoder regimes (fast, normal optimal parse, multi-pass)
//! over different data patterns, and decoding of both formats.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate64::{compress, decompress, decompress64, CompressionLevel, EncoderConfig};

/// Generate random (incompressible) data
fn generate_random_data(size: usize) -> Vec<u8> {
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    (0..size)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state & 0xFF) as u8
        })
        .collect()
}

/// Generate repetitive (highly compressible) data
fn generate_repetitive_data(size: usize) -> Vec<u8> {
    b"ABCDABCDABCDABCD".iter().copied().cycle().take(size).collect()
}

/// Generate text-like data: a small vocabulary in pseudo-random order
fn generate_text_data(size: usize) -> Vec<u8> {
    let words: [&[u8]; 8] =
        [b"stream ", b"window ", b"literal ", b"block ", b"the ", b"of ", b"match ", b"\n"];
    let random = generate_random_data(size / 4 + 1);
    let mut data = Vec::with_capacity(size + 8);
    let mut i = 0;
    while data.len() < size {
        data.extend_from_slice(words[(random[i % random.len()] % 8) as usize]);
        i += 1;
    }
    data.truncate(size);
    data
}

fn config(level: u8, deflate64: bool) -> EncoderConfig {
    EncoderConfig { deflate64, ..EncoderConfig::new(CompressionLevel::from_level(level)) }
}

fn bench_compression_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression_levels");
    let size = 256 * 1024;
    let data = generate_text_data(size);

    group.throughput(Throughput::Bytes(size as u64));
    for level in [1u8, 5, 9] {
        group.bench_with_input(BenchmarkId::new("level", level), &data, |b, data| {
            let config = config(level, false);
            b.iter(|| compress(data, &config).unwrap());
        });
    }
    group.finish();
}

fn bench_data_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_patterns");
    let size = 256 * 1024;
    let patterns = [
        ("random", generate_random_data(size)),
        ("repetitive", generate_repetitive_data(size)),
        ("text", generate_text_data(size)),
    ];

    group.throughput(Throughput::Bytes(size as u64));
    for (name, data) in &patterns {
        group.bench_with_input(BenchmarkId::new("deflate", name), data, |b, data| {
            let config = config(5, false);
            b.iter(|| compress(data, &config).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("deflate64", name), data, |b, data| {
            let config = config(5, true);
            b.iter(|| compress(data, &config).unwrap());
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");

    for size in [64 * 1024, 1024 * 1024] {
        let data = generate_text_data(size);
        let deflated = compress(&data, &config(5, false)).unwrap();
        let deflated64 = compress(&data, &config(5, true)).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("deflate", size), &deflated, |b, input| {
            b.iter(|| decompress(input).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("deflate64", size), &deflated64, |b, input| {
            b.iter(|| decompress64(input).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compression_levels, bench_data_patterns, bench_decompress);
criterion_main!(benches);
