//! Nearest-sample scan benchmarks
//!
//! Run with: cargo bench --bench block_scan

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sigsearch_core::{encode_block, Block, Point, SampleRecord, RECORD_SIZE};

fn random_block(records: usize, block_size: i32) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(records as u64);
    let samples: Vec<SampleRecord> = (0..records)
        .map(|_| {
            SampleRecord::new(
                Point::new(
                    rng.gen_range(0..block_size),
                    rng.gen_range(0..block_size),
                    rng.gen_range(0..block_size),
                ),
                rng.gen(),
            )
        })
        .collect();
    encode_block(&samples)
}

fn bench_nearest(c: &mut Criterion) {
    let sizes = [1_000, 10_000, 100_000];

    let mut group = c.benchmark_group("block_nearest");

    for records in sizes {
        let data = random_block(records, 1000);
        group.throughput(Throughput::Bytes((records * RECORD_SIZE) as u64));

        let query = Point::new(500, 500, 500);
        group.bench_function(format!("records_{}", records), |bencher| {
            bencher.iter(|| Block::new(black_box(&data)).nearest(black_box(&query), 100.0))
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let data = random_block(10_000, 1000);

    let mut group = c.benchmark_group("block_decode");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("iter_sum_signatures", |bencher| {
        bencher.iter(|| {
            Block::new(black_box(&data))
                .iter()
                .fold(0i64, |acc, r| acc.wrapping_add(r.signature))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_nearest, bench_decode);
criterion_main!(benches);
