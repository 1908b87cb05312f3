#![allow(clippy::cast_possible_truncation)]
#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput};
use skein_benchmark::{registry, roster};
use skein_integration_test::Member;
use skein_serialize::{
    Options, Value, from_bytes, from_bytes_with, to_bytes, to_bytes_with,
};

#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn bench_wide_graph(c: &mut Criterion) {
    let registry = registry();
    let mut group = c.benchmark_group("wide_graph");

    for size in [100, 1_000, 10_000] {
        let root = Value::shared(&roster(size));
        let bytes = to_bytes(&root, &registry).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("write", size),
            &root,
            |b, root| {
                b.iter(|| to_bytes(black_box(root), &registry).unwrap());
            },
        );
        group.bench_with_input(
            BenchmarkId::new("read", size),
            &bytes,
            |b, bytes| {
                b.iter(|| from_bytes(black_box(bytes), &registry).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_deep_graph(c: &mut Criterion) {
    let registry = registry();
    let mut group = c.benchmark_group("deep_graph");

    for depth in [16, 64, 200] {
        let root = Value::shared(&Member::lineage(depth));
        let bytes = to_bytes(&root, &registry).unwrap();

        group.bench_with_input(
            BenchmarkId::new("write", depth),
            &root,
            |b, root| {
                b.iter(|| to_bytes(black_box(root), &registry).unwrap());
            },
        );
        group.bench_with_input(
            BenchmarkId::new("read", depth),
            &bytes,
            |b, bytes| {
                b.iter(|| from_bytes(black_box(bytes), &registry).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_sentinels(c: &mut Criterion) {
    let registry = registry();
    let root = Value::shared(&roster(1_000));
    let mut group = c.benchmark_group("sentinels");

    for sentinels in [false, true] {
        let options = Options::new().with_sentinels(sentinels);
        let bytes = to_bytes_with(&root, &registry, options).unwrap();

        group.bench_with_input(
            BenchmarkId::new("round_trip", sentinels),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    to_bytes_with(&root, &registry, options).unwrap();
                    from_bytes_with(black_box(bytes), &registry, options)
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion::criterion_group!(
    benches,
    bench_wide_graph,
    bench_deep_graph,
    bench_sentinels
);
criterion::criterion_main!(benches);
