//! Benchmark for noise and climate sampling.
//!
//! Run with: cargo bench --package hollowmere_procedural --bench noise_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hollowmere_procedural::{CellularNoise, ChunkGenerator, SeedTag, SimplexNoise, WorldConfig, WorldSeed};

fn benchmark_single_sample(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42).purpose(SeedTag::Elevation));

    c.bench_function("single_simplex_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample(black_box(x), black_box(x * 0.7)))
        });
    });
}

fn benchmark_million_samples(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42).purpose(SeedTag::Elevation));

    let mut group = c.benchmark_group("million_samples");
    group.throughput(Throughput::Elements(1_000_000));
    group.sample_size(10);

    group.bench_function("1M_simplex_samples", |b| {
        b.iter(|| {
            for i in 0..1_000_000 {
                let x = f64::from(i % 1000) * 0.1;
                let y = f64::from(i / 1000) * 0.1;
                black_box(noise.sample(x, y));
            }
        });
    });

    group.finish();
}

fn benchmark_octaved_noise(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42).purpose(SeedTag::Moisture));

    c.bench_function("octaved_simplex_4_octaves", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.normalized(black_box(x), black_box(x * 0.7), 4, 0.5, 2.0))
        });
    });
}

fn benchmark_cellular(c: &mut Criterion) {
    let noise = CellularNoise::new(WorldSeed::new(42).purpose(SeedTag::Cluster), 12.0);

    c.bench_function("cellular_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.37;
            black_box(noise.sample(black_box(x), black_box(-x * 0.5)))
        });
    });
}

fn benchmark_climate(c: &mut Criterion) {
    let generator = ChunkGenerator::new(WorldSeed::new(42), &WorldConfig::standard());
    let classifier = generator.classifier();

    let mut group = c.benchmark_group("climate");
    group.bench_function("classify", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 1.0;
            black_box(classifier.classify(black_box(x), black_box(x * 0.3)))
        });
    });
    group.bench_function("blend", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 1.0;
            black_box(classifier.blend(black_box(x), black_box(x * 0.3)))
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_single_sample,
    benchmark_million_samples,
    benchmark_octaved_noise,
    benchmark_cellular,
    benchmark_climate,
);
criterion_main!(benches);
