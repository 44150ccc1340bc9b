use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use terrane_chunk::{GenerationId, GenerationRequest, GeneratorCache, generate_with_sampler};
use terrane_world::{ChunkCoord, GeneratorSettings, HeightField, TileSampler};

fn request(resolution: u32) -> GenerationRequest {
    GenerationRequest::new(
        GenerationId(1),
        ChunkCoord::new(3, -7),
        100.0,
        resolution,
        GeneratorSettings::with_seed(0xC0FFEE),
    )
}

fn bench_build_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_chunk_cpu");
    for r in [16u32, 64] {
        let req = request(r);
        let mut cache = GeneratorCache::new();
        group.bench_function(format!("r{r}"), |b| {
            b.iter(|| black_box(cache.generate(black_box(&req))))
        });
    }
    group.finish();
}

fn bench_build_sampled(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_chunk_sampled");
    let sampler = TileSampler::try_new(4);
    let req = request(64);
    let field = HeightField::new(&req.settings);
    group.bench_function("r64", |b| {
        b.iter(|| black_box(generate_with_sampler(&req, &field, sampler.as_ref())))
    });
    group.finish();
}

fn configured() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3))
}

criterion_group! {
    name = benches;
    config = configured();
    targets = bench_build_cached, bench_build_sampled
}
criterion_main!(benches);
