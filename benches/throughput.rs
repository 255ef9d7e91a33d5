//! Throughput benchmarks: sketch update/estimate across the three sketch
//! variants, and trace replay through the two policies.
//!
//! Run with:
//!     cargo bench --bench throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lungo::{
    AdaSketch, AdaSketchOptions, CountMinSketch, EvolvingSketch, EvolvingSketchOptions,
    FifoPolicy, MockCache, ReplacementPolicy, Sketch, WTinyLfuPolicy,
};

/// Capacity hint shared by every sketch under test.
const SIZE: usize = 10_000;

/// Operations per criterion iteration (hot-loop size).
const OPS: usize = 1_000;

fn decay(t: u32, alpha: f64) -> f32 {
    (alpha * f64::from(t) / 10_000.0).exp() as f32
}

fn keys(len: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(0xBEEF);
    (0..len).map(|_| rng.gen_range(0..SIZE as u64)).collect()
}

fn evolving() -> EvolvingSketch<u64, fn(u32, f64) -> f32> {
    EvolvingSketch::new(
        SIZE,
        EvolvingSketchOptions {
            f: decay as fn(u32, f64) -> f32,
            initial_alpha: 1.0,
            adapter: None,
            adapt_interval: 0,
        },
    )
    .unwrap()
}

fn ada() -> AdaSketch<u64, impl Fn(u32) -> f32> {
    AdaSketch::new(
        SIZE,
        AdaSketchOptions {
            f: |t| decay(t, 1.0),
            tune_interval: 0,
        },
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Group 1: update
// ---------------------------------------------------------------------------

fn bench_update(c: &mut Criterion) {
    let keys = keys(OPS);

    let mut group = c.benchmark_group("sketch_update");
    group.throughput(Throughput::Elements(OPS as u64));

    group.bench_function("count_min", |b| {
        let mut sketch: CountMinSketch<u64> = CountMinSketch::new(SIZE).unwrap();
        b.iter(|| {
            for key in &keys {
                sketch.update(black_box(key));
            }
        })
    });

    group.bench_function("ada", |b| {
        let mut sketch = ada();
        b.iter(|| {
            for key in &keys {
                sketch.update(black_box(key));
            }
        })
    });

    group.bench_function("evolving", |b| {
        let mut sketch = evolving();
        b.iter(|| {
            for key in &keys {
                sketch.update(black_box(key));
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: estimate
// ---------------------------------------------------------------------------

fn bench_estimate(c: &mut Criterion) {
    let keys = keys(OPS);

    let mut group = c.benchmark_group("sketch_estimate");
    group.throughput(Throughput::Elements(OPS as u64));

    group.bench_function("count_min", |b| {
        let mut sketch: CountMinSketch<u64> = CountMinSketch::new(SIZE).unwrap();
        for key in &keys {
            sketch.update(key);
        }
        b.iter(|| {
            for key in &keys {
                black_box(sketch.estimate(black_box(key)));
            }
        })
    });

    group.bench_function("ada", |b| {
        let mut sketch = ada();
        for key in &keys {
            sketch.update(key);
        }
        b.iter(|| {
            for key in &keys {
                black_box(sketch.estimate(black_box(key)));
            }
        })
    });

    group.bench_function("evolving", |b| {
        let mut sketch = evolving();
        for key in &keys {
            sketch.update(key);
        }
        b.iter(|| {
            for key in &keys {
                black_box(sketch.estimate(black_box(key)));
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 3: policy replay
// ---------------------------------------------------------------------------

fn bench_policy_replay(c: &mut Criterion) {
    const CACHE: usize = 1_000;
    let keys = keys(OPS);

    let mut group = c.benchmark_group("policy_replay");
    group.throughput(Throughput::Elements(OPS as u64));

    group.bench_function("tinylfu_evolving", |b| {
        let mut policy = WTinyLfuPolicy::new(CACHE, evolving()).unwrap();
        let mut cache: MockCache<u64> = MockCache::new(CACHE);
        b.iter(|| {
            for &key in &keys {
                if cache.contains(&key) {
                    policy.on_hit(&key);
                } else {
                    policy.on_miss(&mut cache, key, key);
                }
            }
        })
    });

    group.bench_function("fifo", |b| {
        let mut policy: FifoPolicy<u64> = FifoPolicy::new(CACHE).unwrap();
        let mut cache: MockCache<u64> = MockCache::new(CACHE);
        b.iter(|| {
            for &key in &keys {
                if cache.contains(&key) {
                    policy.on_hit(&key);
                } else {
                    policy.on_miss(&mut cache, key, key);
                }
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_update, bench_estimate, bench_policy_replay);
criterion_main!(benches);
