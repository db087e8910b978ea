//! Criterion benchmarks for the decay calculator.

use chrono::{DateTime, Duration};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use repute_core::traits::DecayCalculator;
use repute_core::types::{DecayConfig, ReputationDecay};
use repute_decay::engine::DecayEngine;
use repute_decay::factors::{activity_factor, nonlinear_factor};

fn bench_factors(c: &mut Criterion) {
    c.bench_function("nonlinear_factor", |b| {
        b.iter(|| nonlinear_factor(black_box(-150.0)))
    });
    c.bench_function("activity_factor", |b| {
        b.iter(|| activity_factor(black_box(42.0)))
    });
}

fn bench_calculate_decay(c: &mut Criterion) {
    let engine = DecayEngine::new();
    let config = DecayConfig::default();
    let last = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
    let now = last + Duration::days(12);

    c.bench_function("calculate_decay", |b| {
        b.iter(|| {
            engine.calculate_decay(
                black_box(250.0),
                black_box(last),
                black_box(now),
                Some(black_box(&config)),
            )
        })
    });
}

fn bench_update(c: &mut Criterion) {
    let engine = DecayEngine::new();
    let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
    let record = ReputationDecay::new("char", "faction", 250.0, 1.0, now);

    c.bench_function("update_decay_process", |b| {
        b.iter(|| {
            let mut r = record.clone();
            engine.update_decay_process(&mut r, black_box(-3.5), now, -500.0);
            r
        })
    });
}

criterion_group!(benches, bench_factors, bench_calculate_decay, bench_update);
criterion_main!(benches);
