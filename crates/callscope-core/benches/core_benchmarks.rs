//! Benchmarks for statistics, sorting and slug generation

#![allow(missing_docs, clippy::unwrap_used)]

use callscope_core::utils::slugify;
use callscope_core::{
    Call, SortColumn, SortState, calculate_stats, calls_per_day_in_range, sort_calls,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::collections::BTreeSet;
use std::hint::black_box;

/// Calls spread over thirty days with a rotating set of customers
fn sample_calls(count: u32) -> Vec<Call> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    (0..count)
        .map(|n| Call {
            id: format!("call-{n}"),
            customer_id: Some(format!("cust-{}", n % 50)),
            customer_name: format!("Customer {}", n % 50),
            agent_id: None,
            agent_name: format!("Agent {}", n % 7),
            date: start + Duration::minutes(i64::from(n) * 37 % (30 * 24 * 60)),
            duration: f64::from(n % 900),
            audio_url: None,
            summary: None,
            transcript: None,
            satisfaction_score: (n % 3 != 0).then_some(f64::from(n % 5)),
            tags: BTreeSet::new(),
        })
        .collect()
}

fn bench_calculate_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculate_stats");

    for size in [100_u32, 1_000, 10_000] {
        let calls = sample_calls(size);
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &calls, |b, calls| {
            b.iter(|| calculate_stats(black_box(calls)));
        });
    }

    let calls = sample_calls(10_000);
    let range = callscope_core::DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap();
    group.bench_function("calls_per_day_in_range", |b| {
        b.iter(|| calls_per_day_in_range(black_box(&calls), black_box(&range)));
    });

    group.finish();
}

fn bench_sort_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_calls");
    let calls = sample_calls(5_000);

    for column in [
        SortColumn::Date,
        SortColumn::CustomerName,
        SortColumn::SatisfactionScore,
    ] {
        group.bench_function(BenchmarkId::from_parameter(column), |b| {
            b.iter_batched(
                || calls.clone(),
                |mut calls| sort_calls(&mut calls, SortState::ascending(column)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_slugify(c: &mut Criterion) {
    let names = [
        "Acme Support",
        "  Café Crème Support Team  ",
        "Globex -- Customer Care (EMEA)",
        "Ünïcödé Organisation Name With Many Words In It",
    ];

    c.bench_function("slugify", |b| {
        b.iter(|| {
            for name in &names {
                black_box(slugify(black_box(name)));
            }
        });
    });
}

criterion_group!(benches, bench_calculate_stats, bench_sort_calls, bench_slugify);
criterion_main!(benches);
