//! Microbenchmarks for key generation and navigation.
//!
//! Run with: `cargo bench -p calkey -- keys`

#![allow(missing_docs)]

use calkey::{AggregationPeriod, KeyScheme, PeriodHierarchy};
use chrono::{NaiveDate, NaiveDateTime};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn sample_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2015, 3, 12)
        .unwrap()
        .and_hms_opt(17, 3, 0)
        .unwrap()
}

/// A realistic roll-up chain from 5-minute buckets to years.
fn setup_scheme(compression: bool) -> KeyScheme {
    let mut hierarchy = PeriodHierarchy::new();
    hierarchy.add("1H", "5N").unwrap();
    hierarchy.add("1D", "1H").unwrap();
    hierarchy.add("1M", "1D").unwrap();
    hierarchy.add("1Y", "1M").unwrap();
    KeyScheme::new(hierarchy, compression)
}

fn bench_generate(c: &mut Criterion) {
    let scheme = setup_scheme(false);
    let at = sample_time();
    let mut group = c.benchmark_group("keys/generate");

    for code in ["5N", "1H", "3M", "1I", "15N(Australia/Melbourne)"] {
        let period = AggregationPeriod::parse(code).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(code), &period, |b, period| {
            b.iter(|| scheme.generate_key(black_box(period), black_box(&at)).unwrap());
        });
    }

    group.finish();
}

fn bench_navigate(c: &mut Criterion) {
    let scheme = setup_scheme(false);

    c.bench_function("keys/next/hour", |b| {
        b.iter(|| scheme.next_key(black_box("1H2015031217")).unwrap());
    });

    // Crosses a year boundary through the day-by-day search.
    c.bench_function("keys/next/week_year_end", |b| {
        b.iter(|| scheme.next_key(black_box("1I200953")).unwrap());
    });

    c.bench_function("keys/upper/minute", |b| {
        b.iter(|| scheme.upper_level_key(black_box("5N201503121700")).unwrap());
    });
}

fn bench_compressed(c: &mut Criterion) {
    let scheme = setup_scheme(true);
    let quarter = AggregationPeriod::parse("3M").unwrap();
    let at = sample_time();

    c.bench_function("keys/compressed/generate_quarter", |b| {
        b.iter(|| scheme.generate_key(black_box(&quarter), black_box(&at)).unwrap());
    });

    c.bench_function("keys/compressed/decode_quarter", |b| {
        b.iter(|| scheme.start_time(black_box("3M20150")).unwrap());
    });
}

criterion_group!(benches, bench_generate, bench_navigate, bench_compressed);
criterion_main!(benches);
