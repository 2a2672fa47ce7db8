use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flood_sentinel::core::{entropy, AttributeTally};

fn tally_record_benchmark(c: &mut Criterion) {
    let tally: AttributeTally<u32> = AttributeTally::new(Utc::now(), Duration::seconds(60), 65_536);
    let (start, _) = tally.bounds();

    let mut next = 0u32;
    c.bench_function("tally_record", |b| {
        b.iter(|| {
            next = next.wrapping_add(1);
            tally.record(black_box(next % 512), start)
        })
    });
}

fn entropy_estimate_benchmark(c: &mut Criterion) {
    let tally: AttributeTally<u32> = AttributeTally::new(Utc::now(), Duration::seconds(60), 65_536);
    let (start, _) = tally.bounds();
    for i in 0..10_000u32 {
        tally.record(i % 512, start).unwrap();
    }
    let window = tally.close_window();

    c.bench_function("entropy_estimate", |b| {
        b.iter(|| entropy::estimate(black_box(&window)))
    });
}

criterion_group!(benches, tally_record_benchmark, entropy_estimate_benchmark);
criterion_main!(benches);
