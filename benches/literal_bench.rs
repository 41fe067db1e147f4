use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use crossheap::{Config, Session};

struct Scenario {
    name: &'static str,
    len: usize,
}

const SCENARIOS: &[Scenario] = &[
    Scenario { name: "small", len: 16 },
    Scenario { name: "10k", len: 10_000 },
    Scenario { name: "1m", len: 1_000_000 },
];

fn payload(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 * 0.5).collect()
}

fn bench_encode(c: &mut Criterion) {
    let session = Session::new(Config::default());
    let mut group = c.benchmark_group("literal/encode_doubles");

    for scenario in SCENARIOS {
        let data = payload(scenario.len);
        group.throughput(Throughput::Bytes((scenario.len * 8) as u64));

        group.bench_with_input(BenchmarkId::new("slice_copy", scenario.name), &data, |b, data| {
            b.iter(|| {
                session.with_region(|region| black_box(region.encode(data.as_slice()).raw()))
            })
        });

        // Cloning outside the region keeps the measured path to the move.
        group.bench_with_input(BenchmarkId::new("vec_move", scenario.name), &data, |b, data| {
            b.iter_batched(
                || data.clone(),
                |owned| session.with_region(|region| black_box(region.encode(owned).raw())),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_structural_eq(c: &mut Criterion) {
    let session = Session::new(Config::default());
    let mut group = c.benchmark_group("literal/heq_doubles");

    for scenario in SCENARIOS {
        let data = payload(scenario.len);
        group.throughput(Throughput::Elements(scenario.len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(scenario.name), &data, |b, data| {
            session.with_region(|region| {
                let a = region.encode(data.clone());
                let b2 = region.encode(data.clone());
                b.iter(|| black_box(region.heq(a, b2)));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_structural_eq);
criterion_main!(benches);
