//! Performance benchmarks for network propagation.
//!
//! Run with: `cargo bench --bench propagation`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Empty pass | Linear in edges | Worklist overhead only |
//! | Barrier aggregation | Linear in edges × barriers below | Set merges per node |
//! | Full run | <1s for 64k edges | In-memory store, no splitting |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use stream_connectivity::analysis::{
    aggregate_barriers, classify_accessibility, resolve_mainstems, smooth_elevations,
};
use stream_connectivity::{
    Barrier, BarrierId, BarrierKind, Coord, EdgeId, EngineConfig, InMemorySpatialStore, Network,
    Propagator, Species, SpeciesTable, StreamRecord, Vertex, WatershedRun,
};
use uuid::Uuid;

/// Node `k` of a complete binary tree of the given depth, heap numbered.
fn node_coord(k: usize) -> Coord {
    Coord::new(k as f64, 0.0)
}

fn node_elevation(k: usize) -> f64 {
    (usize::BITS - k.leading_zeros()) as f64 * 10.0
}

/// Streams of a complete binary tree draining through node 1 to a mouth.
fn make_streams(depth: u32) -> Vec<StreamRecord> {
    let nodes = (1usize << depth) - 1;
    let vertex = |k: usize| {
        let c = node_coord(k);
        Vertex::new(c.x, c.y, node_elevation(k))
    };

    let mut records = vec![StreamRecord::new(
        EdgeId::new(Uuid::from_u128(1)),
        vec![vertex(1), Vertex::new(0.0, 0.0, 0.0)],
    )
    .with_length(100.0)];
    for k in 2..=nodes {
        records.push(
            StreamRecord::new(EdgeId::new(Uuid::from_u128(k as u128)), vec![vertex(k), vertex(k / 2)])
                .with_length(100.0)
                .with_habitat("bt", k % 3 == 0),
        );
    }
    records
}

/// One dam on every eighth junction.
fn make_barriers(depth: u32) -> Vec<Barrier> {
    let nodes = (1usize << depth) - 1;
    (1..=nodes)
        .step_by(8)
        .map(|k| Barrier::new(BarrierId::new(Uuid::from_u128(k as u128)), BarrierKind::Dam, node_coord(k)))
        .collect()
}

fn make_species() -> Vec<Species> {
    vec![Species::new("bt", "Bull Trout", 0.25), Species::new("ch", "Chinook", 0.5)]
}

fn make_network(depth: u32) -> Network {
    let mut net = Network::build(make_streams(depth), SpeciesTable::new(make_species()))
        .expect("binary tree is a valid network");
    net.attach_barriers(make_barriers(depth));
    net
}

/// Benchmark bare passes in both directions.
fn bench_empty_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("empty_pass");

    for depth in [8, 12, 16] {
        let mut net = make_network(depth);
        group.throughput(Throughput::Elements(net.edge_count() as u64));

        for propagator in [Propagator::downstream(), Propagator::upstream()] {
            group.bench_function(
                BenchmarkId::new(propagator.direction().to_string(), depth),
                |b| b.iter(|| propagator.run(black_box(&mut net), |_, _| {}).unwrap()),
            );
        }
    }

    group.finish();
}

/// Benchmark the analysis stages that walk the network.
fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");

    for depth in [8, 12, 16] {
        let mut net = make_network(depth);
        group.throughput(Throughput::Elements(net.edge_count() as u64));

        group.bench_function(BenchmarkId::new("smooth", depth), |b| {
            b.iter(|| smooth_elevations(black_box(&mut net)).unwrap())
        });
        group.bench_function(BenchmarkId::new("mainstem", depth), |b| {
            b.iter(|| resolve_mainstems(black_box(&mut net)).unwrap())
        });
        group.bench_function(BenchmarkId::new("barriers", depth), |b| {
            b.iter(|| {
                aggregate_barriers(black_box(&mut net)).unwrap();
                classify_accessibility(&mut net)
            })
        });
    }

    group.finish();
}

/// Benchmark a full run against the in-memory store.
fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    group.sample_size(10);

    let config = EngineConfig {
        split_at_gradient_breaks: false,
        ..EngineConfig::default()
    };

    for depth in [8, 12, 16] {
        let mut store = InMemorySpatialStore::new();
        for s in make_species() {
            store.add_species(s);
        }
        for r in make_streams(depth) {
            store.add_stream(r);
        }
        for b in make_barriers(depth) {
            store.add_barrier(b);
        }
        group.throughput(Throughput::Elements(store.num_streams() as u64));

        group.bench_with_input(BenchmarkId::new("edges", store.num_streams()), &store, |b, store| {
            b.iter(|| {
                let mut run = WatershedRun::new(store.clone(), config.clone());
                run.run().unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_empty_pass, bench_stages, bench_full_run);
criterion_main!(benches);
