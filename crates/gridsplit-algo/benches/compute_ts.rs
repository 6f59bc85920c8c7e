//! Performance benchmarks for time-series network compilation
//!
//! This benchmark suite measures:
//! - Static compilation of a radial feeder (`compute`)
//! - Time-series compilation with few distinct switching states (`compute_ts`)
//! - Grouping of time steps by branch state (`get_different_states`)
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p gridsplit-algo
//!
//! # Run specific benchmark
//! cargo bench -p gridsplit-algo -- compute_ts
//! ```
//!
//! The feeder is synthetic: a chain of buses with a tie switch that opens on
//! a fixed period, so every horizon has exactly two distinct states.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gridsplit_algo::{CircuitConfig, NumericalCircuit};
use gridsplit_core::{BusType, ElementCounts, ElementStore};
use num_complex::Complex64;

const SIZES: &[usize] = &[50, 200, 1000];
const N_TIME: usize = 96;

/// Chain feeder of `n_bus` buses, a load on every bus but the first, and a
/// mid-feeder switch open every fourth step.
fn synthetic_feeder(n_bus: usize, n_time: usize) -> ElementStore {
    let counts = ElementCounts {
        bus: n_bus,
        branch: n_bus - 1,
        load: n_bus - 1,
        generator: 2,
        ..ElementCounts::default()
    };
    let mut store = ElementStore::new(counts, n_time, 100.0);
    for k in 0..n_bus - 1 {
        store.branch.f[k] = k;
        store.branch.t[k] = k + 1;
        store.branch.r[k] = 0.01;
        store.branch.x[k] = 0.05;
        store.branch.b[k] = 0.001;
        store.load.bus[k] = k + 1;
        for t in 0..n_time {
            let p = 1.0 + (t as f64 * 0.26).sin();
            store.load.power_prof.set(t, k, Complex64::new(p, 0.3 * p));
        }
    }
    let switch = (n_bus - 1) / 2;
    for t in (0..n_time).step_by(4) {
        store.branch.active_prof.set(t, switch, false);
    }
    store.generator.bus = vec![0, n_bus - 1];
    store.generator.nominal_power = vec![500.0, 100.0];
    store.generator.power_factor = vec![1.0, 0.9];
    store.bus.types[0] = BusType::PV;
    store.bus.types[n_bus - 1] = BusType::PV;
    store
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute");
    for &n_bus in SIZES {
        let store = synthetic_feeder(n_bus, 1);
        group.bench_with_input(BenchmarkId::from_parameter(n_bus), &store, |b, store| {
            b.iter(|| {
                let mut circuit = NumericalCircuit::new(store.clone()).unwrap();
                black_box(circuit.compute(&CircuitConfig::default()).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_compute_ts(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_ts");
    for &n_bus in SIZES {
        let store = synthetic_feeder(n_bus, N_TIME);
        for parallel in [false, true] {
            let id = BenchmarkId::new(if parallel { "parallel" } else { "sequential" }, n_bus);
            let config = CircuitConfig::default().with_parallel(parallel);
            group.bench_with_input(id, &store, |b, store| {
                b.iter(|| {
                    let mut circuit = NumericalCircuit::new(store.clone()).unwrap();
                    black_box(circuit.compute_ts(&config).unwrap())
                })
            });
        }
    }
    group.finish();
}

fn bench_different_states(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_different_states");
    for &n_time in &[96, 8760] {
        let circuit = NumericalCircuit::new(synthetic_feeder(200, n_time)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n_time), &circuit, |b, circuit| {
            b.iter(|| black_box(circuit.get_different_states()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_compute,
    bench_compute_ts,
    bench_different_states
);
criterion_main!(benches);
