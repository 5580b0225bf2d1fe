//! Benchmarks for local-operator construction and host-side lifting.
//!
//! Run with: `cargo bench --bench operators_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dg_local::{ElementKind, LocalOperators};

fn bench_operator_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_local_operators");
    for order in [2i64, 4, 6] {
        group.bench_with_input(
            BenchmarkId::new("triangle", order),
            &order,
            |bencher, &order| {
                bencher.iter(|| LocalOperators::build(ElementKind::Triangle, black_box(order)))
            },
        );
        group.bench_with_input(
            BenchmarkId::new("tetrahedron", order),
            &order,
            |bencher, &order| {
                bencher.iter(|| LocalOperators::build(ElementKind::Tetrahedron, black_box(order)))
            },
        );
    }
    group.finish();
}

fn bench_lifting_apply(c: &mut Criterion) {
    let ops = LocalOperators::build(ElementKind::Tetrahedron, 4).unwrap();
    let n = ops.element.node_count();
    let cols = ops.lifting.ncols();
    let flux: Vec<f64> = (0..cols).map(|j| (j as f64 * 0.37).sin()).collect();

    c.bench_function("apply_lifting_tet_p4", |bencher| {
        bencher.iter(|| {
            let mut out = vec![0.0f64; n];
            for i in 0..n {
                let mut sum = 0.0;
                for (j, &f) in flux.iter().enumerate() {
                    sum += ops.lifting[(i, j)] * f;
                }
                out[i] = sum;
            }
            black_box(out)
        })
    });
}

criterion_group!(benches, bench_operator_construction, bench_lifting_apply);
criterion_main!(benches);
