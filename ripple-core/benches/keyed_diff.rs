//! Benchmark: keyed children diff and the LIS step

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::props;
use ripple_core::render::{create_renderer, get_sequence, h, MemoryHost, VNode};

fn list(keys: &[usize]) -> VNode {
    h(
        "ul",
        None,
        keys.iter()
            .map(|key| h("li", Some(props! { "key" => *key }), key.to_string()))
            .collect::<Vec<_>>(),
    )
}

fn benchmark_keyed_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_patch");
    for size in [100usize, 1_000] {
        let forward: Vec<usize> = (0..size).collect();
        let mut rotated = forward.clone();
        rotated.rotate_left(size / 3);
        let mut swapped = forward.clone();
        swapped.swap(1, size - 2);

        for (name, shuffled) in [("rotate", rotated), ("swap", swapped)] {
            group.bench_with_input(BenchmarkId::new(name, size), &shuffled, |b, shuffled| {
                let host = Arc::new(MemoryHost::new());
                let renderer = create_renderer(host.clone());
                let root = host.create_root("bench");
                renderer.render(Some(list(&forward)), root);

                let mut flip = false;
                b.iter(|| {
                    let keys = if flip { &forward } else { shuffled };
                    flip = !flip;
                    renderer.render(Some(black_box(list(keys))), root);
                    host.take_ops();
                });
            });
        }
    }
    group.finish();
}

fn benchmark_get_sequence(c: &mut Criterion) {
    // pseudo-random but deterministic, with some zeros
    let values: Vec<usize> = (0..10_000usize)
        .map(|i| if i % 17 == 0 { 0 } else { (i * 7_919) % 10_007 + 1 })
        .collect();

    c.bench_function("get_sequence_10k", |b| {
        b.iter(|| get_sequence(black_box(&values)))
    });
}

criterion_group!(benches, benchmark_keyed_patch, benchmark_get_sequence);
criterion_main!(benches);
