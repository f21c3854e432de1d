//! Benchmarks for the config merge engine.
//!
//! These benchmarks measure folding config sources of increasing breadth and
//! depth into one tree, with and without per-path merge modes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bundlekit::merge::{MergeMode, MergeModes};
use bundlekit::phases::{composite, ConfigSource};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_yaml::{Mapping, Value};

/// A nested mapping `depth` levels deep with `width` keys per level, each
/// leaf holding a short list.
fn tree(width: usize, depth: usize, tag: usize) -> Value {
    let mut map = Mapping::new();
    for i in 0..width {
        let key = Value::String(format!("key{}", i));
        let value = if depth == 0 {
            Value::Sequence(vec![Value::Number((tag * 10 + i).into())])
        } else {
            tree(width, depth - 1, tag)
        };
        map.insert(key, value);
    }
    Value::Mapping(map)
}

fn sources(count: usize, width: usize, depth: usize, merges: &[(&str, MergeMode)]) -> Vec<ConfigSource> {
    let merges: BTreeMap<String, MergeMode> = merges
        .iter()
        .map(|(path, mode)| (path.to_string(), *mode))
        .collect();
    (0..count)
        .map(|idx| ConfigSource {
            project: format!("p{}", idx),
            path: PathBuf::from(format!("p{}/config.yaml", idx)),
            order: idx as i64,
            modes: MergeModes::from_declared(&merges),
            values: tree(width, depth, idx),
        })
        .collect()
}

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_merge_fold");
    for &(count, width, depth) in &[(4, 4, 2), (16, 6, 3), (32, 8, 3)] {
        let input = sources(count, width, depth, &[]);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}^{}", count, width, depth)),
            &input,
            |b, input| b.iter(|| composite::execute(black_box(input)).unwrap()),
        );
    }
    group.finish();
}

fn bench_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_merge_modes");
    let cases: [(&str, Vec<(&str, MergeMode)>); 3] = [
        ("append", vec![]),
        (
            "insert",
            vec![("key0.key0.key0", MergeMode::Insert), ("key1.key1.key1", MergeMode::Insert)],
        ),
        ("replace", vec![("key0", MergeMode::Replace)]),
    ];
    for (name, merges) in cases.iter() {
        let input = sources(16, 6, 2, merges);
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, input| {
            b.iter(|| composite::execute(black_box(input)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fold, bench_modes);
criterion_main!(benches);
