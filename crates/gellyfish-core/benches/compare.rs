use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use gellyfish_core::compare::{compare_values_semantically, parse_expected_value};

fn jellyfish_rows(n: usize) -> Value {
    let rows: Vec<Value> = (0..n)
        .map(|i| json!({"name": format!("jelly-{i}"), "age": i % 7, "weight": i as f64 * 0.25}))
        .collect();
    json!({"jellyfishes": {"edges": rows}})
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_values_semantically");

    group.bench_function("single_count", |b| {
        let actual = json!({"jellyfishes": {"count(id)": 4}});
        let expected = json!(4);
        b.iter(|| compare_values_semantically(black_box(&actual), black_box(&expected)))
    });

    group.bench_function("100_rows", |b| {
        let actual = jellyfish_rows(100);
        let expected = jellyfish_rows(100);
        b.iter(|| compare_values_semantically(black_box(&actual), black_box(&expected)))
    });

    group.bench_function("1000_rows_mismatch", |b| {
        let actual = jellyfish_rows(1000);
        let expected = jellyfish_rows(999);
        b.iter(|| compare_values_semantically(black_box(&actual), black_box(&expected)))
    });

    group.finish();
}

fn bench_parse_expected(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_expected_value");

    group.bench_function("json", |b| {
        b.iter(|| parse_expected_value(black_box(r#"{"plants": 3, "meat": 5}"#)))
    });

    group.bench_function("single_pair", |b| {
        b.iter(|| parse_expected_value(black_box("count(jellyfishes, where: age > 2): 3")))
    });

    group.bench_function("multiple_pairs", |b| {
        b.iter(|| parse_expected_value(black_box("plants: 3\nmeat: 5\nother: 1")))
    });

    group.finish();
}

criterion_group!(benches, bench_compare, bench_parse_expected);
criterion_main!(benches);
