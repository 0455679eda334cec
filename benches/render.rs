//! Criterion benchmarks for the template parser and renderer.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jtpl::{parse, render, RenderOptions, Value};

fn custom_criterion() -> Criterion {
    Criterion::default()
        .sample_size(30)
        .warm_up_time(Duration::from_millis(200))
        .measurement_time(Duration::from_secs(2))
}

fn bench_static_template(c: &mut Criterion) {
    let template = Value::from(serde_json::json!({
        "a": 1, "b": "text", "c": [1, 2, 3], "d": { "e": true }
    }));
    let ast = parse(&template, None).unwrap();
    let data = Value::Null;

    c.bench_function("render_static_fast_path", |b| {
        b.iter(|| render(black_box(&ast), black_box(&data), RenderOptions::default()).unwrap())
    });
}

fn bench_interpolation(c: &mut Criterion) {
    let template = Value::from(serde_json::json!({ "greeting": "Hello ${user.name}, you are ${user.age}!" }));
    let ast = parse(&template, None).unwrap();
    let data = Value::from(serde_json::json!({ "user": { "name": "Ada", "age": 30 } }));

    c.bench_function("render_interpolation", |b| {
        b.iter(|| render(black_box(&ast), black_box(&data), RenderOptions::default()).unwrap())
    });
}

fn bench_loop(c: &mut Criterion) {
    let template = Value::from(serde_json::json!({ "ids": { "$for x in xs": "${x.id}" } }));
    let ast = parse(&template, None).unwrap();
    let items: Vec<serde_json::Value> = (0..200).map(|i| serde_json::json!({ "id": i })).collect();
    let data = Value::from(serde_json::json!({ "xs": items }));

    c.bench_function("render_loop_200_items", |b| {
        b.iter(|| render(black_box(&ast), black_box(&data), RenderOptions::default()).unwrap())
    });
}

fn bench_conditional_chain(c: &mut Criterion) {
    let template = Value::from(serde_json::json!({
        "base": 1,
        "$if a": { "x": 1 },
        "$elif b": { "x": 2 },
        "$else": { "x": 3 }
    }));
    let ast = parse(&template, None).unwrap();
    let data = Value::from(serde_json::json!({ "a": false, "b": true }));

    c.bench_function("render_conditional_chain", |b| {
        b.iter(|| render(black_box(&ast), black_box(&data), RenderOptions::default()).unwrap())
    });
}

criterion_group! {
    name = benches;
    config = custom_criterion();
    targets = bench_static_template, bench_interpolation, bench_loop, bench_conditional_chain
}
criterion_main!(benches);
