//! Black-box tests for the six concrete input/output scenarios.

use std::collections::HashMap;

use jtpl::{parse, render, RenderOptions, Value};

fn run(template: serde_json::Value, data: serde_json::Value) -> Value {
    let ast = parse(&Value::from(template), None).expect("template should parse");
    render(&ast, &Value::from(data), RenderOptions::default()).expect("template should render")
}

#[test]
fn simple_interpolation() {
    let out = run(
        serde_json::json!({ "greeting": "Hello ${name}!" }),
        serde_json::json!({ "name": "World" }),
    );
    assert_eq!(out, Value::from(serde_json::json!({ "greeting": "Hello World!" })));
}

#[test]
fn conditional_merge_true_and_false_branches() {
    let template = serde_json::json!({
        "base": 1,
        "$if flag": { "extra": 2 },
        "$else": { "other": 3 }
    });

    let true_out = run(template.clone(), serde_json::json!({ "flag": true }));
    assert_eq!(true_out, Value::from(serde_json::json!({ "base": 1, "extra": 2 })));

    let false_out = run(template, serde_json::json!({ "flag": false }));
    assert_eq!(false_out, Value::from(serde_json::json!({ "base": 1, "other": 3 })));
}

#[test]
fn loop_flatten() {
    let out = run(
        serde_json::json!({ "ids": { "$for x in xs": "${x.id}" } }),
        serde_json::json!({ "xs": [{ "id": 1 }, { "id": 2 }] }),
    );
    assert_eq!(out, Value::from(serde_json::json!({ "ids": ["1", "2"] })));
}

#[test]
fn nested_loops_with_index() {
    let template = serde_json::json!({
        "$for g in groups": {
            "name": "${g.name}",
            "items": { "$for it, i in g.items": { "k": "${i}-${it.id}" } }
        }
    });
    let data = serde_json::json!({
        "groups": [ { "name": "A", "items": [ { "id": "x" }, { "id": "y" } ] } ]
    });
    let out = run(template, data);
    assert_eq!(
        out,
        Value::from(serde_json::json!([
            { "name": "A", "items": [ { "k": "0-x" }, { "k": "1-y" } ] }
        ]))
    );
}

#[test]
fn when_gating() {
    let out = run(
        serde_json::json!({
            "a": 1,
            "b": { "$when": "show", "v": "${x}" }
        }),
        serde_json::json!({ "show": false, "x": 9 }),
    );
    assert_eq!(out, Value::from(serde_json::json!({ "a": 1 })));
}

#[test]
fn partial_expansion_with_cycle_detection() {
    let partial_ast = parse(
        &Value::from(serde_json::json!({ "$partial": "p" })),
        None,
    )
    .unwrap();
    let mut partials = HashMap::new();
    partials.insert("p".to_string(), partial_ast);

    let ast = parse(&Value::from(serde_json::json!({ "$partial": "p" })), None).unwrap();
    let result = render(
        &ast,
        &Value::Null,
        RenderOptions {
            functions: None,
            partials: Some(&partials),
        },
    );

    assert!(matches!(result, Err(jtpl::RenderError::PartialCycle(name)) if name == "p"));
}
