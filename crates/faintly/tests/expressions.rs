/*
 * expressions.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Expression resolution properties.
 */

use faintly::{
    Context, EvalError, Function, Value, resolve_expression, resolve_expressions,
    unwrap_expression,
};
use pollster::block_on;
use pretty_assertions::assert_eq;
use serde_json::json;

fn sample_values() -> Vec<Value> {
    vec![
        Value::Null,
        Value::Bool(false),
        Value::from(0),
        Value::from(-1.5),
        Value::from(""),
        Value::from("text"),
        Value::array([Value::from(1), Value::from("two")]),
        Value::object([("nested", Value::from(true))]),
    ]
}

#[test]
fn dotted_path_returns_the_stored_value() {
    for v in sample_values() {
        let ctx = Context::new().with("a", Value::object([("b", v.clone())]));
        assert_eq!(block_on(resolve_expression("a.b", &ctx)).unwrap(), v);
        let wrapped = unwrap_expression("${ a.b }");
        assert_eq!(block_on(resolve_expression(wrapped, &ctx)).unwrap(), v);
    }
}

#[test]
fn missing_intermediates_resolve_to_undefined() {
    let contexts = [
        Context::new(),
        Context::from_json(json!({"a": null})),
        Context::from_json(json!({"a": {}})),
        Context::from_json(json!({"a": 5})),
        Context::from_json(json!({"a": "str"})),
    ];
    for ctx in &contexts {
        let value = block_on(resolve_expression("a.b.c.d", ctx)).unwrap();
        assert!(value.is_undefined(), "{ctx:?}");
    }
}

#[test]
fn text_without_placeholders_is_unchanged() {
    let ctx = Context::new();
    for text in ["", "plain", "$ {x}", "{x}", "$x", "${}"] {
        let resolved = block_on(resolve_expressions(text, &ctx)).unwrap();
        assert!(!resolved.updated, "{text}");
        assert_eq!(resolved.text, text);
    }
}

#[test]
fn only_escaped_placeholders_are_kept_literally() {
    let ctx = Context::new().with("x", "resolved");
    let resolved = block_on(resolve_expressions(r"a \${x} b \${ y.z }", &ctx)).unwrap();
    assert!(resolved.updated);
    assert_eq!(resolved.text, "a ${x} b ${ y.z }");
}

#[test]
fn functions_are_called_with_the_context() {
    let ctx = Context::new()
        .with("first", "Ada")
        .with(
            "fullName",
            Function::new(|_this, args| {
                let ctx = args.first().cloned().unwrap_or_default();
                Ok(Value::from(format!("{} Lovelace", ctx.get("first"))))
            }),
        )
        .with(
            "lazy",
            Function::new_async(|_this, _args| async {
                Ok(Value::array([Value::from("x"), Value::from("y")]))
            }),
        );

    let resolved = block_on(resolve_expressions("${fullName} ${lazy.length} ${lazy.1}", &ctx))
        .unwrap();
    assert_eq!(resolved.text, "Ada Lovelace 2 y");
}

#[test]
fn eval_errors_propagate_and_paths_do_not() {
    let ctx = Context::new();
    assert!(block_on(resolve_expression("not.there", &ctx)).is_ok());
    assert_eq!(
        block_on(resolve_expression("utils:eval(not.there)", &ctx)),
        Err(EvalError::Reference("not".to_string()))
    );
}

#[test]
fn unwrap_accepts_both_forms() {
    assert_eq!(unwrap_expression("card.title"), "card.title");
    assert_eq!(unwrap_expression("${card.title}"), "card.title");
    assert_eq!(unwrap_expression("\t${ card.title }\n"), "card.title");
}
