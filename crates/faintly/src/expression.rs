/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression resolution.
//!
//! Two forms are understood:
//!
//! - a dotted path (`card.title`) looked up through the context, calling and
//!   awaiting any function met along the way
//! - `utils:eval(<code>)`, handed to the context's unsafe evaluator
//!
//! Strings embed expressions as `${expr}` placeholders; `\${expr}` is the
//! literal form.

use crate::context::Context;
use crate::error::EvalError;
use crate::value::Value;
use faintly_dom::Node;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\\)?\$\{([^}]+)\}").expect("placeholder pattern is a valid regex")
});

const EVAL_PREFIX: &str = "utils:eval(";

/// Outcome of [`resolve_expressions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Whether any placeholder was found.
    pub updated: bool,
    /// The text with placeholders substituted.
    pub text: String,
}

/// Strip one optional `${ }` wrapper, trimming inside and out.
///
/// ```rust
/// use faintly::unwrap_expression;
///
/// assert_eq!(unwrap_expression(" ${ card.title } "), "card.title");
/// assert_eq!(unwrap_expression("card.title"), "card.title");
/// ```
pub fn unwrap_expression(expr: &str) -> &str {
    let trimmed = expr.trim();
    match trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(inner) => inner.trim(),
        None => expr,
    }
}

/// The code of a `utils:eval(...)` expression, if `expr` is one.
fn eval_code(expr: &str) -> Option<&str> {
    expr.strip_prefix(EVAL_PREFIX)?.strip_suffix(')')
}

/// Resolve an expression against the context.
///
/// Path lookups never fail: a missing member yields `undefined`, and so does
/// any lookup through `undefined` or `null`. Errors come only from
/// `utils:eval` code and from context functions.
pub async fn resolve_expression(expr: &str, ctx: &Context) -> Result<Value, EvalError> {
    let trimmed = expr.trim();
    if let Some(code) = eval_code(trimmed) {
        return ctx.evaluate(code).await;
    }

    let mut holder: Option<Value> = None;
    let mut resolved = Value::Undefined;
    for part in trimmed.split('.') {
        let current = match &holder {
            None => ctx.get(part),
            Some(Value::Undefined) => break,
            Some(Value::Null) => {
                resolved = Value::Undefined;
                break;
            }
            Some(value) => value.get(part),
        };

        resolved = match current {
            Value::Function(f) => {
                let this = holder.clone().unwrap_or_else(|| ctx.to_value());
                f.call(&this, vec![ctx.to_value()]).await?
            }
            other => other,
        };
        holder = Some(resolved.clone());
    }

    Ok(resolved)
}

/// Substitute every `${expr}` placeholder in `text`.
///
/// Unescaped placeholders are resolved concurrently; results are written back
/// at the position of the placeholder they came from. An escaped placeholder
/// loses its backslash and is otherwise kept as is.
pub async fn resolve_expressions(text: &str, ctx: &Context) -> Result<Resolved, EvalError> {
    let matches: Vec<_> = PLACEHOLDER.captures_iter(text).collect();
    if matches.is_empty() {
        return Ok(Resolved {
            updated: false,
            text: text.to_string(),
        });
    }

    let replacements = join_all(matches.iter().map(|caps| async move {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        if caps.get(1).is_some() {
            return Ok(whole[1..].to_string());
        }
        let expr = caps.get(2).map_or("", |m| m.as_str());
        resolve_expression(expr.trim(), ctx)
            .await
            .map(|value| value.to_string())
    }))
    .await;

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (caps, replacement) in matches.iter().zip(replacements) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replacement?);
        last = whole.end();
    }
    out.push_str(&text[last..]);

    Ok(Resolved {
        updated: true,
        text: out,
    })
}

/// Resolve the placeholders of a text node in place.
pub async fn process_text_expressions(node: &Node, ctx: &Context) -> Result<(), EvalError> {
    let resolved = resolve_expressions(&node.text_content(), ctx).await?;
    if resolved.updated {
        node.set_text_content(resolved.text);
    }
    Ok(())
}
