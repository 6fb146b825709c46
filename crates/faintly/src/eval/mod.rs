/*
 * eval/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `utils:eval` support.
//!
//! The evaluator behind `utils:eval(<code>)` is pluggable through
//! [`UnsafeEvaluator`]. The built-in [`ScriptEvaluator`] understands a
//! script expression subset: literals, arithmetic, comparison and logical
//! operators, the conditional operator, member access with optional
//! chaining, calls, arrow functions, and a handful of globals and primitive
//! methods. Identifiers resolve against the render context.

mod ast;
mod builtins;
mod interpreter;
mod lexer;
mod parser;

use crate::context::Context;
use crate::error::EvalError;
use crate::value::Value;
use async_trait::async_trait;

/// Evaluates the code of `utils:eval(...)` expressions.
#[async_trait(?Send)]
pub trait UnsafeEvaluator {
    async fn evaluate(&self, code: &str, ctx: &Context) -> Result<Value, EvalError>;
}

/// The built-in expression evaluator.
///
/// ```rust
/// use faintly::{Context, ScriptEvaluator, UnsafeEvaluator, Value};
///
/// let ctx = Context::new().with("price", 4).with("qty", 3);
/// let total = pollster::block_on(ScriptEvaluator.evaluate("price * qty", &ctx)).unwrap();
/// assert_eq!(total, Value::from(12));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEvaluator;

#[async_trait(?Send)]
impl UnsafeEvaluator for ScriptEvaluator {
    async fn evaluate(&self, code: &str, ctx: &Context) -> Result<Value, EvalError> {
        interpreter::evaluate_source(code, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    struct Echo;

    #[async_trait(?Send)]
    impl UnsafeEvaluator for Echo {
        async fn evaluate(&self, code: &str, _ctx: &Context) -> Result<Value, EvalError> {
            Ok(Value::from(format!("echo:{code}")))
        }
    }

    #[test]
    fn test_custom_evaluator_replaces_builtin() {
        let ctx = Context::new().with_evaluator(Echo);
        let value = block_on(ctx.evaluate("1 + 1")).unwrap();
        assert_eq!(value, Value::from("echo:1 + 1"));
    }

    #[test]
    fn test_disabled_evaluation() {
        let ctx = Context::new().without_unsafe_eval();
        let err = block_on(ctx.evaluate(" 1 + 1 ")).unwrap_err();
        assert_eq!(err, EvalError::Disabled("1 + 1".to_string()));
    }

    #[test]
    fn test_builtin_evaluator_sees_metadata() {
        let ctx = Context::new().with_block_name("cards");
        let value = block_on(ScriptEvaluator.evaluate("blockName + '!'", &ctx)).unwrap();
        assert_eq!(value, Value::from("cards!"));
    }
}
