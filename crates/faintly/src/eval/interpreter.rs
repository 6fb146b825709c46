/*
 * interpreter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tree-walking evaluation of parsed `utils:eval` expressions.
//!
//! Identifiers resolve through arrow-function parameters first, then the
//! render context, then the globals in [`super::builtins`]. Evaluation is
//! async so that context functions returning futures can be awaited in the
//! middle of an expression.

use super::ast::{BinaryOp, Expr, Literal, LogicalOp, Property, UnaryOp};
use super::builtins;
use super::parser::parse;
use crate::context::Context;
use crate::error::EvalError;
use crate::value::{Function, Object, Value};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cmp::Ordering;
use std::rc::Rc;

struct Frame {
    bindings: Vec<(String, Value)>,
    parent: Option<Rc<Frame>>,
}

#[derive(Clone)]
pub(crate) struct Scope {
    context: Rc<Context>,
    frame: Option<Rc<Frame>>,
}

impl Scope {
    pub(crate) fn new(context: Context) -> Self {
        Self {
            context: Rc::new(context),
            frame: None,
        }
    }

    fn child(&self, bindings: Vec<(String, Value)>) -> Self {
        Self {
            context: Rc::clone(&self.context),
            frame: Some(Rc::new(Frame {
                bindings,
                parent: self.frame.clone(),
            })),
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            if let Some((_, value)) = current.bindings.iter().find(|(n, _)| n == name) {
                return Some(value.clone());
            }
            frame = current.parent.as_deref();
        }
        if self.context.contains(name) {
            return Some(self.context.get(name));
        }
        builtins::global(name)
    }
}

/// Parse and evaluate `code` against `ctx`. Empty code yields `undefined`.
pub(crate) async fn evaluate_source(code: &str, ctx: &Context) -> Result<Value, EvalError> {
    let Some(expr) = parse(code)? else {
        return Ok(Value::Undefined);
    };
    let scope = Scope::new(ctx.clone());
    evaluate(&expr, &scope).await
}

pub(crate) fn evaluate<'a>(
    expr: &'a Expr,
    scope: &'a Scope,
) -> LocalBoxFuture<'a, Result<Value, EvalError>> {
    async move {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),
            Expr::Ident(name) => scope
                .lookup(name)
                .ok_or_else(|| EvalError::Reference(name.clone())),
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(evaluate(item, scope).await?);
                }
                Ok(Value::from(out))
            }
            Expr::Object(members) => {
                let mut map = Object::with_capacity(members.len());
                for (key, value) in members {
                    map.insert(key.clone(), evaluate(value, scope).await?);
                }
                Ok(Value::from(map))
            }
            Expr::Unary { op, operand } => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, operand.as_ref()) {
                    let value = scope.lookup(name).unwrap_or_default();
                    return Ok(Value::from(value.type_of()));
                }
                let value = evaluate(operand, scope).await?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::from(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = evaluate(left, scope).await?;
                let right = evaluate(right, scope).await?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = evaluate(left, scope).await?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    evaluate(right, scope).await
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if evaluate(test, scope).await?.is_truthy() {
                    evaluate(consequent, scope).await
                } else {
                    evaluate(alternate, scope).await
                }
            }
            Expr::Member { .. } | Expr::Call { .. } => {
                Ok(evaluate_chain(expr, scope).await?.unwrap_or_default())
            }
            Expr::Arrow { params, body } => Ok(closure(params, body, scope)),
        }
    }
    .boxed_local()
}

/// Evaluate a member or call chain. `None` means an optional link
/// short-circuited the whole chain.
fn evaluate_chain<'a>(
    expr: &'a Expr,
    scope: &'a Scope,
) -> LocalBoxFuture<'a, Result<Option<Value>, EvalError>> {
    async move {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = evaluate_chain(object, scope).await? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = property_key(property, scope).await?;
                get_property(&target, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let (this, function) = match callee.as_ref() {
                    Expr::Member {
                        object,
                        property,
                        optional: member_optional,
                    } => {
                        let Some(target) = evaluate_chain(object, scope).await? else {
                            return Ok(None);
                        };
                        if *member_optional && target.is_nullish() {
                            return Ok(None);
                        }
                        let key = property_key(property, scope).await?;
                        let function = get_property(&target, &key)?;
                        (target, function)
                    }
                    other => {
                        let Some(function) = evaluate_chain(other, scope).await? else {
                            return Ok(None);
                        };
                        (Value::Undefined, function)
                    }
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }

                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(evaluate(arg, scope).await?);
                }

                match function {
                    Value::Function(f) => f.call(&this, values).await.map(Some),
                    _ => Err(EvalError::Type(format!(
                        "{} is not a function",
                        callee_name(callee)
                    ))),
                }
            }
            other => evaluate(other, scope).await.map(Some),
        }
    }
    .boxed_local()
}

async fn property_key(property: &Property, scope: &Scope) -> Result<String, EvalError> {
    match property {
        Property::Named(name) => Ok(name.clone()),
        Property::Computed(expr) => Ok(evaluate(expr, scope).await?.to_string()),
    }
}

fn get_property(target: &Value, key: &str) -> Result<Value, EvalError> {
    if target.is_nullish() {
        return Err(EvalError::Type(format!(
            "Cannot read properties of {target} (reading '{key}')"
        )));
    }
    if let Some(method) = builtins::method(target, key) {
        return Ok(Value::Function(method));
    }
    Ok(target.get(key))
}

/// Source-like rendering of a callee for error messages.
fn callee_name(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => match property {
            Property::Named(name) => format!("{}.{name}", callee_name(object)),
            Property::Computed(_) => format!("{}[...]", callee_name(object)),
        },
        Expr::Call { callee, .. } => format!("{}(...)", callee_name(callee)),
        _ => "expression".to_string(),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::from(s.as_str()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
        Literal::Undefined => Value::Undefined,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let number = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    let ordering = |accept: fn(Ordering) -> bool| {
        Value::Bool(builtins::compare(left, right).is_some_and(accept))
    };

    match op {
        BinaryOp::Add if !left.is_primitive() || !right.is_primitive() => {
            Value::from(format!("{left}{right}"))
        }
        BinaryOp::Add if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
            Value::from(format!("{left}{right}"))
        }
        BinaryOp::Add => number(|a, b| a + b),
        BinaryOp::Sub => number(|a, b| a - b),
        BinaryOp::Mul => number(|a, b| a * b),
        BinaryOp::Div => number(|a, b| a / b),
        BinaryOp::Rem => number(|a, b| a % b),
        BinaryOp::Lt => ordering(|o| o == Ordering::Less),
        BinaryOp::Gt => ordering(|o| o == Ordering::Greater),
        BinaryOp::Le => ordering(|o| o != Ordering::Greater),
        BinaryOp::Ge => ordering(|o| o != Ordering::Less),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
    }
}

fn closure(params: &[String], body: &Rc<Expr>, scope: &Scope) -> Value {
    let params = params.to_vec();
    let body = Rc::clone(body);
    let scope = scope.clone();
    Value::Function(Function::new_async(move |_this, args| {
        let mut args = args.into_iter();
        let bindings = params
            .iter()
            .map(|name| (name.clone(), args.next().unwrap_or_default()))
            .collect();
        let frame = scope.child(bindings);
        let body = Rc::clone(&body);
        async move { evaluate(&body, &frame).await }
    }))
}
