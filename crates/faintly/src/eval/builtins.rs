/*
 * builtins.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Global functions and primitive methods available to `utils:eval` code.

use crate::error::EvalError;
use crate::value::{CallResult, Function, Value, format_number};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("float prefix pattern is a valid regex")
});

const STRING_METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "trim",
    "trimStart",
    "trimEnd",
    "substring",
    "slice",
    "includes",
    "startsWith",
    "endsWith",
    "indexOf",
    "split",
    "replace",
    "replaceAll",
    "padStart",
    "padEnd",
    "repeat",
    "charAt",
    "toString",
];

const ARRAY_METHODS: &[&str] = &[
    "join", "map", "filter", "find", "findIndex", "some", "every", "forEach", "includes",
    "indexOf", "slice", "concat", "toString",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

/// A global binding, if `name` is one.
pub(crate) fn global(name: &str) -> Option<Value> {
    let function = match name {
        "NaN" => return Some(Value::Number(f64::NAN)),
        "Infinity" => return Some(Value::Number(f64::INFINITY)),
        "Math" => return Some(math()),
        "encodeURIComponent" => {
            Function::new(|_, args| Ok(Value::from(encode_uri_component(&arg_string(args, 0)))))
        }
        "decodeURIComponent" => {
            Function::new(|_, args| decode_uri_component(&arg_string(args, 0)).map(Value::from))
        }
        "parseInt" => Function::new(|_, args| {
            let radix = args.get(1).map(Value::to_number).unwrap_or(f64::NAN);
            let radix = (radix.is_finite() && radix.trunc() != 0.0).then(|| radix.trunc() as i64);
            Ok(Value::Number(parse_int(&arg_string(args, 0), radix)))
        }),
        "parseFloat" => Function::new(|_, args| Ok(Value::Number(parse_float(&arg_string(args, 0))))),
        "String" => Function::new(|_, args| {
            Ok(Value::from(args.first().map(Value::to_string).unwrap_or_default()))
        }),
        "Number" => Function::new(|_, args| {
            Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
        }),
        "Boolean" => Function::new(|_, args| {
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        }),
        "isNaN" => Function::new(|_, args| {
            Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
        }),
        _ => return None,
    };
    Some(Value::Function(function))
}

fn math() -> Value {
    let unary = |f: fn(f64) -> f64| {
        Value::Function(Function::new(move |_, args| {
            Ok(Value::Number(f(arg(args, 0).to_number())))
        }))
    };

    Value::object([
        ("PI", Value::Number(std::f64::consts::PI)),
        ("floor", unary(f64::floor)),
        ("ceil", unary(f64::ceil)),
        ("abs", unary(f64::abs)),
        ("round", unary(|x| (x + 0.5).floor())),
        (
            "min",
            Value::Function(Function::new(|_, args| {
                Ok(Value::Number(fold_numbers(args, f64::INFINITY, f64::min)))
            })),
        ),
        (
            "max",
            Value::Function(Function::new(|_, args| {
                Ok(Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)))
            })),
        ),
    ])
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn arg_string(args: &[Value], index: usize) -> String {
    arg(args, index).to_string()
}

/// Longest string the string methods will build, in characters.
const MAX_STRING_LENGTH: f64 = ((1u64 << 29) - 24) as f64;

fn invalid_string_length() -> EvalError {
    EvalError::Thrown("RangeError: Invalid string length".to_string())
}

/// Integer argument with script coercion (NaN becomes 0).
fn arg_integer(args: &[Value], index: usize) -> Option<f64> {
    let value = args.get(index)?;
    if value.is_undefined() {
        return None;
    }
    let n = value.to_number();
    Some(if n.is_nan() { 0.0 } else { n.trunc() })
}

pub(crate) fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        let c = byte as char;
        if c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c) {
            out.push(c);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

pub(crate) fn decode_uri_component(input: &str) -> Result<String, EvalError> {
    let malformed = || EvalError::Thrown("URIError: URI malformed".to_string());
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3).ok_or_else(malformed)?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| malformed())?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| malformed())
}

pub(crate) fn parse_int(input: &str, radix: Option<i64>) -> f64 {
    let s = input.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let has_hex_prefix = s.starts_with("0x") || s.starts_with("0X");
    let (radix, digits) = match radix {
        None if has_hex_prefix => (16, &s[2..]),
        Some(16) if has_hex_prefix => (16, &s[2..]),
        None => (10, s),
        Some(r) if (2..=36).contains(&r) => (r as u32, s),
        Some(_) => return f64::NAN,
    };

    let mut value: Option<f64> = None;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = Some(value.unwrap_or(0.0) * f64::from(radix) + f64::from(d));
    }

    match value {
        Some(v) if negative => -v,
        Some(v) => v,
        None => f64::NAN,
    }
}

pub(crate) fn parse_float(input: &str) -> f64 {
    let Some(m) = FLOAT_PREFIX.find(input.trim_start()) else {
        return f64::NAN;
    };
    match m.as_str().trim_start_matches('+') {
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        text => text.parse().unwrap_or(f64::NAN),
    }
}

/// A primitive's method bound for calling, if `target` has one named `name`.
///
/// Methods are looked up before own properties only on strings, arrays,
/// numbers and booleans; objects always use their own members.
pub(crate) fn method(target: &Value, name: &str) -> Option<Function> {
    let known = match target {
        Value::String(_) => STRING_METHODS.contains(&name),
        Value::Array(_) => ARRAY_METHODS.contains(&name),
        Value::Number(_) => NUMBER_METHODS.contains(&name),
        Value::Bool(_) => name == "toString",
        _ => false,
    };
    if !known {
        return None;
    }

    let name = name.to_string();
    Some(Function::new_async(move |this, args| {
        let name = name.clone();
        async move { call_method(&this, &name, args).await }
    }))
}

async fn call_method(this: &Value, name: &str, args: Vec<Value>) -> CallResult {
    match this {
        Value::String(s) => string_method(s, name, &args).await,
        Value::Array(items) => array_method(this, items, name, &args).await,
        Value::Number(n) => number_method(*n, name, &args),
        Value::Bool(b) => Ok(Value::from(b.to_string())),
        other => Err(EvalError::Type(format!(
            "{name} is not a function on {}",
            other.type_of()
        ))),
    }
}

/// Resolve a relative index (negative counts from the end) into `0..=len`.
fn relative_index(n: f64, len: usize) -> usize {
    let len_f = len as f64;
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

async fn invoke(callback: &Value, args: Vec<Value>) -> CallResult {
    match callback {
        Value::Function(f) => f.call(&Value::Undefined, args).await,
        other => Err(EvalError::Type(format!("{other} is not a function"))),
    }
}

async fn string_method(s: &str, name: &str, args: &[Value]) -> CallResult {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let substring = |start: usize, end: usize| -> String { chars[start..end].iter().collect() };
    let char_index = |byte: usize| s[..byte].chars().count();

    let result = match name {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "trimStart" => Value::from(s.trim_start()),
        "trimEnd" => Value::from(s.trim_end()),
        "toString" => Value::from(s),
        "charAt" => {
            let i = arg_integer(args, 0).unwrap_or(0.0);
            let c = (i >= 0.0)
                .then(|| chars.get(i as usize))
                .flatten()
                .map(char::to_string)
                .unwrap_or_default();
            Value::from(c)
        }
        "substring" => {
            let clamp = |n: f64| n.clamp(0.0, len as f64) as usize;
            let start = clamp(arg_integer(args, 0).unwrap_or(0.0));
            let end = clamp(arg_integer(args, 1).unwrap_or(len as f64));
            Value::from(substring(start.min(end), start.max(end)))
        }
        "slice" => {
            let start = relative_index(arg_integer(args, 0).unwrap_or(0.0), len);
            let end = relative_index(arg_integer(args, 1).unwrap_or(len as f64), len);
            Value::from(if start < end {
                substring(start, end)
            } else {
                String::new()
            })
        }
        "includes" => Value::Bool(s.contains(arg_string(args, 0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(arg_string(args, 0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(arg_string(args, 0).as_str())),
        "indexOf" => {
            let found = s.find(arg_string(args, 0).as_str()).map(char_index);
            Value::Number(found.map_or(-1.0, |i| i as f64))
        }
        "split" => match args.first() {
            None | Some(Value::Undefined) => Value::array([Value::from(s)]),
            Some(sep) => {
                let sep = sep.to_string();
                if sep.is_empty() {
                    Value::array(chars.iter().map(|c| Value::from(c.to_string())))
                } else {
                    Value::array(s.split(sep.as_str()).map(Value::from))
                }
            }
        },
        "replace" | "replaceAll" => {
            let pattern = arg_string(args, 0);
            let replacement = arg(args, 1);
            let all = name == "replaceAll";
            let mut out = String::new();
            let mut rest = s;
            let mut consumed = 0;
            while let Some(found) = rest.find(pattern.as_str()) {
                out.push_str(&rest[..found]);
                let substituted = match &replacement {
                    Value::Function(_) => invoke(
                        &replacement,
                        vec![
                            Value::from(pattern.as_str()),
                            Value::from(char_index(consumed + found)),
                            Value::from(s),
                        ],
                    )
                    .await?
                    .to_string(),
                    other => other.to_string(),
                };
                out.push_str(&substituted);
                let skip = found + pattern.len();
                consumed += skip;
                rest = &rest[skip..];
                if !all {
                    break;
                }
                if pattern.is_empty() {
                    // Step past one character so an empty pattern terminates
                    let Some(c) = rest.chars().next() else {
                        break;
                    };
                    out.push(c);
                    consumed += c.len_utf8();
                    rest = &rest[c.len_utf8()..];
                }
            }
            out.push_str(rest);
            Value::from(out)
        }
        "padStart" | "padEnd" => {
            let target = arg_integer(args, 0).unwrap_or(0.0).max(0.0);
            let fill = match args.get(1) {
                None | Some(Value::Undefined) => " ".to_string(),
                Some(v) => v.to_string(),
            };
            if target <= len as f64 || fill.is_empty() {
                Value::from(s)
            } else if target > MAX_STRING_LENGTH {
                return Err(invalid_string_length());
            } else {
                let target = target as usize;
                let padding: String = fill.chars().cycle().take(target - len).collect();
                Value::from(if name == "padStart" {
                    format!("{padding}{s}")
                } else {
                    format!("{s}{padding}")
                })
            }
        }
        "repeat" => {
            let count = arg_integer(args, 0).unwrap_or(0.0);
            if count < 0.0 || count.is_infinite() {
                return Err(EvalError::Thrown(format!(
                    "RangeError: Invalid count value: {}",
                    format_number(count)
                )));
            }
            if len > 0 && count * len as f64 > MAX_STRING_LENGTH {
                return Err(invalid_string_length());
            }
            Value::from(if len == 0 { String::new() } else { s.repeat(count as usize) })
        }
        _ => return Err(EvalError::Type(format!("{name} is not a function"))),
    };
    Ok(result)
}

async fn array_method(this: &Value, items: &[Value], name: &str, args: &[Value]) -> CallResult {
    let callback = arg(args, 0);
    let call_with = |item: &Value, i: usize| vec![item.clone(), Value::from(i), this.clone()];

    let result = match name {
        "join" | "toString" => {
            let sep = match args.first() {
                Some(v) if name == "join" && !v.is_undefined() => v.to_string(),
                _ => ",".to_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                .collect();
            Value::from(parts.join(&sep))
        }
        "map" => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(invoke(&callback, call_with(item, i)).await?);
            }
            Value::from(out)
        }
        "filter" => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if invoke(&callback, call_with(item, i)).await?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Value::from(out)
        }
        "find" | "findIndex" => {
            let mut found = None;
            for (i, item) in items.iter().enumerate() {
                if invoke(&callback, call_with(item, i)).await?.is_truthy() {
                    found = Some((i, item.clone()));
                    break;
                }
            }
            match (name, found) {
                ("find", Some((_, item))) => item,
                ("find", None) => Value::Undefined,
                (_, Some((i, _))) => Value::from(i),
                (_, None) => Value::Number(-1.0),
            }
        }
        "some" => {
            let mut any = false;
            for (i, item) in items.iter().enumerate() {
                if invoke(&callback, call_with(item, i)).await?.is_truthy() {
                    any = true;
                    break;
                }
            }
            Value::Bool(any)
        }
        "every" => {
            let mut all = true;
            for (i, item) in items.iter().enumerate() {
                if !invoke(&callback, call_with(item, i)).await?.is_truthy() {
                    all = false;
                    break;
                }
            }
            Value::Bool(all)
        }
        "forEach" => {
            for (i, item) in items.iter().enumerate() {
                invoke(&callback, call_with(item, i)).await?;
            }
            Value::Undefined
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.iter().any(|item| same_value_zero(item, &needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let index = items.iter().position(|item| item.strict_equals(&needle));
            Value::Number(index.map_or(-1.0, |i| i as f64))
        }
        "slice" => {
            let start = relative_index(arg_integer(args, 0).unwrap_or(0.0), items.len());
            let end = relative_index(
                arg_integer(args, 1).unwrap_or(items.len() as f64),
                items.len(),
            );
            Value::array(items.get(start..end.max(start)).unwrap_or_default().iter().cloned())
        }
        "concat" => {
            let mut out = items.to_vec();
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::from(out)
        }
        _ => return Err(EvalError::Type(format!("{name} is not a function"))),
    };
    Ok(result)
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn number_method(n: f64, name: &str, args: &[Value]) -> CallResult {
    match name {
        "toFixed" => {
            let digits = arg_integer(args, 0).unwrap_or(0.0);
            if !(0.0..=100.0).contains(&digits) {
                return Err(EvalError::Thrown(
                    "RangeError: toFixed() digits argument must be between 0 and 100".to_string(),
                ));
            }
            if !n.is_finite() || n.abs() >= 1e21 {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(format!("{n:.*}", digits as usize)))
        }
        "toString" => {
            let radix = arg_integer(args, 0).unwrap_or(10.0);
            if !(2.0..=36.0).contains(&radix) {
                return Err(EvalError::Thrown(
                    "RangeError: toString() radix must be between 2 and 36".to_string(),
                ));
            }
            if radix == 10.0 || n.fract() != 0.0 || !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(integer_to_radix(n, radix as u32)))
        }
        _ => Err(EvalError::Type(format!("{name} is not a function"))),
    }
}

fn integer_to_radix(n: f64, radix: u32) -> String {
    let negative = n < 0.0;
    let mut value = n.abs();
    let mut digits = Vec::new();
    while value >= 1.0 {
        let d = (value % f64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        value = (value / f64::from(radix)).floor();
    }
    if digits.is_empty() {
        digits.push('0');
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// Relational comparison: strings compare by code point, everything else
/// numerically. `None` when either side is NaN.
pub(crate) fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let stringish = |v: &Value| !matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_));
    if stringish(left) && stringish(right) {
        return Some(left.to_string().cmp(&right.to_string()));
    }
    left.to_number().partial_cmp(&right.to_number())
}
