/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dynamically typed values held in a render context.
//!
//! Values follow JavaScript semantics wherever the template language exposes
//! them: truthiness, string conversion (`${}` substitution), numeric coercion
//! and enumeration (`data-fly-repeat`, `data-fly-attributes`). Arrays and
//! objects are reference-counted, so copying a context copies handles rather
//! than data.

use crate::error::EvalError;
use faintly_dom::Node;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Insertion-ordered property map of an object value.
pub type Object = IndexMap<String, Value>;

/// A value that can be stored in a context and produced by expressions.
#[derive(Clone, Default)]
pub enum Value {
    /// The value of a missing path.
    #[default]
    Undefined,

    Null,

    Bool(bool),

    Number(f64),

    String(String),

    Array(Rc<Vec<Value>>),

    Object(Rc<Object>),

    /// A callable, invoked during path resolution and by `utils:eval` code.
    Function(Function),

    /// A DOM node, inserted as-is by `data-fly-content`.
    Node(Node),
}

impl Value {
    /// Build an array value.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(items.into_iter().collect()))
    }

    /// Build an object value from key/value pairs, keeping their order.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `undefined` or `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Falsy values are `undefined`, `null`, `false`, `0`, `NaN` and `''`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Node(_) => true,
        }
    }

    /// The `typeof` name of this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Node(_) => "object",
        }
    }

    /// Numeric coercion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_numeric_string(s),
            Value::Array(_) => parse_numeric_string(&self.to_string()),
            Value::Object(_) | Value::Function(_) | Value::Node(_) => f64::NAN,
        }
    }

    /// Property lookup.
    ///
    /// Objects yield their entries, arrays and strings their indexed members
    /// and `length`, nodes a few read-only DOM properties. Anything else is
    /// `undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.get(key).cloned().unwrap_or_default(),
            Value::Array(items) => {
                if key == "length" {
                    return Value::Number(items.len() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }
            Value::String(s) => {
                if key == "length" {
                    return Value::Number(s.chars().count() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or_default()
            }
            Value::Node(node) => match key {
                "textContent" => Value::String(node.text_content()),
                "innerHTML" => Value::String(node.inner_html()),
                "outerHTML" => Value::String(node.outer_html()),
                "tagName" => node
                    .tag_name()
                    .map(|t| Value::String(t.to_ascii_uppercase()))
                    .unwrap_or_default(),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    /// Key/value pairs in enumeration order.
    ///
    /// Arrays enumerate with their index as a string key, strings as their
    /// characters. Other values have no entries.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            Value::String(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (i.to_string(), Value::String(c.to_string())))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `===` comparison: primitives by value, everything else by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==` comparison.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (a, b) if a.is_primitive() != b.is_primitive() => a.to_string() == b.to_string(),
            _ => self.strict_equals(other),
        }
    }

    /// Whether this value is not an array, object, function or node.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }
}

/// Convert a string to a number the way `Number("...")` does.
fn parse_numeric_string(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust accepts "inf"/"nan" spellings that JavaScript does not
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Format a number as JavaScript prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    format!("{n}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(_) => f.write_str("function () { [native code] }"),
            Value::Node(node) => match node.tag_name() {
                Some(_) => f.write_str("[object HTMLElement]"),
                None => f.write_str("[object Node]"),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Function(_) => f.write_str("Function"),
            Value::Node(node) => write!(f, "Node({})", node.outer_html()),
        }
    }
}

/// Structural equality, used by tests and assertions. Script `===` is
/// [`Value::strict_equals`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => self.strict_equals(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(Rc::new(map))
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from))
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

/// Result of calling a [`Function`].
pub type CallResult = Result<Value, EvalError>;

type SyncCallable = dyn Fn(&Value, &[Value]) -> CallResult;
type AsyncCallable = dyn Fn(Value, Vec<Value>) -> LocalBoxFuture<'static, CallResult>;

enum Callable {
    Sync(Box<SyncCallable>),
    Async(Box<AsyncCallable>),
}

/// A callable value.
///
/// Functions receive a receiver (`this`) and an argument list. During path
/// resolution the receiver is the object holding the function and the only
/// argument is a copy of the render context.
///
/// ```rust
/// use faintly::{Function, Value};
///
/// let greet = Function::new(|_this, args| {
///     let ctx = args.first().cloned().unwrap_or_default();
///     Ok(Value::from(format!("Hello, {}!", ctx.get("name"))))
/// });
/// # let _ = greet;
/// ```
#[derive(Clone)]
pub struct Function(Rc<Callable>);

impl Function {
    /// Wrap a synchronous closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> CallResult + 'static,
    {
        Function(Rc::new(Callable::Sync(Box::new(f))))
    }

    /// Wrap a closure returning a future. The resolver awaits it before
    /// continuing.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = CallResult> + 'static,
    {
        Function(Rc::new(Callable::Async(Box::new(move |this, args| {
            f(this, args).boxed_local()
        }))))
    }

    pub fn is_async(&self) -> bool {
        matches!(*self.0, Callable::Async(_))
    }

    /// Call the function and await its result.
    pub async fn call(&self, this: &Value, args: Vec<Value>) -> CallResult {
        match &*self.0 {
            Callable::Sync(f) => f(this, &args),
            Callable::Async(f) => f(this.clone(), args).await,
        }
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_async() {
            "Function(async)"
        } else {
            "Function"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for falsy in [
            Value::Undefined,
            Value::Null,
            Value::Bool(false),
            Value::Number(0.0),
            Value::Number(f64::NAN),
            Value::from(""),
        ] {
            assert!(!falsy.is_truthy(), "{falsy:?} should be falsy");
        }
        for truthy in [
            Value::from(42),
            Value::from("x"),
            Value::Bool(true),
            Value::array([]),
            Value::object::<String>([]),
        ] {
            assert!(truthy.is_truthy(), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn test_display_matches_script_strings() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
        assert_eq!(Value::Number(1e21).to_string(), "1e+21");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::array([Value::from(1), Value::Null, Value::from("a")]).to_string(),
            "1,,a"
        );
        assert_eq!(
            Value::object([("a", Value::from(1))]).to_string(),
            "[object Object]"
        );
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::from("0x1f").to_number(), 31.0);
        assert!(Value::from("inf").to_number().is_nan());
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
    }

    #[test]
    fn test_get_on_arrays_and_strings() {
        let arr = Value::array([Value::from("a"), Value::from("b")]);
        assert_eq!(arr.get("1"), Value::from("b"));
        assert_eq!(arr.get("length"), Value::from(2));
        assert_eq!(arr.get("5"), Value::Undefined);

        let s = Value::from("héllo");
        assert_eq!(s.get("length"), Value::from(5));
        assert_eq!(s.get("1"), Value::from("é"));
    }

    #[test]
    fn test_entries_enumeration() {
        let obj = Value::from(json!({"z": 1, "a": 2}));
        let keys: Vec<String> = obj.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a"]);

        let arr = Value::from(json!(["x", "y"]));
        let entries = arr.entries();
        assert_eq!(entries[1], ("1".to_string(), Value::from("y")));

        assert_eq!(Value::from("ab").entries().len(), 2);
        assert!(Value::from(5).entries().is_empty());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::from("1").loose_equals(&Value::from(1)));
        assert!(Value::Bool(true).loose_equals(&Value::from(1)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));

        let arr = Value::array([Value::from(1)]);
        assert!(arr.strict_equals(&arr.clone()));
        assert!(!arr.strict_equals(&Value::array([Value::from(1)])));
    }

    #[test]
    fn test_sync_and_async_functions() {
        let sync = Function::new(|_, args| Ok(Value::from(args.len())));
        let async_fn = Function::new_async(|_, _| async { Ok(Value::from("later")) });

        assert!(!sync.is_async());
        assert!(async_fn.is_async());

        let n = pollster::block_on(sync.call(&Value::Undefined, vec![Value::Null]));
        assert_eq!(n.unwrap(), Value::from(1));
        let s = pollster::block_on(async_fn.call(&Value::Undefined, vec![]));
        assert_eq!(s.unwrap(), Value::from("later"));
    }
}
