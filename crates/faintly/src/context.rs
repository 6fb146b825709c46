/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The render context.
//!
//! A [`Context`] is the data environment expressions resolve against. It
//! carries caller data as an ordered key/value map plus the render metadata the
//! engine threads through a render: the template descriptor, the block being
//! decorated, the code base path, the node being processed, the security
//! policy and the `utils:eval` capability.
//!
//! Cloning a context is a shallow copy. Repeat iterations and includes work on
//! clones, so bindings they add never leak back to the enclosing render while
//! array and object values stay shared.

use crate::error::EvalError;
use crate::eval::{ScriptEvaluator, UnsafeEvaluator};
use crate::security::{SecurityMode, SecurityPolicy};
use crate::template::TemplateDescriptor;
use crate::value::{Object, Value};
use faintly_dom::Node;
use std::fmt;
use std::rc::Rc;

/// Context keys backed by render metadata.
pub const TEMPLATE_KEY: &str = "template";
pub const BLOCK_KEY: &str = "block";
pub const BLOCK_NAME_KEY: &str = "blockName";
pub const CODE_BASE_PATH_KEY: &str = "codeBasePath";
pub const CURRENT_NODE_KEY: &str = "currentNode";

/// Data and metadata for one render.
///
/// # Example
///
/// ```rust
/// use faintly::{Context, Value};
///
/// let ctx = Context::new()
///     .with("title", "Hello")
///     .with_block_name("cards");
///
/// assert_eq!(ctx.get("title"), Value::from("Hello"));
/// assert_eq!(ctx.get("blockName"), Value::from("cards"));
/// assert!(ctx.get("missing").is_undefined());
/// ```
#[derive(Clone)]
pub struct Context {
    values: Object,
    template: Option<TemplateDescriptor>,
    block: Option<Node>,
    block_name: Option<String>,
    code_base_path: Option<String>,
    current_node: Option<Node>,
    security: SecurityMode,
    policy: Option<Rc<dyn SecurityPolicy>>,
    evaluator: Option<Rc<dyn UnsafeEvaluator>>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            values: Object::new(),
            template: None,
            block: None,
            block_name: None,
            code_base_path: None,
            current_node: None,
            security: SecurityMode::Default,
            policy: None,
            evaluator: Some(Rc::new(ScriptEvaluator)),
        }
    }
}

impl Context {
    /// An empty context with the default security mode and the built-in
    /// script evaluator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose data is the members of a JSON object.
    ///
    /// Non-object JSON yields an empty context.
    pub fn from_json(json: serde_json::Value) -> Self {
        let mut ctx = Self::new();
        if let serde_json::Value::Object(map) = json {
            for (key, value) in map {
                ctx.values.insert(key, Value::from(value));
            }
        }
        ctx
    }

    /// Builder form of [`Context::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    /// Look up a top-level key, including the metadata keys.
    pub fn get(&self, key: &str) -> Value {
        self.metadata(key)
            .or_else(|| self.values.get(key).cloned())
            .unwrap_or_default()
    }

    /// Whether `key` is bound, even to `undefined`.
    pub fn contains(&self, key: &str) -> bool {
        self.metadata(key).is_some() || self.values.contains_key(key)
    }

    /// Caller data keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn metadata(&self, key: &str) -> Option<Value> {
        match key {
            TEMPLATE_KEY => self.template.as_ref().map(TemplateDescriptor::to_value),
            BLOCK_KEY => self.block.clone().map(Value::Node),
            BLOCK_NAME_KEY => self.block_name.clone().map(Value::String),
            CODE_BASE_PATH_KEY => self.code_base_path.clone().map(Value::String),
            CURRENT_NODE_KEY => self.current_node.clone().map(Value::Node),
            _ => None,
        }
    }

    /// A shallow copy of the context as an object value: caller data followed
    /// by the metadata keys that are set.
    ///
    /// This is the argument context functions receive.
    pub fn to_value(&self) -> Value {
        let mut map = self.values.clone();
        for key in [
            TEMPLATE_KEY,
            BLOCK_KEY,
            BLOCK_NAME_KEY,
            CODE_BASE_PATH_KEY,
            CURRENT_NODE_KEY,
        ] {
            if let Some(value) = self.metadata(key) {
                map.insert(key.to_string(), value);
            }
        }
        Value::from(map)
    }

    // ─── render metadata ───────────────────────────────────────────────────

    pub fn template(&self) -> Option<&TemplateDescriptor> {
        self.template.as_ref()
    }

    pub fn set_template(&mut self, template: TemplateDescriptor) {
        self.template = Some(template);
    }

    /// Render an explicit template instead of the block's default one.
    pub fn with_template(mut self, template: TemplateDescriptor) -> Self {
        self.set_template(template);
        self
    }

    pub fn block(&self) -> Option<&Node> {
        self.block.as_ref()
    }

    pub fn set_block(&mut self, block: Node) {
        self.block = Some(block);
    }

    pub fn block_name(&self) -> Option<&str> {
        self.block_name.as_deref()
    }

    pub fn set_block_name(&mut self, name: impl Into<String>) {
        self.block_name = Some(name.into());
    }

    pub fn with_block_name(mut self, name: impl Into<String>) -> Self {
        self.set_block_name(name);
        self
    }

    /// The code base path, treating an empty string as unset.
    pub fn code_base_path(&self) -> Option<&str> {
        self.code_base_path.as_deref().filter(|p| !p.is_empty())
    }

    pub fn set_code_base_path(&mut self, path: impl Into<String>) {
        self.code_base_path = Some(path.into());
    }

    pub fn with_code_base_path(mut self, path: impl Into<String>) -> Self {
        self.set_code_base_path(path);
        self
    }

    pub fn current_node(&self) -> Option<&Node> {
        self.current_node.as_ref()
    }

    pub(crate) fn set_current_node(&mut self, node: Node) {
        self.current_node = Some(node);
    }

    // ─── security ──────────────────────────────────────────────────────────

    pub fn security_mode(&self) -> &SecurityMode {
        &self.security
    }

    /// Select how the security policy is resolved for renders of this
    /// context. Clears a previously resolved policy.
    pub fn with_security(mut self, mode: SecurityMode) -> Self {
        self.security = mode;
        self.policy = None;
        self
    }

    /// The policy resolved by the renderer, if any.
    pub fn policy(&self) -> Option<Rc<dyn SecurityPolicy>> {
        self.policy.clone()
    }

    pub(crate) fn set_policy(&mut self, policy: Rc<dyn SecurityPolicy>) {
        self.policy = Some(policy);
    }

    // ─── unsafe evaluation ─────────────────────────────────────────────────

    /// Replace the `utils:eval` evaluator.
    pub fn with_evaluator(mut self, evaluator: impl UnsafeEvaluator + 'static) -> Self {
        self.evaluator = Some(Rc::new(evaluator));
        self
    }

    /// Turn `utils:eval` off; expressions using it fail with
    /// [`EvalError::Disabled`].
    pub fn without_unsafe_eval(mut self) -> Self {
        self.disable_unsafe_eval();
        self
    }

    pub fn disable_unsafe_eval(&mut self) {
        self.evaluator = None;
    }

    pub fn unsafe_eval_enabled(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Evaluate `utils:eval` code against this context.
    pub async fn evaluate(&self, code: &str) -> Result<Value, EvalError> {
        match &self.evaluator {
            Some(evaluator) => evaluator.evaluate(code, self).await,
            None => Err(EvalError::Disabled(code.trim().to_string())),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values)
            .field("template", &self.template)
            .field("block_name", &self.block_name)
            .field("code_base_path", &self.code_base_path)
            .field("security", &self.security)
            .field("policy_resolved", &self.policy.is_some())
            .field("unsafe_eval", &self.evaluator.is_some())
            .finish()
    }
}
