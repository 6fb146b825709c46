/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! HTML template directive engine.
//!
//! Faintly renders `<template>` elements against a data [`Context`]. Templates
//! are plain HTML whose elements carry `data-fly-*` directives and whose text
//! and attributes embed `${expr}` placeholders:
//!
//! ```html
//! <template>
//!   <ul data-fly-test="items">
//!     <li data-fly-repeat.card="items" class="card-${cardNumber}">
//!       <a href="${card.url}" data-fly-content="card.title"></a>
//!     </li>
//!   </ul>
//! </template>
//! ```
//!
//! # Architecture
//!
//! - [`expression`]: dotted-path resolution and `${}` substitution
//! - [`eval`]: the `utils:eval(...)` escape hatch and its built-in evaluator
//! - [`directives`]: one handler per directive and the pipeline ordering them
//! - [`security`]: the policy gating attributes and include paths
//! - [`template`]: locating, fetching and caching templates
//! - [`Renderer`]: the entry points and the tree walk
//!
//! # Example
//!
//! ```rust
//! use faintly::{CachingResolver, Context, MemorySource, RenderOptions, Renderer};
//! use faintly_dom::Node;
//!
//! let source = MemorySource::new().with(
//!     "/blocks/greeting/greeting.html",
//!     r#"<template><h1>Hello, ${user.name}!</h1></template>"#,
//! );
//! let renderer = Renderer::new(CachingResolver::new(source), RenderOptions::default());
//!
//! let block = Node::element("div");
//! block.set_attribute("data-block-name", "greeting");
//! let mut ctx = Context::from_json(serde_json::json!({"user": {"name": "Ada"}}));
//!
//! pollster::block_on(renderer.render_block(&block, &mut ctx)).unwrap();
//! assert_eq!(block.inner_html(), "<h1>Hello, Ada!</h1>");
//! ```
//!
//! Rendering is single-threaded: futures are `?Send` and can be driven by
//! any executor.

pub mod config;
pub mod context;
pub mod directives;
pub mod environment;
pub mod error;
pub mod eval;
pub mod expression;
pub mod render;
pub mod security;
pub mod template;
pub mod value;

// Re-export commonly used types
pub use config::{EnvironmentConfig, HookStrictness, RenderConfig, RenderOptions, SecurityConfig};
pub use context::Context;
pub use directives::{Directive, DirectiveOutcome, DirectivePipeline, Walker};
pub use environment::Environment;
pub use error::{ConfigError, EvalError, RenderError, Result, SecurityError, TemplateError};
pub use eval::{ScriptEvaluator, UnsafeEvaluator};
pub use expression::{
    Resolved, process_text_expressions, resolve_expression, resolve_expressions,
    unwrap_expression,
};
pub use render::{BLOCK_NAME_ATTR, Renderer};
pub use security::{AllowAll, DefaultSecurity, SecurityHooks, SecurityMode, SecurityPolicy};
pub use template::{
    CachingResolver, FileSystemSource, MemorySource, TemplateDescriptor, TemplateResolver,
    TemplateSource,
};
pub use value::{Function, Object, Value};
