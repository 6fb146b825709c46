/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for rendering.
//!
//! Resolution misses are never errors: a path through a missing value simply
//! yields `undefined`. The errors here cover evaluation failures in
//! `utils:eval` code, template resolution, security setup and configuration.

use faintly_dom::DomError;
use thiserror::Error;

/// Result type alias for render operations.
pub type Result<T, E = RenderError> = std::result::Result<T, E>;

/// Errors raised while evaluating `utils:eval` code or calling context
/// functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// An identifier that is neither in scope nor in the context.
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    /// Code the parser could not read.
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// An operation applied to a value of the wrong type.
    #[error("TypeError: {0}")]
    Type(String),

    /// An error raised by a called function.
    #[error("{0}")]
    Thrown(String),

    /// `utils:eval` was used but the context has no evaluator.
    #[error("utils:eval is disabled for this render: {0}")]
    Disabled(String),
}

/// Errors from template resolution.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The source had no document at the path.
    #[error("Failed to fetch template from {path} for block {block_name}.")]
    FetchFailed { path: String, block_name: String },

    /// The document was fetched but holds no template with the requested name.
    #[error("Failed to find template with id {id}.")]
    NotFound { id: String },

    /// The include-path gate rejected the template path.
    #[error("Template fetch blocked by security policy: {path}")]
    Blocked { path: String },

    /// The template document is not readable HTML.
    #[error("Failed to parse template {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: DomError,
    },

    /// Reading the template document failed.
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from resolving the security policy of a render.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Custom hooks were supplied without every predicate under strict
    /// checking.
    #[error("Custom security hooks are missing required predicates: {}", missing.join(", "))]
    MissingHooks { missing: Vec<&'static str> },

    /// A blocked-attribute pattern is not a valid regular expression.
    #[error("Invalid blocked attribute pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors from loading render configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid origin '{origin}': {source}")]
    Origin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Security(#[from] SecurityError),
}

/// Any error that aborts a render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Dom(#[from] DomError),
}
