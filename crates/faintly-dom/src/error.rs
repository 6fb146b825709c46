/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for HTML parsing and tree mutation.

use thiserror::Error;

/// Result type alias for faintly-dom operations.
pub type Result<T> = std::result::Result<T, DomError>;

/// Errors that can occur while parsing HTML or rearranging nodes.
///
/// The parser is lenient about HTML structure (unclosed elements, stray end
/// tags, void elements); its errors only cover input the tokenizer cannot
/// make sense of.
#[derive(Debug, Clone, Error)]
pub enum DomError {
    /// Markup the tokenizer rejected.
    #[error("HTML syntax error: {message}{}", position.map(|p| format!(" at byte {p}")).unwrap_or_default())]
    Syntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// A malformed attribute inside a start tag.
    #[error("Invalid attribute in <{element}>: {message}")]
    Attribute { element: String, message: String },

    /// A node would become a descendant of itself.
    #[error("Cannot insert <{node}> into <{parent}>: it is the element or one of its ancestors")]
    Hierarchy { node: String, parent: String },
}

impl From<quick_xml::Error> for DomError {
    fn from(err: quick_xml::Error) -> Self {
        DomError::Syntax {
            message: err.to_string(),
            position: None,
        }
    }
}
