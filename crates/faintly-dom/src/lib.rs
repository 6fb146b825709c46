/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mutable HTML node tree for the Faintly template engine.
//!
//! This crate plays the part of the browser DOM: a reference-counted tree of
//! [`Node`]s that can be mutated in place (attributes set and removed, children
//! replaced, nodes detached and re-inserted) while a render is in flight.
//!
//! # Overview
//!
//! - [`Node`]: a shared handle to an element, text, comment or fragment node
//! - [`parse_fragment`]: lenient HTML parsing built on [`quick-xml`]
//! - [`Node::outer_html`] / [`Node::inner_html`]: HTML serialization
//!
//! # Example
//!
//! ```rust
//! use faintly_dom::parse_fragment;
//!
//! let fragment = parse_fragment(r#"<div class="card"><p>Hello</p><br></div>"#).unwrap();
//! let card = fragment.first_child().unwrap();
//!
//! assert_eq!(card.tag_name().as_deref(), Some("div"));
//! assert_eq!(card.attribute("class").as_deref(), Some("card"));
//! assert_eq!(card.text_content(), "Hello");
//!
//! card.set_attribute("id", "main");
//! assert_eq!(
//!     fragment.inner_html(),
//!     r#"<div class="card" id="main"><p>Hello</p><br></div>"#
//! );
//! ```
//!
//! Handles are cheap to clone and compare by identity with [`Node::ptr_eq`].
//! The tree is single-threaded (`Rc`/`RefCell`); renders own their subtree
//! exclusively for their whole duration.

pub mod error;
pub mod node;
pub mod parser;
pub mod serialize;

pub use error::{DomError, Result};
pub use node::{Attribute, Node, NodeKind, NodeType};
pub use parser::parse_fragment;

/// Elements that never have children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is raw text rather than markup.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Whether `name` is a void element.
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Whether `name` holds raw text content.
pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

/// Whether `name` can be set as an attribute name: non-empty, with no
/// whitespace, quotes, `>`, `/`, `=` or control characters.
pub fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_name_validity() {
        assert!(is_valid_attribute_name("data-x"));
        assert!(is_valid_attribute_name("xlink:href"));
        assert!(!is_valid_attribute_name(""));
        assert!(!is_valid_attribute_name("a b"));
        assert!(!is_valid_attribute_name("x=\"1\""));
    }
}
