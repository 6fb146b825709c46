/*
 * environment.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The host environment a render runs in.
//!
//! Security decisions need the page origin, and block renders need a default
//! code base path. Both come from here instead of from process-wide state.

use once_cell::sync::Lazy;
use url::Url;

static DEFAULT_ORIGIN: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("default origin is a valid URL"));

/// Origin and base path of the page hosting rendered blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    origin: Url,
    code_base_path: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.clone(),
            code_base_path: String::new(),
        }
    }
}

impl Environment {
    /// An environment for pages served from `origin`.
    pub fn new(origin: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            origin: Url::parse(origin)?,
            code_base_path: String::new(),
        })
    }

    /// Set the code base path used when a block render does not supply one.
    pub fn with_code_base_path(mut self, path: impl Into<String>) -> Self {
        self.code_base_path = path.into();
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn code_base_path(&self) -> &str {
        &self.code_base_path
    }

    /// Resolve `path` against the origin. Absolute URLs resolve to
    /// themselves.
    pub fn resolve(&self, path: &str) -> Option<Url> {
        self.origin.join(path).ok()
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let env = Environment::new("https://example.com").unwrap();

        let local = env.resolve("/blocks/a/a.html").unwrap();
        assert_eq!(local.as_str(), "https://example.com/blocks/a/a.html");
        assert!(env.is_same_origin(&local));

        let remote = env.resolve("https://evil.example/x.html").unwrap();
        assert!(!env.is_same_origin(&remote));

        let protocol_relative = env.resolve("//evil.example/x.html").unwrap();
        assert!(!env.is_same_origin(&protocol_relative));
    }

    #[test]
    fn test_default_environment() {
        let env = Environment::default();
        assert_eq!(env.origin().as_str(), "http://localhost/");
        assert_eq!(env.code_base_path(), "");
    }
}
