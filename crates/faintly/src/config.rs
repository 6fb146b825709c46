/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render configuration.
//!
//! [`SecurityConfig`] holds every threshold of the default security policy.
//! [`RenderConfig`] is the file form (TOML or JSON) of a renderer setup and
//! converts into the programmatic [`RenderOptions`].
//!
//! ```toml
//! allow_unsafe_eval = false
//! hook_strictness = "lenient"
//!
//! [environment]
//! origin = "https://www.example.com"
//! code_base_path = "/code"
//!
//! [security]
//! blocked_attributes = ["srcdoc", "style"]
//! allowed_url_schemes = ["https:", ""]
//! ```

use crate::environment::Environment;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds of the default security policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Regular expressions matched case-insensitively against attribute
    /// names. A match blocks the attribute whatever its value.
    pub blocked_attribute_patterns: Vec<String>,

    /// Attribute names blocked whatever their value.
    pub blocked_attributes: Vec<String>,

    /// Attributes whose values are URLs and get scheme validation.
    pub url_attributes: Vec<String>,

    /// Allowed URL schemes including the trailing colon. The empty string
    /// stands for relative URLs.
    pub allowed_url_schemes: Vec<String>,

    /// Prefix includes must stay under. `${codeBasePath}` is replaced with
    /// the context's code base path.
    pub include_base_path: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            blocked_attribute_patterns: vec!["^on".to_string()],
            blocked_attributes: vec!["srcdoc".to_string()],
            url_attributes: ["href", "src", "action", "formaction", "xlink:href"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_url_schemes: ["http:", "https:", "mailto:", "tel:", ""]
                .into_iter()
                .map(String::from)
                .collect(),
            include_base_path: "${codeBasePath}".to_string(),
        }
    }
}

/// What happens when custom security hooks leave out a predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStrictness {
    /// Fail the render with [`SecurityError::MissingHooks`](crate::SecurityError::MissingHooks).
    #[default]
    Strict,

    /// Substitute an always-approve predicate.
    Lenient,
}

/// File form of the page environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub origin: Option<String>,
    pub code_base_path: Option<String>,
}

/// Renderer configuration as loaded from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub security: SecurityConfig,
    pub hook_strictness: HookStrictness,
    pub environment: EnvironmentConfig,

    /// Whether `utils:eval` expressions are evaluated.
    pub allow_unsafe_eval: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            security: SecurityConfig::default(),
            hook_strictness: HookStrictness::default(),
            environment: EnvironmentConfig::default(),
            allow_unsafe_eval: true,
        }
    }
}

impl RenderConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a config file, picking the format from its extension (`.json`
    /// for JSON, TOML otherwise).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&source)
        } else {
            Self::from_toml_str(&source)
        }
    }

    /// Convert to render options, validating the origin.
    pub fn to_options(&self) -> Result<RenderOptions, ConfigError> {
        let mut environment = match &self.environment.origin {
            Some(origin) => Environment::new(origin).map_err(|source| ConfigError::Origin {
                origin: origin.clone(),
                source,
            })?,
            None => Environment::default(),
        };
        if let Some(path) = &self.environment.code_base_path {
            environment = environment.with_code_base_path(path.clone());
        }

        Ok(RenderOptions {
            security: self.security.clone(),
            hook_strictness: self.hook_strictness,
            environment,
            allow_unsafe_eval: self.allow_unsafe_eval,
        })
    }
}

/// Options a [`Renderer`](crate::Renderer) is built with.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Configuration of the default security policy.
    pub security: SecurityConfig,
    pub hook_strictness: HookStrictness,
    pub environment: Environment,
    /// When false, every render disables `utils:eval` on its context.
    pub allow_unsafe_eval: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            security: SecurityConfig::default(),
            hook_strictness: HookStrictness::default(),
            environment: Environment::default(),
            allow_unsafe_eval: true,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_hook_strictness(mut self, strictness: HookStrictness) -> Self {
        self.hook_strictness = strictness;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_unsafe_eval(mut self, allow: bool) -> Self {
        self.allow_unsafe_eval = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_is_default() {
        let config = RenderConfig::from_toml_str("").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert!(config.allow_unsafe_eval);
        assert_eq!(config.hook_strictness, HookStrictness::Strict);
    }

    #[test]
    fn test_partial_security_override() {
        let config = RenderConfig::from_toml_str(
            r#"
hook_strictness = "lenient"

[security]
blocked_attributes = ["srcdoc", "style"]
"#,
        )
        .unwrap();

        assert_eq!(config.hook_strictness, HookStrictness::Lenient);
        assert_eq!(config.security.blocked_attributes, vec!["srcdoc", "style"]);
        // Unspecified fields keep their defaults
        assert_eq!(config.security.blocked_attribute_patterns, vec!["^on"]);
        assert_eq!(config.security.include_base_path, "${codeBasePath}");
    }

    #[test]
    fn test_json_config() {
        let config = RenderConfig::from_json_str(
            r#"{"allow_unsafe_eval": false, "environment": {"origin": "https://example.com"}}"#,
        )
        .unwrap();
        let options = config.to_options().unwrap();
        assert!(!options.allow_unsafe_eval);
        assert_eq!(options.environment.origin().as_str(), "https://example.com/");
    }

    #[test]
    fn test_invalid_origin() {
        let config = RenderConfig {
            environment: EnvironmentConfig {
                origin: Some("not a url".to_string()),
                code_base_path: None,
            },
            ..RenderConfig::default()
        };
        assert!(matches!(
            config.to_options(),
            Err(ConfigError::Origin { .. })
        ));
    }

    #[test]
    fn test_from_path_picks_format() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("faintly.toml");
        std::fs::write(&toml_path, "allow_unsafe_eval = false\n").unwrap();
        assert!(!RenderConfig::from_path(&toml_path).unwrap().allow_unsafe_eval);

        let json_path = dir.path().join("faintly.json");
        std::fs::write(&json_path, r#"{"hook_strictness": "lenient"}"#).unwrap();
        assert_eq!(
            RenderConfig::from_path(&json_path).unwrap().hook_strictness,
            HookStrictness::Lenient
        );
    }
}
