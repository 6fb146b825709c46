/*
 * security.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Security policy for rendered templates.
 *
 * A policy is a pair of predicates:
 * - should_allow_attribute gates every attribute value the engine writes
 * - allow_include_path gates every template path before it is fetched
 *
 * The policy of a render is resolved once from the context's SecurityMode and
 * kept in the context, so includes reuse it.
 */

use crate::config::{HookStrictness, SecurityConfig};
use crate::context::Context;
use crate::environment::Environment;
use crate::error::SecurityError;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Predicates consulted before attributes are written and templates fetched.
pub trait SecurityPolicy {
    /// Whether attribute `name` may be set to `value`.
    fn should_allow_attribute(&self, name: &str, value: &str, ctx: &Context) -> bool;

    /// Whether the template at `path` may be fetched and rendered.
    fn allow_include_path(&self, path: &str, ctx: &Context) -> bool;
}

/// Approves everything. Used for [`SecurityMode::Unsafe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl SecurityPolicy for AllowAll {
    fn should_allow_attribute(&self, _name: &str, _value: &str, _ctx: &Context) -> bool {
        true
    }

    fn allow_include_path(&self, _path: &str, _ctx: &Context) -> bool {
        true
    }
}

pub type AttributeHook = Rc<dyn Fn(&str, &str, &Context) -> bool>;
pub type IncludeHook = Rc<dyn Fn(&str, &Context) -> bool>;

/// Caller-supplied predicates, either of which may be left out.
#[derive(Clone, Default)]
pub struct SecurityHooks {
    should_allow_attribute: Option<AttributeHook>,
    allow_include_path: Option<IncludeHook>,
}

impl SecurityHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute_hook(
        mut self,
        hook: impl Fn(&str, &str, &Context) -> bool + 'static,
    ) -> Self {
        self.should_allow_attribute = Some(Rc::new(hook));
        self
    }

    pub fn with_include_hook(mut self, hook: impl Fn(&str, &Context) -> bool + 'static) -> Self {
        self.allow_include_path = Some(Rc::new(hook));
        self
    }

    /// Names of the predicates that were not supplied.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.should_allow_attribute.is_none() {
            missing.push("should_allow_attribute");
        }
        if self.allow_include_path.is_none() {
            missing.push("allow_include_path");
        }
        missing
    }

    fn into_policy(self, strictness: HookStrictness) -> Result<HookPolicy, SecurityError> {
        let missing = self.missing();
        if strictness == HookStrictness::Strict && !missing.is_empty() {
            return Err(SecurityError::MissingHooks { missing });
        }

        Ok(HookPolicy {
            attribute: self
                .should_allow_attribute
                .unwrap_or_else(|| -> AttributeHook { Rc::new(approve_attribute) }),
            include: self
                .allow_include_path
                .unwrap_or_else(|| -> IncludeHook { Rc::new(approve_include) }),
        })
    }
}

fn approve_attribute(_name: &str, _value: &str, _ctx: &Context) -> bool {
    true
}

fn approve_include(_path: &str, _ctx: &Context) -> bool {
    true
}

impl fmt::Debug for SecurityHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityHooks")
            .field("should_allow_attribute", &self.should_allow_attribute.is_some())
            .field("allow_include_path", &self.allow_include_path.is_some())
            .finish()
    }
}

struct HookPolicy {
    attribute: AttributeHook,
    include: IncludeHook,
}

impl SecurityPolicy for HookPolicy {
    fn should_allow_attribute(&self, name: &str, value: &str, ctx: &Context) -> bool {
        (self.attribute)(name, value, ctx)
    }

    fn allow_include_path(&self, path: &str, ctx: &Context) -> bool {
        (self.include)(path, ctx)
    }
}

/// How the policy of a render is chosen.
#[derive(Clone, Default)]
pub enum SecurityMode {
    /// No checks at all.
    Unsafe,

    /// [`DefaultSecurity`] built from the renderer's [`SecurityConfig`].
    #[default]
    Default,

    /// Caller predicates. Missing ones are handled per [`HookStrictness`].
    Hooks(SecurityHooks),

    /// A complete policy object.
    Policy(Rc<dyn SecurityPolicy>),
}

impl SecurityMode {
    /// Wrap a policy object.
    pub fn policy(policy: impl SecurityPolicy + 'static) -> Self {
        SecurityMode::Policy(Rc::new(policy))
    }

    /// Build the policy this mode stands for.
    pub fn resolve(
        &self,
        config: &SecurityConfig,
        environment: &Environment,
        strictness: HookStrictness,
    ) -> Result<Rc<dyn SecurityPolicy>, SecurityError> {
        let policy: Rc<dyn SecurityPolicy> = match self {
            SecurityMode::Unsafe => Rc::new(AllowAll),
            SecurityMode::Default => Rc::new(DefaultSecurity::new(config, environment.clone())?),
            SecurityMode::Hooks(hooks) => Rc::new(hooks.clone().into_policy(strictness)?),
            SecurityMode::Policy(policy) => Rc::clone(policy),
        };
        Ok(policy)
    }
}

impl fmt::Debug for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityMode::Unsafe => f.write_str("Unsafe"),
            SecurityMode::Default => f.write_str("Default"),
            SecurityMode::Hooks(hooks) => f.debug_tuple("Hooks").field(hooks).finish(),
            SecurityMode::Policy(_) => f.write_str("Policy"),
        }
    }
}

enum IncludeBase {
    /// A prefix template; `${codeBasePath}` is substituted.
    Template(String),
    /// A prefix computed from the context.
    Computed(Rc<dyn Fn(&Context) -> String>),
}

/// The built-in policy.
///
/// - attributes whose name matches a blocked pattern or is in the blocked set
///   are denied whatever their value
/// - URL attributes must carry an allowed scheme (relative URLs count as the
///   empty scheme)
/// - includes must be same-origin and under the include base path
pub struct DefaultSecurity {
    blocked_patterns: Vec<Regex>,
    blocked_attributes: HashSet<String>,
    url_attributes: HashSet<String>,
    allowed_schemes: HashSet<String>,
    include_base: IncludeBase,
    environment: Environment,
}

impl DefaultSecurity {
    pub fn new(config: &SecurityConfig, environment: Environment) -> Result<Self, SecurityError> {
        let blocked_patterns = config
            .blocked_attribute_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| SecurityError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let lowered = |names: &[String]| -> HashSet<String> {
            names.iter().map(|n| n.to_ascii_lowercase()).collect()
        };

        let include_base = if config.include_base_path.is_empty() {
            SecurityConfig::default().include_base_path
        } else {
            config.include_base_path.clone()
        };

        Ok(Self {
            blocked_patterns,
            blocked_attributes: lowered(&config.blocked_attributes),
            url_attributes: lowered(&config.url_attributes),
            allowed_schemes: config.allowed_url_schemes.iter().cloned().collect(),
            include_base: IncludeBase::Template(include_base),
            environment,
        })
    }

    /// Compute the include base path from the context instead of the
    /// configured template.
    pub fn with_include_base_fn(mut self, base: impl Fn(&Context) -> String + 'static) -> Self {
        self.include_base = IncludeBase::Computed(Rc::new(base));
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn is_blocked_attribute_name(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.blocked_attributes.contains(&name)
            || self.blocked_patterns.iter().any(|re| re.is_match(&name))
    }

    pub fn is_url_attribute(&self, name: &str) -> bool {
        self.url_attributes.contains(&name.to_ascii_lowercase())
    }

    fn resolve_include_base(&self, ctx: &Context) -> String {
        let base = match &self.include_base {
            IncludeBase::Template(template) => {
                template.replace("${codeBasePath}", ctx.code_base_path().unwrap_or(""))
            }
            IncludeBase::Computed(base) => base(ctx),
        };
        if !base.is_empty() {
            return base;
        }

        if let Some(code_base_path) = ctx.code_base_path().filter(|p| !p.is_empty()) {
            return code_base_path.to_string();
        }
        let current = ctx
            .template()
            .and_then(|t| t.path.as_deref())
            .unwrap_or("");
        match current.rfind('/') {
            Some(slash) => current[..=slash].to_string(),
            None => "/".to_string(),
        }
    }
}

impl SecurityPolicy for DefaultSecurity {
    fn should_allow_attribute(&self, name: &str, value: &str, _ctx: &Context) -> bool {
        if self.is_blocked_attribute_name(name) {
            return false;
        }
        if self.is_url_attribute(name) {
            return self.allowed_schemes.contains(&extract_url_scheme(value));
        }
        true
    }

    fn allow_include_path(&self, path: &str, ctx: &Context) -> bool {
        if path.is_empty() {
            return true;
        }

        let mut base = self.resolve_include_base(ctx);
        if !base.ends_with('/') {
            base.push('/');
        }

        let Some(url) = self.environment.resolve(path) else {
            return false;
        };
        self.environment.is_same_origin(&url) && url.path().starts_with(&base)
    }
}

/// The scheme of a URL attribute value, lower-cased with its colon.
///
/// Relative references (empty, `#`, `/`, `./`, `../`, `?`) have the empty
/// scheme, as does text whose first colon comes after a `/`.
pub fn extract_url_scheme(value: &str) -> String {
    let v = value.trim();
    if v.is_empty()
        || ["#", "/", "./", "../", "?"]
            .iter()
            .any(|prefix| v.starts_with(prefix))
    {
        return String::new();
    }

    match (v.find(':'), v.find('/')) {
        (Some(colon), Some(slash)) if colon < slash => v[..=colon].to_ascii_lowercase(),
        (Some(colon), None) => v[..=colon].to_ascii_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateDescriptor;

    fn default_security() -> DefaultSecurity {
        DefaultSecurity::new(
            &SecurityConfig::default(),
            Environment::new("https://example.com").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_event_handlers_blocked() {
        let sec = default_security();
        let ctx = Context::new();
        assert!(!sec.should_allow_attribute("onclick", "alert(1)", &ctx));
        assert!(!sec.should_allow_attribute("ONLOAD", "x()", &ctx));
        assert!(!sec.should_allow_attribute("srcdoc", "<p>hi</p>", &ctx));
        assert!(sec.should_allow_attribute("class", "onclick", &ctx));
    }

    #[test]
    fn test_url_schemes() {
        let sec = default_security();
        let ctx = Context::new();
        assert!(!sec.should_allow_attribute("href", "javascript:alert(1)", &ctx));
        assert!(!sec.should_allow_attribute("href", "  JavaScript:alert(1)", &ctx));
        assert!(!sec.should_allow_attribute("src", "data:text/html;base64,xx", &ctx));
        assert!(!sec.should_allow_attribute("action", "vbscript:x", &ctx));
        assert!(sec.should_allow_attribute("href", "https://example.com", &ctx));
        assert!(sec.should_allow_attribute("href", "mailto:a@b.c", &ctx));
        assert!(sec.should_allow_attribute("href", "/local/page", &ctx));
        assert!(sec.should_allow_attribute("href", "#top", &ctx));
        assert!(sec.should_allow_attribute("href", "", &ctx));
        assert!(sec.should_allow_attribute("href", "page.html", &ctx));
    }

    #[test]
    fn test_extract_url_scheme() {
        assert_eq!(extract_url_scheme("HTTPS://x"), "https:");
        assert_eq!(extract_url_scheme("tel:+1555"), "tel:");
        assert_eq!(extract_url_scheme("../up"), "");
        assert_eq!(extract_url_scheme("?q=1"), "");
        assert_eq!(extract_url_scheme("path/with:colon"), "");
    }

    #[test]
    fn test_cross_origin_includes_denied() {
        let sec = default_security();
        let ctx = Context::new().with_code_base_path("/code");
        assert!(!sec.allow_include_path("https://evil.example/code/x.html", &ctx));
        assert!(!sec.allow_include_path("//evil.example/code/x.html", &ctx));
        assert!(sec.allow_include_path("https://example.com/code/x.html", &ctx));
    }

    #[test]
    fn test_include_base_from_code_base_path() {
        let sec = default_security();
        let ctx = Context::new().with_code_base_path("/code");
        assert!(sec.allow_include_path("/code/blocks/a/a.html", &ctx));
        assert!(!sec.allow_include_path("/other/blocks/a/a.html", &ctx));
        // Prefix must end at a path boundary
        assert!(!sec.allow_include_path("/codebase/x.html", &ctx));
        assert!(sec.allow_include_path("", &ctx));
    }

    #[test]
    fn test_include_base_falls_back_to_template_dir() {
        let sec = default_security();
        let ctx = Context::new()
            .with_template(TemplateDescriptor::new("/blocks/card/card.html", None));
        assert!(sec.allow_include_path("/blocks/card/parts.html", &ctx));
        assert!(!sec.allow_include_path("/blocks/other/other.html", &ctx));

        // An empty code base path does not count as a base
        let ctx = ctx.with_code_base_path("");
        assert!(!sec.allow_include_path("/blocks/other/other.html", &ctx));
    }

    #[test]
    fn test_include_base_fn() {
        let sec = default_security().with_include_base_fn(|_| "/shared".to_string());
        let ctx = Context::new().with_code_base_path("/code");
        assert!(sec.allow_include_path("/shared/x.html", &ctx));
        assert!(!sec.allow_include_path("/code/x.html", &ctx));
    }

    #[test]
    fn test_custom_config() {
        let config = SecurityConfig {
            blocked_attributes: vec!["style".to_string()],
            allowed_url_schemes: vec!["https:".to_string()],
            ..SecurityConfig::default()
        };
        let sec = DefaultSecurity::new(&config, Environment::default()).unwrap();
        let ctx = Context::new();
        assert!(!sec.should_allow_attribute("style", "color: red", &ctx));
        assert!(sec.should_allow_attribute("srcdoc", "x", &ctx));
        assert!(!sec.should_allow_attribute("href", "http://plain.example", &ctx));
        assert!(!sec.should_allow_attribute("href", "/relative", &ctx));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = SecurityConfig {
            blocked_attribute_patterns: vec!["(".to_string()],
            ..SecurityConfig::default()
        };
        let result = DefaultSecurity::new(&config, Environment::default());
        assert!(matches!(result, Err(SecurityError::InvalidPattern { .. })));
    }

    #[test]
    fn test_strict_hooks_require_both_predicates() {
        let hooks = SecurityHooks::new().with_attribute_hook(|_, _, _| false);
        let err = SecurityMode::Hooks(hooks.clone())
            .resolve(
                &SecurityConfig::default(),
                &Environment::default(),
                HookStrictness::Strict,
            )
            .err()
            .unwrap();
        assert!(err.to_string().contains("allow_include_path"));

        let policy = SecurityMode::Hooks(hooks)
            .resolve(
                &SecurityConfig::default(),
                &Environment::default(),
                HookStrictness::Lenient,
            )
            .unwrap();
        let ctx = Context::new();
        assert!(!policy.should_allow_attribute("title", "x", &ctx));
        assert!(policy.allow_include_path("https://anywhere.example/x", &ctx));
    }

    #[test]
    fn test_unsafe_mode_allows_everything() {
        let policy = SecurityMode::Unsafe
            .resolve(
                &SecurityConfig::default(),
                &Environment::default(),
                HookStrictness::Strict,
            )
            .unwrap();
        let ctx = Context::new();
        assert!(policy.should_allow_attribute("onclick", "alert(1)", &ctx));
        assert!(policy.allow_include_path("https://evil.example/x", &ctx));
    }
}
