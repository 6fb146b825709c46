/*
 * directives/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive handlers and the pipeline that sequences them.
//!
//! A directive is a `data-fly-*` attribute that transforms or gates the
//! element carrying it. Each handler implements [`Directive`]; the
//! [`DirectivePipeline`] runs them over one element in a fixed order:
//!
//! 1. `data-fly-test` / `data-fly-not`
//! 2. `data-fly-repeat`
//! 3. `data-fly-attributes` (and `${}` in ordinary attributes)
//! 4. `data-fly-content`
//! 5. `data-fly-include`
//! 6. `data-fly-unwrap`
//!
//! Content and include are exclusive: once one of them has run, the other
//! is skipped. Handlers recurse into the render pipeline only through the
//! [`Walker`] they are given.

mod attributes;
mod content;
mod include;
mod repeat;
mod unwrap;

pub use attributes::AttributesDirective;
pub use content::ContentDirective;
pub use include::IncludeDirective;
pub use repeat::RepeatDirective;
pub use test::TestDirective;
pub use unwrap::{UnwrapDirective, process_unwraps};

use crate::Result;
use crate::context::Context;
use crate::security::SecurityPolicy;
use async_trait::async_trait;
use faintly_dom::Node;
use std::rc::Rc;

/// Prefix shared by every directive attribute.
pub const DIRECTIVE_PREFIX: &str = "data-fly-";

pub const TEST_ATTR: &str = "data-fly-test";
pub const NOT_ATTR: &str = "data-fly-not";
pub const REPEAT_ATTR: &str = "data-fly-repeat";
pub const ATTRIBUTES_ATTR: &str = "data-fly-attributes";
pub const CONTENT_ATTR: &str = "data-fly-content";
pub const INCLUDE_ATTR: &str = "data-fly-include";
pub const UNWRAP_ATTR: &str = "data-fly-unwrap";

/// What a directive did to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveOutcome {
    /// The element does not carry the directive.
    Absent,
    /// The directive ran; `traverse_children` says whether the element's
    /// children still need to be walked.
    Applied { traverse_children: bool },
    /// The element left the tree (or was replaced by clones). Nothing more
    /// runs on it.
    Detached,
}

/// Callback into the render pipeline, handed to directives that recurse.
#[async_trait(?Send)]
pub trait Walker {
    /// Process a node and its subtree.
    async fn process_node(&self, node: &Node, ctx: &mut Context) -> Result<()>;

    /// Resolve the context's template, render it and replace `el`'s children
    /// with the result.
    async fn render_element(&self, el: &Node, ctx: &mut Context) -> Result<()>;

    /// The security policy of the current render, resolving it on first use.
    fn security(&self, ctx: &mut Context) -> Result<Rc<dyn SecurityPolicy>>;
}

/// A `data-fly-*` directive handler.
#[async_trait(?Send)]
pub trait Directive {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Exclusive directives are skipped once another exclusive directive has
    /// run on the same element.
    fn exclusive(&self) -> bool {
        false
    }

    /// Apply the directive to `el`.
    async fn apply(
        &self,
        el: &Node,
        ctx: &mut Context,
        walker: &dyn Walker,
    ) -> Result<DirectiveOutcome>;
}

/// Ordered collection of directives applied to each element.
pub struct DirectivePipeline {
    directives: Vec<Box<dyn Directive>>,
}

impl DirectivePipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
        }
    }

    /// The built-in directives in their fixed precedence.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.extend([
            Box::new(TestDirective) as Box<dyn Directive>,
            Box::new(RepeatDirective),
            Box::new(AttributesDirective),
            Box::new(ContentDirective),
            Box::new(IncludeDirective),
            Box::new(UnwrapDirective),
        ]);
        pipeline
    }

    /// Add a directive. Directives run in the order they are added.
    pub fn push(&mut self, directive: Box<dyn Directive>) {
        self.directives.push(directive);
    }

    pub fn extend(&mut self, directives: impl IntoIterator<Item = Box<dyn Directive>>) {
        self.directives.extend(directives);
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Names of all directives in execution order.
    pub fn directive_names(&self) -> Vec<&'static str> {
        self.directives.iter().map(|d| d.name()).collect()
    }

    /// Run every directive on `el`.
    ///
    /// Returns whether the element's children should be walked next. A
    /// detached element stops the pipeline and reports `false`.
    pub async fn execute(&self, el: &Node, ctx: &mut Context, walker: &dyn Walker) -> Result<bool> {
        let mut traverse = true;
        let mut exclusive_ran = false;

        for directive in &self.directives {
            if directive.exclusive() && exclusive_ran {
                continue;
            }

            match directive.apply(el, ctx, walker).await? {
                DirectiveOutcome::Absent => {}
                DirectiveOutcome::Applied { traverse_children } => {
                    tracing::debug!(
                        directive = directive.name(),
                        traverse_children,
                        "Applied directive"
                    );
                    traverse &= traverse_children;
                    exclusive_ran |= directive.exclusive();
                }
                DirectiveOutcome::Detached => {
                    tracing::debug!(directive = directive.name(), "Element detached");
                    return Ok(false);
                }
            }
        }

        Ok(traverse)
    }
}

impl Default for DirectivePipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// A directive attribute found on an element, e.g. `data-fly-test.visible`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectiveAttribute {
    /// Full attribute name.
    pub name: String,
    /// Which of the searched directive names matched.
    pub base: &'static str,
    /// Lower-cased sub-name after the dot, if any.
    pub sub_name: Option<String>,
}

/// The first attribute (in source order) named `base` or `base.<sub-name>`
/// for any of `bases`.
pub(crate) fn find_directive(el: &Node, bases: &[&'static str]) -> Option<DirectiveAttribute> {
    el.attribute_names().into_iter().find_map(|name| {
        bases.iter().find_map(|base| {
            let rest = name.strip_prefix(base)?;
            let sub_name = match rest.strip_prefix('.') {
                Some(sub) => Some(sub.split('.').next().unwrap_or(sub).to_lowercase()),
                None if rest.is_empty() => None,
                None => return None,
            };
            Some(DirectiveAttribute {
                name: name.clone(),
                base,
                sub_name: sub_name.filter(|s| !s.is_empty()),
            })
        })
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! A minimal walker for exercising single directives.

    use super::*;
    use crate::expression::process_text_expressions;
    use crate::security::{AllowAll, DefaultSecurity};
    use crate::{config::SecurityConfig, environment::Environment};
    use std::cell::RefCell;

    /// Walks text and element children without running directives on them;
    /// records `render_element` calls instead of resolving templates.
    pub struct RecordingWalker {
        pub policy: Rc<dyn SecurityPolicy>,
        pub rendered: RefCell<Vec<Option<String>>>,
    }

    impl RecordingWalker {
        pub fn allow_all() -> Self {
            Self {
                policy: Rc::new(AllowAll),
                rendered: RefCell::new(Vec::new()),
            }
        }

        pub fn default_policy() -> Self {
            let policy = DefaultSecurity::new(&SecurityConfig::default(), Environment::default())
                .expect("default security config is valid");
            Self {
                policy: Rc::new(policy),
                rendered: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl Walker for RecordingWalker {
        async fn process_node(&self, node: &Node, ctx: &mut Context) -> Result<()> {
            if node.is_text() {
                process_text_expressions(node, ctx).await?;
            }
            for child in node.children() {
                self.process_node(&child, ctx).await?;
            }
            Ok(())
        }

        async fn render_element(&self, el: &Node, ctx: &mut Context) -> Result<()> {
            let reference = ctx.template().map(|t| {
                format!(
                    "{}#{}",
                    t.path.as_deref().unwrap_or(""),
                    t.name.as_deref().unwrap_or("")
                )
            });
            self.rendered.borrow_mut().push(reference);
            el.replace_children([Node::text("included")]);
            Ok(())
        }

        fn security(&self, _ctx: &mut Context) -> Result<Rc<dyn SecurityPolicy>> {
            Ok(Rc::clone(&self.policy))
        }
    }
}
