/*
 * directives/include.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{Directive, DirectiveOutcome, INCLUDE_ATTR, Walker};
use crate::Result;
use crate::context::Context;
use crate::expression::resolve_expressions;
use crate::template::TemplateDescriptor;
use async_trait::async_trait;
use faintly_dom::Node;

/// `data-fly-include`: render another template into the element.
///
/// The value, after `${}` substitution, is either `/path[#name]` or a bare
/// template name in the current template's document. Paths are checked with
/// the security policy first; a denied include is logged and leaves the
/// element's children alone. The included template is rendered with a copy
/// of the context and its children are not walked again.
pub struct IncludeDirective;

#[async_trait(?Send)]
impl Directive for IncludeDirective {
    fn name(&self) -> &'static str {
        "include"
    }

    fn exclusive(&self) -> bool {
        true
    }

    async fn apply(
        &self,
        el: &Node,
        ctx: &mut Context,
        walker: &dyn Walker,
    ) -> Result<DirectiveOutcome> {
        let Some(value) = el.attribute(INCLUDE_ATTR) else {
            return Ok(DirectiveOutcome::Absent);
        };
        el.remove_attribute(INCLUDE_ATTR);

        let reference = resolve_expressions(&value, ctx).await?.text;
        let descriptor = include_target(&reference, ctx);

        if let Some(path) = descriptor.path.as_deref() {
            let policy = walker.security(ctx)?;
            if !policy.allow_include_path(path, ctx) {
                tracing::warn!(path = %path, "Blocked include outside allowed scope");
                return Ok(DirectiveOutcome::Applied {
                    traverse_children: false,
                });
            }
        }

        let mut include_ctx = ctx.clone().with_template(descriptor);
        walker.render_element(el, &mut include_ctx).await?;

        Ok(DirectiveOutcome::Applied {
            traverse_children: false,
        })
    }
}

/// The template an include reference points at, relative to the context's
/// current template.
fn include_target(reference: &str, ctx: &Context) -> TemplateDescriptor {
    if reference.starts_with('/') {
        return TemplateDescriptor::parse(reference);
    }
    let current_path = ctx
        .template()
        .and_then(|t| t.path.clone())
        .unwrap_or_default();
    TemplateDescriptor::new(current_path, Some(reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::testing::RecordingWalker;
    use crate::security::SecurityPolicy;
    use faintly_dom::parse_fragment;
    use pollster::block_on;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn current(path: &str) -> Context {
        Context::new().with_template(TemplateDescriptor::new(path, None))
    }

    #[test]
    fn test_include_target() {
        let ctx = current("/blocks/cards/cards.html");
        assert_eq!(
            include_target("footer", &ctx),
            TemplateDescriptor::new("/blocks/cards/cards.html", Some("footer"))
        );
        assert_eq!(
            include_target("/shared/parts.html#badge", &ctx),
            TemplateDescriptor::new("/shared/parts.html", Some("badge"))
        );
        assert_eq!(
            include_target("/shared/parts.html", &ctx),
            TemplateDescriptor::new("/shared/parts.html", None)
        );
        assert_eq!(include_target("x", &Context::new()), TemplateDescriptor::new("", Some("x")));
    }

    #[test]
    fn test_include_renders_with_new_descriptor() {
        let root = parse_fragment(r#"<div data-fly-include="${part}">old</div>"#).unwrap();
        let el = root.first_child().unwrap();
        let mut ctx = current("/blocks/cards/cards.html").with("part", "footer");
        let walker = RecordingWalker::allow_all();

        let outcome = block_on(IncludeDirective.apply(&el, &mut ctx, &walker)).unwrap();

        assert_eq!(
            outcome,
            DirectiveOutcome::Applied {
                traverse_children: false
            }
        );
        assert_eq!(root.inner_html(), "<div>included</div>");
        assert_eq!(
            *walker.rendered.borrow(),
            vec![Some("/blocks/cards/cards.html#footer".to_string())]
        );
        // The caller's descriptor is untouched
        assert_eq!(ctx.template().and_then(|t| t.name.clone()), None);
    }

    struct DenyAll;

    impl SecurityPolicy for DenyAll {
        fn should_allow_attribute(&self, _: &str, _: &str, _: &Context) -> bool {
            false
        }

        fn allow_include_path(&self, _: &str, _: &Context) -> bool {
            false
        }
    }

    #[test]
    fn test_denied_include_keeps_children() {
        let root = parse_fragment(r#"<div data-fly-include="/other.html#x">old</div>"#).unwrap();
        let el = root.first_child().unwrap();
        let walker = RecordingWalker {
            policy: Rc::new(DenyAll),
            ..RecordingWalker::allow_all()
        };

        block_on(IncludeDirective.apply(&el, &mut Context::new(), &walker)).unwrap();

        assert_eq!(root.inner_html(), "<div>old</div>");
        assert!(walker.rendered.borrow().is_empty());
    }

    #[test]
    fn test_cross_origin_include_denied_by_default_policy() {
        let root =
            parse_fragment(r#"<div data-fly-include="//evil.example/x.html">old</div>"#).unwrap();
        let el = root.first_child().unwrap();
        let walker = RecordingWalker::default_policy();

        block_on(IncludeDirective.apply(&el, &mut Context::new(), &walker)).unwrap();

        assert_eq!(root.inner_html(), "<div>old</div>");
    }
}
