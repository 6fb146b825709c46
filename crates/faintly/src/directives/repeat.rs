/*
 * directives/repeat.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{Directive, DirectiveOutcome, REPEAT_ATTR, Walker, find_directive};
use crate::Result;
use crate::context::Context;
use crate::expression::{resolve_expression, unwrap_expression};
use crate::value::Value;
use async_trait::async_trait;
use faintly_dom::Node;

/// Binding name used when the directive has no sub-name.
pub const DEFAULT_ITEM_NAME: &str = "item";

/// `data-fly-repeat[.name]`.
///
/// Renders one clone of the element per entry of an array, object or string.
/// Each clone is processed immediately with a copy of the context binding
/// `name`, `nameIndex`, `nameNumber` and `nameKey`. Clones take the
/// element's place in collection order.
pub struct RepeatDirective;

#[async_trait(?Send)]
impl Directive for RepeatDirective {
    fn name(&self) -> &'static str {
        "repeat"
    }

    async fn apply(
        &self,
        el: &Node,
        ctx: &mut Context,
        walker: &dyn Walker,
    ) -> Result<DirectiveOutcome> {
        let Some(found) = find_directive(el, &[REPEAT_ATTR]) else {
            return Ok(DirectiveOutcome::Absent);
        };

        let expr = el.attribute(&found.name).unwrap_or_default();
        let collection = resolve_expression(unwrap_expression(&expr), ctx).await?;
        let entries = if collection.is_truthy() {
            collection.entries()
        } else {
            Vec::new()
        };

        if entries.is_empty() {
            el.remove();
            return Ok(DirectiveOutcome::Detached);
        }

        el.remove_attribute(&found.name);
        let name = found
            .sub_name
            .unwrap_or_else(|| DEFAULT_ITEM_NAME.to_string());

        let mut anchor = el.clone();
        for (index, (key, item)) in entries.into_iter().enumerate() {
            let clone = el.deep_clone();
            let mut iteration = ctx.clone();
            iteration.insert(name.as_str(), item);
            iteration.insert(format!("{name}Index"), Value::from(index));
            iteration.insert(format!("{name}Number"), Value::from(index + 1));
            iteration.insert(format!("{name}Key"), Value::from(key));

            walker.process_node(&clone, &mut iteration).await?;

            anchor.insert_after(&clone);
            anchor = clone;
        }

        el.remove();
        Ok(DirectiveOutcome::Detached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::testing::RecordingWalker;
    use faintly_dom::parse_fragment;
    use pollster::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(html: &str, ctx: &mut Context) -> String {
        let root = parse_fragment(html).unwrap();
        let el = root.children().into_iter().find(Node::is_element).unwrap();
        let outcome =
            block_on(RepeatDirective.apply(&el, ctx, &RecordingWalker::allow_all())).unwrap();
        assert_eq!(outcome, DirectiveOutcome::Detached);
        root.inner_html()
    }

    #[test]
    fn test_repeat_default_name() {
        let mut ctx = Context::from_json(json!({"names": ["bob", "alice", "charlie"]}));
        let html = render(r#"<p data-fly-repeat="names">Hello, ${item}!</p>"#, &mut ctx);
        assert_eq!(html, "<p>Hello, bob!</p><p>Hello, alice!</p><p>Hello, charlie!</p>");
    }

    #[test]
    fn test_repeat_bindings() {
        let mut ctx = Context::from_json(json!({"rows": ["a", "b"]}));
        let html = render(
            r#"<i data-fly-repeat.Row="${rows}">${row}:${rowIndex}:${rowNumber}:${rowKey}</i>"#,
            &mut ctx,
        );
        assert_eq!(html, "<i>a:0:1:0</i><i>b:1:2:1</i>");
    }

    #[test]
    fn test_repeat_object_in_key_order() {
        let mut ctx = Context::from_json(json!({"langs": {"rust": "Rust", "js": "JavaScript"}}));
        let html = render(r#"<li data-fly-repeat.lang="langs">${langKey}=${lang}</li>"#, &mut ctx);
        assert_eq!(html, "<li>rust=Rust</li><li>js=JavaScript</li>");
    }

    #[test]
    fn test_repeat_string_characters() {
        let mut ctx = Context::new().with("word", "ab");
        let html = render(r#"<b data-fly-repeat="word">${item}</b>"#, &mut ctx);
        assert_eq!(html, "<b>a</b><b>b</b>");
    }

    #[test]
    fn test_empty_or_falsy_removes_element() {
        let mut ctx = Context::from_json(json!({"none": [], "zero": 0}));
        for expr in ["none", "zero", "missing"] {
            let html = render(
                &format!(r#"<p data-fly-repeat="{expr}">x</p>"#),
                &mut ctx,
            );
            assert_eq!(html, "", "{expr}");
        }
    }

    #[test]
    fn test_clones_stay_between_siblings() {
        let root = parse_fragment(r#"<a></a><p data-fly-repeat="xs">${item}</p><b></b>"#).unwrap();
        let el = root.children()[1].clone();
        let mut ctx = Context::from_json(json!({"xs": [1, 2]}));
        block_on(RepeatDirective.apply(&el, &mut ctx, &RecordingWalker::allow_all())).unwrap();
        assert_eq!(root.inner_html(), "<a></a><p>1</p><p>2</p><b></b>");
    }

    #[test]
    fn test_bindings_do_not_leak() {
        let mut ctx = Context::from_json(json!({"xs": [1]}));
        render(r#"<p data-fly-repeat="xs">${item}</p>"#, &mut ctx);
        assert!(!ctx.contains("item"));
        assert!(!ctx.contains("itemIndex"));
    }
}
