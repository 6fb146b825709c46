/*
 * directives/unwrap.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{Directive, DirectiveOutcome, UNWRAP_ATTR, Walker};
use crate::Result;
use crate::context::Context;
use crate::expression::{resolve_expression, unwrap_expression};
use async_trait::async_trait;
use faintly_dom::Node;

/// `data-fly-unwrap`: mark an element to be replaced by its children.
///
/// An empty value always unwraps. Otherwise the expression decides, and a
/// falsy result drops the marker. The replacement itself happens in
/// [`process_unwraps`] once the whole fragment has been walked.
pub struct UnwrapDirective;

#[async_trait(?Send)]
impl Directive for UnwrapDirective {
    fn name(&self) -> &'static str {
        "unwrap"
    }

    async fn apply(
        &self,
        el: &Node,
        ctx: &mut Context,
        _walker: &dyn Walker,
    ) -> Result<DirectiveOutcome> {
        let Some(expr) = el.attribute(UNWRAP_ATTR) else {
            return Ok(DirectiveOutcome::Absent);
        };

        if !expr.is_empty() && !resolve_expression(unwrap_expression(&expr), ctx).await?.is_truthy()
        {
            el.remove_attribute(UNWRAP_ATTR);
        }

        Ok(DirectiveOutcome::Applied {
            traverse_children: true,
        })
    }
}

/// Replace every element still marked with `data-fly-unwrap` by its
/// children, in document order. Content of nested `<template>` elements is
/// left alone.
pub fn process_unwraps(root: &Node) {
    for el in root.elements_with_attribute(UNWRAP_ATTR) {
        for child in el.children() {
            el.insert_before(&child);
        }
        el.remove();
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

    #[test]
    fn test_marker_kept_or_dropped() {
        let root = parse_fragment(
            r#"<p data-fly-unwrap="">a</p><p data-fly-unwrap="yes">b</p><p data-fly-unwrap="no">c</p>"#,
        )
        .unwrap();
        let mut ctx = Context::from_json(json!({"yes": 1, "no": 0}));
        let walker = RecordingWalker::allow_all();
        for el in root.children() {
            block_on(UnwrapDirective.apply(&el, &mut ctx, &walker)).unwrap();
        }
        assert_eq!(
            root.inner_html(),
            r#"<p data-fly-unwrap="">a</p><p data-fly-unwrap="yes">b</p><p>c</p>"#
        );
    }

    #[test]
    fn test_nested_unwraps_promote_leaves_in_order() {
        let root = parse_fragment(
            r#"<section><div data-fly-unwrap>1<span data-fly-unwrap><b>2</b>3</span>4</div></section>"#,
        )
        .unwrap();
        process_unwraps(&root);
        assert_eq!(root.inner_html(), "<section>1<b>2</b>34</section>");
    }

    #[test]
    fn test_template_content_not_unwrapped() {
        let root = parse_fragment(
            r#"<template data-fly-name="x"><div data-fly-unwrap>a</div></template><p data-fly-unwrap>b</p>"#,
        )
        .unwrap();
        process_unwraps(&root);
        assert_eq!(
            root.inner_html(),
            r#"<template data-fly-name="x"><div data-fly-unwrap="">a</div></template>b"#
        );
    }

    #[test]
    fn test_top_level_unwrap() {
        let fragment = parse_fragment(r#"<div data-fly-unwrap><i>x</i></div><p>y</p>"#).unwrap();
        process_unwraps(&fragment);
        assert_eq!(fragment.inner_html(), "<i>x</i><p>y</p>");
    }
}
