/*
 * directives/content.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{CONTENT_ATTR, Directive, DirectiveOutcome, Walker};
use crate::Result;
use crate::context::Context;
use crate::expression::{resolve_expression, unwrap_expression};
use crate::value::Value;
use async_trait::async_trait;
use faintly_dom::{DomError, Node};

/// `data-fly-content`: replace the element's children.
///
/// Nodes are inserted as they are (a fragment contributes its children);
/// arrays contribute each member; any other value becomes a single text
/// node and is never parsed as markup. `undefined` empties the element. The
/// new children are walked afterwards.
///
/// A node that is the element itself or one of its ancestors is rejected
/// with [`DomError::Hierarchy`].
pub struct ContentDirective;

#[async_trait(?Send)]
impl Directive for ContentDirective {
    fn name(&self) -> &'static str {
        "content"
    }

    fn exclusive(&self) -> bool {
        true
    }

    async fn apply(
        &self,
        el: &Node,
        ctx: &mut Context,
        _walker: &dyn Walker,
    ) -> Result<DirectiveOutcome> {
        let Some(expr) = el.attribute(CONTENT_ATTR) else {
            return Ok(DirectiveOutcome::Absent);
        };

        let content = resolve_expression(unwrap_expression(&expr), ctx).await?;
        el.remove_attribute(CONTENT_ATTR);

        let children = match content {
            Value::Undefined => Vec::new(),
            Value::Array(items) => items.iter().flat_map(content_nodes).collect(),
            other => content_nodes(&other),
        };
        if let Some(ancestor) = children.iter().find(|child| child.contains(el)) {
            return Err(DomError::Hierarchy {
                node: ancestor.tag_name().unwrap_or_else(|| "#fragment".to_string()),
                parent: el.tag_name().unwrap_or_default(),
            }
            .into());
        }
        el.replace_children(children);

        Ok(DirectiveOutcome::Applied {
            traverse_children: true,
        })
    }
}

fn content_nodes(value: &Value) -> Vec<Node> {
    match value {
        Value::Node(node) if node.is_fragment() => node.children(),
        Value::Node(node) => vec![node.clone()],
        other => vec![Node::text(other.to_string())],
    }
}
