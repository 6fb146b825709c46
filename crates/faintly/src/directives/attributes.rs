/*
 * directives/attributes.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{ATTRIBUTES_ATTR, DIRECTIVE_PREFIX, Directive, DirectiveOutcome, Walker};
use crate::Result;
use crate::context::Context;
use crate::expression::{resolve_expression, resolve_expressions, unwrap_expression};
use async_trait::async_trait;
use faintly_dom::{Node, is_valid_attribute_name};
use futures::future::join_all;

/// `data-fly-attributes`, plus `${}` placeholders in ordinary attributes.
///
/// The directive's object sets one attribute per entry: `undefined` removes
/// the attribute, anything else is stringified and set if the security
/// policy allows it, removed otherwise. Placeholders in every attribute
/// outside the `data-fly-` namespace are then resolved concurrently and the
/// substituted values checked against the policy again.
pub struct AttributesDirective;

#[async_trait(?Send)]
impl Directive for AttributesDirective {
    fn name(&self) -> &'static str {
        "attributes"
    }

    async fn apply(
        &self,
        el: &Node,
        ctx: &mut Context,
        walker: &dyn Walker,
    ) -> Result<DirectiveOutcome> {
        let had_directive = apply_attribute_object(el, ctx, walker).await?;
        let substituted = substitute_attribute_expressions(el, ctx, walker).await?;

        if had_directive || substituted {
            Ok(DirectiveOutcome::Applied {
                traverse_children: true,
            })
        } else {
            Ok(DirectiveOutcome::Absent)
        }
    }
}

async fn apply_attribute_object(el: &Node, ctx: &mut Context, walker: &dyn Walker) -> Result<bool> {
    let Some(expr) = el.attribute(ATTRIBUTES_ATTR) else {
        return Ok(false);
    };

    let data = resolve_expression(unwrap_expression(&expr), ctx).await?;
    el.remove_attribute(ATTRIBUTES_ATTR);
    if !data.is_truthy() {
        return Ok(true);
    }

    let policy = walker.security(ctx)?;
    for (name, value) in data.entries() {
        let name = name.to_ascii_lowercase();
        if !is_valid_attribute_name(&name) {
            tracing::debug!(attribute = %name, "Skipping invalid attribute name");
            continue;
        }
        if value.is_undefined() {
            el.remove_attribute(&name);
            continue;
        }
        let value = value.to_string();
        if policy.should_allow_attribute(&name, &value, ctx) {
            el.set_attribute(&name, value);
        } else {
            tracing::debug!(attribute = %name, "Attribute denied by security policy");
            el.remove_attribute(&name);
        }
    }
    Ok(true)
}

async fn substitute_attribute_expressions(
    el: &Node,
    ctx: &mut Context,
    walker: &dyn Walker,
) -> Result<bool> {
    let attributes: Vec<_> = el
        .attributes()
        .into_iter()
        .filter(|attr| !attr.name.starts_with(DIRECTIVE_PREFIX))
        .collect();

    let shared: &Context = ctx;
    let resolved = join_all(
        attributes
            .iter()
            .map(|attr| resolve_expressions(&attr.value, shared)),
    )
    .await;

    let mut substituted = false;
    for (attr, result) in attributes.iter().zip(resolved) {
        let result = result?;
        if !result.updated {
            continue;
        }
        substituted = true;
        let policy = walker.security(ctx)?;
        if policy.should_allow_attribute(&attr.name, &result.text, ctx) {
            el.set_attribute(&attr.name, result.text);
        } else {
            tracing::debug!(attribute = %attr.name, "Substituted attribute denied by security policy");
            el.remove_attribute(&attr.name);
        }
    }
    Ok(substituted)
}
