/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render entry points and the tree walk.
//!
//! [`Renderer`] owns the template resolver, the render options and the
//! directive pipeline. A render:
//!
//! 1. resolves the security policy once and stores it in the context
//! 2. resolves the context's template
//! 3. walks a clone of the template's content depth-first, running the
//!    directive pipeline on elements and resolving placeholders in text
//! 4. unwraps marked elements
//! 5. replaces the target element's children with the result
//!
//! Children are walked sequentially in document order, so a context value
//! stored by one sibling (e.g. `data-fly-test.name`) is visible to the next.

use crate::Result;
use crate::config::RenderOptions;
use crate::context::Context;
use crate::directives::{DirectivePipeline, Walker, process_unwraps};
use crate::expression::process_text_expressions;
use crate::security::SecurityPolicy;
use crate::template::{CachingResolver, FileSystemSource, TemplateResolver};
use async_trait::async_trait;
use faintly_dom::{Node, NodeType};
use std::path::PathBuf;
use std::rc::Rc;

/// Attribute carrying a block's name.
pub const BLOCK_NAME_ATTR: &str = "data-block-name";

/// Renders elements from templates.
///
/// ```rust
/// use faintly::{CachingResolver, Context, MemorySource, RenderOptions, Renderer};
/// use faintly_dom::Node;
///
/// let source = MemorySource::new().with(
///     "/blocks/hello/hello.html",
///     r#"<template><p data-fly-repeat="names">Hello, ${item}!</p></template>"#,
/// );
/// let renderer = Renderer::new(CachingResolver::new(source), RenderOptions::default());
///
/// let block = Node::element("div");
/// block.set_attribute("data-block-name", "hello");
/// let mut ctx = Context::from_json(serde_json::json!({"names": ["bob", "alice"]}));
///
/// pollster::block_on(renderer.render_block(&block, &mut ctx)).unwrap();
/// assert_eq!(block.inner_html(), "<p>Hello, bob!</p><p>Hello, alice!</p>");
/// ```
pub struct Renderer {
    resolver: Box<dyn TemplateResolver>,
    options: RenderOptions,
    pipeline: DirectivePipeline,
}

impl Renderer {
    pub fn new(resolver: impl TemplateResolver + 'static, options: RenderOptions) -> Self {
        Self {
            resolver: Box::new(resolver),
            options,
            pipeline: DirectivePipeline::standard(),
        }
    }

    /// A renderer loading template documents from a directory, with URL
    /// paths mapped below `root`.
    pub fn from_directory(root: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self::new(CachingResolver::new(FileSystemSource::new(root)), options)
    }

    /// Replace the directive pipeline.
    pub fn with_pipeline(mut self, pipeline: DirectivePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn pipeline(&self) -> &DirectivePipeline {
        &self.pipeline
    }

    /// The context's security policy, resolving it from its security mode
    /// when the context has none yet.
    ///
    /// # Errors
    ///
    /// Fails when the default policy's patterns do not compile or, under
    /// strict hook checking, when custom hooks are incomplete.
    pub fn initialize_security(&self, ctx: &mut Context) -> Result<Rc<dyn SecurityPolicy>> {
        if let Some(policy) = ctx.policy() {
            return Ok(policy);
        }
        let policy = ctx.security_mode().resolve(
            &self.options.security,
            &self.options.environment,
            self.options.hook_strictness,
        )?;
        ctx.set_policy(Rc::clone(&policy));
        Ok(policy)
    }

    /// Render a `<template>` element: walk a clone of its content and return
    /// the processed fragment. The template itself is left untouched.
    pub async fn render_template(&self, template: &Node, ctx: &mut Context) -> Result<Node> {
        let fragment = Node::fragment();
        fragment.append_children(template.deep_clone().children());

        self.process_node(&fragment, ctx).await?;
        process_unwraps(&fragment);

        Ok(fragment)
    }

    /// Render the context's template into `el`, replacing its children.
    pub async fn render_element(&self, el: &Node, ctx: &mut Context) -> Result<()> {
        Walker::render_element(self, el, ctx).await
    }

    /// Render a block element.
    ///
    /// Sets `block` and `blockName` (from the `data-block-name` attribute)
    /// on the context and defaults `codeBasePath` from the environment, so
    /// the template path follows the block naming convention unless the
    /// context names a template explicitly.
    pub async fn render_block(&self, block: &Node, ctx: &mut Context) -> Result<()> {
        ctx.set_block(block.clone());
        if let Some(name) = block.attribute(BLOCK_NAME_ATTR) {
            ctx.set_block_name(name);
        }
        if ctx.code_base_path().is_none() {
            ctx.set_code_base_path(self.options.environment.code_base_path());
        }

        tracing::debug!(block = ?ctx.block_name(), "Rendering block");
        self.render_element(block, ctx).await
    }

    /// Process a node and its subtree in place.
    pub async fn process_node(&self, node: &Node, ctx: &mut Context) -> Result<()> {
        Walker::process_node(self, node, ctx).await
    }
}

#[async_trait(?Send)]
impl Walker for Renderer {
    async fn process_node(&self, node: &Node, ctx: &mut Context) -> Result<()> {
        ctx.set_current_node(node.clone());

        match node.node_type() {
            NodeType::Element => {
                let traverse = self.pipeline.execute(node, ctx, self).await?;
                // Nested template content is inert until it is itself rendered
                if !traverse || node.tag_name().as_deref() == Some("template") {
                    return Ok(());
                }
            }
            NodeType::Text => {
                process_text_expressions(node, ctx).await?;
                return Ok(());
            }
            NodeType::Comment => return Ok(()),
            NodeType::Fragment => {}
        }

        for child in node.children() {
            Walker::process_node(self, &child, ctx).await?;
        }
        Ok(())
    }

    async fn render_element(&self, el: &Node, ctx: &mut Context) -> Result<()> {
        if !self.options.allow_unsafe_eval {
            ctx.disable_unsafe_eval();
        }
        let policy = self.initialize_security(ctx)?;
        let template = self.resolver.resolve_template(ctx, policy.as_ref()).await?;

        let rendered = self.render_template(&template, ctx).await?;
        el.replace_children(rendered.children());
        Ok(())
    }

    fn security(&self, ctx: &mut Context) -> Result<Rc<dyn SecurityPolicy>> {
        self.initialize_security(ctx)
    }
}
