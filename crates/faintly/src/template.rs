/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template resolution.
//!
//! A template document is an HTML file holding one or more `<template>`
//! elements; a `data-fly-name` attribute names all but the default one. The
//! renderer asks a [`TemplateResolver`] for the template element described by
//! the context and renders a deep clone of it, so stored templates are never
//! mutated.

use crate::context::Context;
use crate::error::TemplateError;
use crate::security::SecurityPolicy;
use crate::value::Value;
use async_trait::async_trait;
use faintly_dom::{Node, parse_fragment};
use once_cell::sync::Lazy;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

/// Attribute naming a template within its document.
pub const TEMPLATE_NAME_ATTR: &str = "data-fly-name";

/// Identifies a template: a document path and an optional template name
/// within it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateDescriptor {
    pub path: Option<String>,
    pub name: Option<String>,
}

impl TemplateDescriptor {
    /// Empty strings count as absent.
    pub fn new(path: impl Into<String>, name: Option<&str>) -> Self {
        let path = path.into();
        Self {
            path: (!path.is_empty()).then_some(path),
            name: name.filter(|n| !n.is_empty()).map(String::from),
        }
    }

    /// Parse a `path[#name]` reference.
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('#') {
            Some((path, name)) => Self::new(path, Some(name)),
            None => Self::new(reference, None),
        }
    }

    /// The id the template is registered under.
    pub fn id(&self) -> String {
        template_id(
            self.path.as_deref().unwrap_or(""),
            self.name.as_deref().unwrap_or(""),
        )
    }

    /// The descriptor as an object value with `path` and `name` members.
    pub fn to_value(&self) -> Value {
        let member = |v: &Option<String>| v.clone().map(Value::String).unwrap_or_default();
        Value::object([("path", member(&self.path)), ("name", member(&self.name))])
    }
}

/// `{code_base_path}/blocks/{block}/{block}.html`
pub fn default_template_path(code_base_path: &str, block_name: &str) -> String {
    format!("{code_base_path}/blocks/{block_name}/{block_name}.html")
}

/// The registration id of template `name` in document `path`: lower-cased,
/// with every character other than `a-z` and `0-9` replaced by `-`.
pub fn template_id(path: &str, name: &str) -> String {
    format!("faintly-template-{path}#{name}")
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Returns the `<template>` element to render for a context.
#[async_trait(?Send)]
pub trait TemplateResolver {
    /// Resolve the template described by `ctx`.
    ///
    /// Implementations fill in a default descriptor path when the context has
    /// none and must check `policy.allow_include_path` before fetching.
    async fn resolve_template(
        &self,
        ctx: &mut Context,
        policy: &dyn SecurityPolicy,
    ) -> Result<Node, TemplateError>;
}

/// Loads template documents by path.
#[async_trait(?Send)]
pub trait TemplateSource {
    /// Fetch the document at `path`, or `None` when there is none.
    async fn fetch(&self, path: &str) -> Result<Option<String>, TemplateError>;
}

/// Template documents held in memory, keyed by path.
///
/// Useful for tests and for templates bundled into an application.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
    fetches: Cell<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, markup: impl Into<String>) -> &mut Self {
        self.documents.insert(path.into(), markup.into());
        self
    }

    /// Builder form of [`MemorySource::add`].
    pub fn with(mut self, path: impl Into<String>, markup: impl Into<String>) -> Self {
        self.add(path, markup);
        self
    }

    /// How many fetches have been served.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

#[async_trait(?Send)]
impl TemplateSource for MemorySource {
    async fn fetch(&self, path: &str) -> Result<Option<String>, TemplateError> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.documents.get(path).cloned())
    }
}

static PATH_BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("path base is a valid URL"));

/// Template documents read from a directory that plays the site root.
///
/// The URL path of a template (`/code/blocks/card/card.html`) maps to the file
/// at the same relative location under the root. Dot segments are resolved
/// before mapping, so paths cannot leave the root.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The file a template path maps to.
    pub fn file_path(&self, path: &str) -> Option<PathBuf> {
        let url = PATH_BASE.join(path).ok()?;
        let mut file = self.root.clone();
        for segment in url.path_segments()?.filter(|s| !s.is_empty()) {
            file.push(segment);
        }
        Some(file)
    }
}

#[async_trait(?Send)]
impl TemplateSource for FileSystemSource {
    async fn fetch(&self, path: &str) -> Result<Option<String>, TemplateError> {
        let Some(file) = self.file_path(path) else {
            return Ok(None);
        };
        match std::fs::read_to_string(&file) {
            Ok(markup) => Ok(Some(markup)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TemplateError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

/// Resolver that fetches each document once and keeps its templates.
pub struct CachingResolver<S> {
    source: S,
    cache: RefCell<HashMap<String, Node>>,
}

impl<S: TemplateSource> CachingResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of cached templates.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    fn lookup(&self, id: &str) -> Option<Node> {
        self.cache.borrow().get(id).cloned()
    }

    /// Register every top-level `<template>` of a document. Templates already
    /// registered under the same id are kept.
    fn register(&self, path: &str, document: &Node) -> usize {
        let mut templates = Vec::new();
        collect_templates(document, &mut templates);

        let mut cache = self.cache.borrow_mut();
        for template in &templates {
            let name = template.attribute(TEMPLATE_NAME_ATTR).unwrap_or_default();
            let id = template_id(path, &name);
            template.set_attribute("id", id.as_str());
            cache.entry(id).or_insert_with(|| template.clone());
        }
        templates.len()
    }
}

fn collect_templates(node: &Node, out: &mut Vec<Node>) {
    for child in node.children() {
        if child.tag_name().as_deref() == Some("template") {
            out.push(child);
        } else {
            collect_templates(&child, out);
        }
    }
}

#[async_trait(?Send)]
impl<S: TemplateSource> TemplateResolver for CachingResolver<S> {
    async fn resolve_template(
        &self,
        ctx: &mut Context,
        policy: &dyn SecurityPolicy,
    ) -> Result<Node, TemplateError> {
        let block_name = ctx.block_name().unwrap_or("").to_string();
        let mut descriptor = ctx.template().cloned().unwrap_or_default();
        let path = match &descriptor.path {
            Some(path) => path.clone(),
            None => {
                let path = default_template_path(ctx.code_base_path().unwrap_or(""), &block_name);
                descriptor.path = Some(path.clone());
                path
            }
        };
        ctx.set_template(descriptor.clone());

        if !policy.allow_include_path(&path, ctx) {
            tracing::warn!(path = %path, "Blocked template fetch outside allowed scope");
            return Err(TemplateError::Blocked { path });
        }

        let id = descriptor.id();
        if let Some(template) = self.lookup(&id) {
            tracing::debug!(id = %id, "Template cache hit");
            return Ok(template);
        }

        let markup = self
            .source
            .fetch(&path)
            .await?
            .ok_or_else(|| TemplateError::FetchFailed {
                path: path.clone(),
                block_name: block_name.clone(),
            })?;
        let document = parse_fragment(&markup).map_err(|source| TemplateError::Parse {
            path: path.clone(),
            source,
        })?;

        let count = self.register(&path, &document);
        tracing::debug!(path = %path, templates = count, "Loaded template document");

        self.lookup(&id).ok_or(TemplateError::NotFound { id })
    }
}
