/*
 * node.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The mutable node tree.
//!
//! A [`Node`] is a shared handle (`Rc<RefCell<..>>`) to one node of the tree.
//! Parents own their children; children hold a weak back-reference to their
//! parent. Inserting a node that already has a parent moves it, exactly like
//! the browser DOM does.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name, lower-cased.
    pub name: String,
    /// Attribute value, entities already decoded.
    pub value: String,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A parentless container for a sequence of nodes (template content).
    Fragment,

    /// An element with its tag name and attributes in source order.
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },

    /// Character data.
    Text(String),

    /// A comment.
    Comment(String),
}

/// The coarse type of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Fragment,
}

struct NodeData {
    kind: NodeKind,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<Node>,
}

/// A handle to a node in an HTML tree.
///
/// Cloning the handle does not clone the node; use [`Node::deep_clone`] for
/// that.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node(Rc::new(RefCell::new(NodeData {
            kind,
            parent: Weak::new(),
            children: Vec::new(),
        })))
    }

    /// Create a detached element. The tag name is lower-cased.
    pub fn element(name: impl Into<String>) -> Self {
        Self::new(NodeKind::Element {
            name: name.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(text.into()))
    }

    /// Create a detached comment node.
    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Comment(text.into()))
    }

    /// Create an empty fragment.
    pub fn fragment() -> Self {
        Self::new(NodeKind::Fragment)
    }

    pub fn node_type(&self) -> NodeType {
        match self.0.borrow().kind {
            NodeKind::Fragment => NodeType::Fragment,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
        }
    }

    /// A copy of this node's own payload (no children).
    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind.clone()
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type() == NodeType::Text
    }

    pub fn is_fragment(&self) -> bool {
        self.node_type() == NodeType::Fragment
    }

    /// The lower-cased tag name, for elements.
    pub fn tag_name(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    /// Identity comparison of two handles.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ─── attributes ────────────────────────────────────────────────────────

    /// Get an attribute value by (case-insensitive) name.
    pub fn attribute(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        match &self.0.borrow().kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.clone()),
            _ => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Set an attribute, keeping its position if it already exists.
    ///
    /// Does nothing on non-element nodes.
    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if let NodeKind::Element { attributes, .. } = &mut self.0.borrow_mut().kind {
            match attributes.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => attributes.push(Attribute { name, value }),
            }
        }
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attribute(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        if let NodeKind::Element { attributes, .. } = &mut self.0.borrow_mut().kind {
            let before = attributes.len();
            attributes.retain(|a| a.name != name);
            return attributes.len() != before;
        }
        false
    }

    /// Attribute names in source order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes().into_iter().map(|a| a.name).collect()
    }

    /// A snapshot of the element's attributes.
    pub fn attributes(&self) -> Vec<Attribute> {
        match &self.0.borrow().kind {
            NodeKind::Element { attributes, .. } => attributes.clone(),
            _ => Vec::new(),
        }
    }

    /// Whether the whitespace-separated `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    // ─── tree structure ────────────────────────────────────────────────────

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.upgrade().map(Node)
    }

    /// A snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.borrow().children.first().cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Append `child` as the last child, detaching it from any previous parent.
    ///
    /// Does nothing when `child` is this node or one of its ancestors.
    pub fn append_child(&self, child: &Node) {
        if child.contains(self) {
            return;
        }
        child.remove();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    pub fn append_children(&self, children: impl IntoIterator<Item = Node>) {
        for child in children {
            self.append_child(&child);
        }
    }

    /// Replace all children with `children`, in order. This node and its
    /// ancestors are skipped.
    pub fn replace_children(&self, children: impl IntoIterator<Item = Node>) {
        let incoming: Vec<Node> = children
            .into_iter()
            .filter(|child| !child.contains(self))
            .collect();
        for child in &incoming {
            child.remove();
        }

        let old = std::mem::take(&mut self.0.borrow_mut().children);
        for child in old {
            child.0.borrow_mut().parent = Weak::new();
        }

        self.append_children(incoming);
    }

    /// Detach this node from its parent. No-op for detached nodes.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent
                .0
                .borrow_mut()
                .children
                .retain(|c| !c.ptr_eq(self));
        }
        self.0.borrow_mut().parent = Weak::new();
    }

    /// Insert `node` as the next sibling of this node.
    ///
    /// Does nothing when this node has no parent.
    pub fn insert_after(&self, node: &Node) {
        self.insert_sibling(node, 1);
    }

    /// Insert `node` as the previous sibling of this node.
    ///
    /// Does nothing when this node has no parent.
    pub fn insert_before(&self, node: &Node) {
        self.insert_sibling(node, 0);
    }

    fn insert_sibling(&self, node: &Node, offset: usize) {
        let Some(parent) = self.parent() else {
            return;
        };
        if node.ptr_eq(self) || node.contains(&parent) {
            return;
        }
        node.remove();

        {
            let mut data = parent.0.borrow_mut();
            let index = data
                .children
                .iter()
                .position(|c| c.ptr_eq(self))
                .map_or(data.children.len(), |i| i + offset);
            data.children.insert(index, node.clone());
        }
        node.0.borrow_mut().parent = Rc::downgrade(&parent.0);
    }

    /// Recursively copy this node and its subtree. The copy is detached.
    pub fn deep_clone(&self) -> Node {
        let data = self.0.borrow();
        let copy = Node::new(data.kind.clone());
        for child in &data.children {
            copy.append_child(&child.deep_clone());
        }
        copy
    }

    // ─── text ──────────────────────────────────────────────────────────────

    /// Text of this node: its own data for text and comment nodes, the
    /// concatenated descendant text otherwise.
    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::Element { .. } | NodeKind::Fragment => {
                let mut out = String::new();
                for child in &data.children {
                    child.collect_text(&mut out);
                }
                out
            }
        }
    }

    fn collect_text(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            NodeKind::Element { .. } | NodeKind::Fragment => {
                for child in &data.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Set the text of this node.
    ///
    /// For text and comment nodes this replaces the data; for elements and
    /// fragments it replaces all children with a single text node (or none
    /// when `text` is empty).
    pub fn set_text_content(&self, text: impl Into<String>) {
        let text = text.into();
        {
            let mut data = self.0.borrow_mut();
            match &mut data.kind {
                NodeKind::Text(existing) | NodeKind::Comment(existing) => {
                    *existing = text;
                    return;
                }
                NodeKind::Element { .. } | NodeKind::Fragment => {}
            }
        }
        if text.is_empty() {
            self.replace_children(Vec::new());
        } else {
            self.replace_children(vec![Node::text(text)]);
        }
    }

    // ─── queries ───────────────────────────────────────────────────────────

    /// All descendants in document (pre-)order, excluding this node.
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants(&self, out: &mut Vec<Node>) {
        for child in self.children() {
            out.push(child.clone());
            child.collect_descendants(out);
        }
    }

    /// Descendant elements carrying attribute `name`, in document order.
    ///
    /// The content of `<template>` descendants is not searched.
    pub fn elements_with_attribute(&self, name: &str) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_with_attribute(name, &mut out);
        out
    }

    fn collect_with_attribute(&self, name: &str, out: &mut Vec<Node>) {
        for child in self.children() {
            if child.has_attribute(name) {
                out.push(child.clone());
            }
            if child.tag_name().as_deref() != Some("template") {
                child.collect_with_attribute(name, out);
            }
        }
    }

    /// First descendant element with the given class.
    pub fn find_by_class(&self, class: &str) -> Option<Node> {
        self.descendants().into_iter().find(|n| n.has_class(class))
    }

    /// First descendant element with the given tag name.
    pub fn find_by_tag(&self, tag: &str) -> Option<Node> {
        self.descendants()
            .into_iter()
            .find(|n| n.tag_name().as_deref() == Some(tag))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Node")
            .field("kind", &data.kind)
            .field("children", &data.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> (Node, Node, Node, Node) {
        let ul = Node::element("ul");
        let a = Node::element("li");
        a.append_child(&Node::text("a"));
        let b = Node::element("li");
        b.append_child(&Node::text("b"));
        let c = Node::element("li");
        c.append_child(&Node::text("c"));
        ul.append_children([a.clone(), b.clone(), c.clone()]);
        (ul, a, b, c)
    }

    #[test]
    fn test_attributes_keep_position() {
        let el = Node::element("DIV");
        assert_eq!(el.tag_name().as_deref(), Some("div"));

        el.set_attribute("class", "one");
        el.set_attribute("ID", "x");
        el.set_attribute("class", "two");

        assert_eq!(el.attribute_names(), vec!["class", "id"]);
        assert_eq!(el.attribute("class").as_deref(), Some("two"));
        assert!(el.remove_attribute("Class"));
        assert!(!el.remove_attribute("class"));
        assert_eq!(el.attribute_names(), vec!["id"]);
    }

    #[test]
    fn test_append_moves_node() {
        let (ul, a, _b, _c) = list();
        let other = Node::element("div");
        other.append_child(&a);

        assert_eq!(ul.child_count(), 2);
        assert!(a.parent().unwrap().ptr_eq(&other));
        assert_eq!(ul.text_content(), "bc");
    }

    #[test]
    fn test_insert_after_and_before() {
        let (ul, a, b, _c) = list();
        let x = Node::element("li");
        x.append_child(&Node::text("x"));
        a.insert_after(&x);
        assert_eq!(ul.text_content(), "axbc");

        let y = Node::text("y");
        b.insert_before(&y);
        assert_eq!(ul.text_content(), "axybc");
    }

    #[test]
    fn test_remove_detaches() {
        let (ul, _a, b, _c) = list();
        b.remove();
        assert!(b.parent().is_none());
        assert_eq!(ul.text_content(), "ac");

        // Removing a detached node is harmless
        b.remove();
    }

    #[test]
    fn test_replace_children_with_existing_child() {
        let (ul, a, _b, c) = list();
        ul.replace_children(vec![c.clone(), a.clone()]);
        assert_eq!(ul.text_content(), "ca");
        assert!(c.parent().unwrap().ptr_eq(&ul));
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let (ul, a, _b, _c) = list();
        a.set_attribute("data-x", "1");
        let copy = ul.deep_clone();

        assert!(copy.parent().is_none());
        assert_eq!(copy.text_content(), "abc");

        copy.first_child().unwrap().set_text_content("changed");
        assert_eq!(ul.text_content(), "abc");
        assert_eq!(
            copy.first_child().unwrap().attribute("data-x").as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_set_text_content_on_element() {
        let (ul, _a, _b, _c) = list();
        ul.set_text_content("");
        assert_eq!(ul.child_count(), 0);

        ul.set_text_content("<b>not markup</b>");
        assert_eq!(ul.child_count(), 1);
        assert!(ul.first_child().unwrap().is_text());
    }

    #[test]
    fn test_elements_with_attribute_in_document_order() {
        let root = Node::fragment();
        let outer = Node::element("div");
        outer.set_attribute("data-mark", "");
        let inner = Node::element("span");
        inner.set_attribute("data-mark", "");
        outer.append_child(&inner);
        let sibling = Node::element("p");
        sibling.set_attribute("data-mark", "");
        root.append_children([outer.clone(), sibling.clone()]);

        let found = root.elements_with_attribute("data-mark");
        assert_eq!(found.len(), 3);
        assert!(found[0].ptr_eq(&outer));
        assert!(found[1].ptr_eq(&inner));
        assert!(found[2].ptr_eq(&sibling));
    }

    #[test]
    fn test_elements_with_attribute_skips_template_content() {
        let root = Node::fragment();
        let template = Node::element("template");
        template.set_attribute("data-mark", "");
        let hidden = Node::element("div");
        hidden.set_attribute("data-mark", "");
        template.append_child(&hidden);
        root.append_child(&template);

        let found = root.elements_with_attribute("data-mark");
        assert_eq!(found.len(), 1);
        assert!(found[0].ptr_eq(&template));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let (ul, a, _, _) = list();
        assert!(ul.contains(&ul));
        assert!(ul.contains(&a));
        assert!(ul.contains(&a.first_child().unwrap()));
        assert!(!a.contains(&ul));
    }

    #[test]
    fn test_ancestors_cannot_become_children() {
        let (ul, a, b, _) = list();
        let root = Node::fragment();
        root.append_child(&ul);

        a.append_child(&ul);
        a.append_child(&root);
        b.insert_before(&ul);
        a.replace_children([ul.clone()]);

        assert!(ul.parent().is_some_and(|p| p.ptr_eq(&root)));
        assert_eq!(ul.child_count(), 3);
        assert_eq!(a.child_count(), 0);
    }

    #[test]
    fn test_has_class() {
        let el = Node::element("div");
        el.set_attribute("class", "card  featured");
        assert!(el.has_class("featured"));
        assert!(!el.has_class("feat"));
    }
}
