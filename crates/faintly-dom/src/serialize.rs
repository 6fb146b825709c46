/*
 * serialize.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! HTML serialization.

use crate::node::{Node, NodeKind};
use crate::{is_raw_text_element, is_void_element};
use quick_xml::escape::{escape, partial_escape};

impl Node {
    /// Serialize this node and its subtree.
    ///
    /// A fragment serializes as its children.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out, false);
        out
    }

    /// Serialize the children of this node.
    pub fn inner_html(&self) -> String {
        let raw_text = self
            .tag_name()
            .is_some_and(|name| is_raw_text_element(&name));
        let mut out = String::new();
        for child in self.children() {
            write_node(&child, &mut out, raw_text);
        }
        out
    }
}

fn write_node(node: &Node, out: &mut String, raw_text: bool) {
    match node.kind() {
        NodeKind::Fragment => {
            for child in node.children() {
                write_node(&child, out, false);
            }
        }
        NodeKind::Element { name, attributes } => {
            out.push('<');
            out.push_str(&name);
            for attr in &attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape(attr.value.as_str()));
                out.push('"');
            }
            out.push('>');

            if is_void_element(&name) {
                return;
            }

            let raw = is_raw_text_element(&name);
            for child in node.children() {
                write_node(&child, out, raw);
            }

            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        }
        NodeKind::Text(text) if raw_text => out.push_str(&text),
        NodeKind::Text(text) => out.push_str(&partial_escape(text.as_str())),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(&text);
            out.push_str("-->");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Node, parse_fragment};

    #[test]
    fn test_round_trips_simple_markup() {
        let source = r#"<ul class="list"><li>a</li><li>b</li></ul>"#;
        let fragment = parse_fragment(source).unwrap();
        insta::assert_snapshot!(fragment.outer_html(), @r#"<ul class="list"><li>a</li><li>b</li></ul>"#);
    }

    #[test]
    fn test_void_and_boolean_attributes() {
        let fragment = parse_fragment("<p>x<br><input disabled></p>").unwrap();
        insta::assert_snapshot!(fragment.inner_html(), @r#"<p>x<br><input disabled=""></p>"#);
    }

    #[test]
    fn test_text_is_escaped() {
        let div = Node::element("div");
        div.set_text_content("<script>alert(1)</script> & more");
        assert_eq!(
            div.outer_html(),
            "<div>&lt;script&gt;alert(1)&lt;/script&gt; &amp; more</div>"
        );
    }

    #[test]
    fn test_attribute_quotes_escaped() {
        let a = Node::element("a");
        a.set_attribute("title", r#"say "hi""#);
        assert_eq!(a.outer_html(), r#"<a title="say &quot;hi&quot;"></a>"#);
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let fragment = parse_fragment("<style>a > b { color: red; }</style>").unwrap();
        assert_eq!(
            fragment.outer_html(),
            "<style>a > b { color: red; }</style>"
        );
    }

    #[test]
    fn test_comments_preserved() {
        let fragment = parse_fragment("<div><!-- keep --></div>").unwrap();
        assert_eq!(fragment.inner_html(), "<div><!-- keep --></div>");
    }
}
