/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lenient HTML fragment parser.
//!
//! quick-xml does the tokenizing; this module applies the handful of HTML
//! rules templates rely on:
//!
//! - tag and attribute names are lower-cased
//! - void elements (`<br>`, `<img>`, ...) never take children
//! - `<script>` and `<style>` content is kept as raw text
//! - a stray end tag closes the nearest open element with that name, or is
//!   ignored when there is none
//! - elements still open at end of input are closed implicitly
//! - a `<` not followed by a letter, `/`, `!` or `?` is text
//! - named and numeric character references are decoded

use crate::error::{DomError, Result};
use crate::node::Node;
use crate::{is_raw_text_element, is_void_element};
use quick_xml::Reader;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use std::borrow::Cow;

/// Parse an HTML string into a detached fragment.
///
/// # Example
///
/// ```rust
/// use faintly_dom::parse_fragment;
///
/// let fragment = parse_fragment("<ul><li>one<li>two</ul>").unwrap();
/// assert_eq!(fragment.child_count(), 1);
/// ```
///
/// # Errors
///
/// Returns an error only when the tokenizer cannot read the input at all
/// (for example an unterminated tag or comment).
pub fn parse_fragment(source: &str) -> Result<Node> {
    let source = escape_stray_lt(source);
    HtmlParser::new(&source).parse()
}

struct HtmlParser<'a> {
    reader: Reader<&'a [u8]>,

    /// The fragment being built.
    root: Node,

    /// Open elements, innermost last.
    stack: Vec<Node>,
}

impl<'a> HtmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.trim_text_start = false;
        config.trim_text_end = false;
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        Self {
            reader,
            root: Node::fragment(),
            stack: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Node> {
        loop {
            match self.reader.read_event() {
                Ok(Event::Start(e)) => self.handle_start(&e, false)?,
                Ok(Event::Empty(e)) => self.handle_start(&e, true)?,
                Ok(Event::End(e)) => self.handle_end(&e),
                Ok(Event::Text(e)) => {
                    let raw = String::from_utf8_lossy(&e);
                    self.append_text(decode_entities(&raw));
                }
                Ok(Event::CData(e)) => {
                    self.append_text(String::from_utf8_lossy(&e).into_owned());
                }
                Ok(Event::Comment(e)) => {
                    let comment = Node::comment(String::from_utf8_lossy(&e).into_owned());
                    self.current().append_child(&comment);
                }
                Ok(Event::Decl(_) | Event::PI(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(DomError::Syntax {
                        message: err.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        Ok(self.root)
    }

    fn current(&self) -> &Node {
        self.stack.last().unwrap_or(&self.root)
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, self_closing: bool) -> Result<()> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
        let element = Node::element(&name);

        let mut attributes = e.html_attributes();
        attributes.with_checks(false);
        for attr in attributes {
            let attr = attr.map_err(|err| DomError::Attribute {
                element: name.clone(),
                message: err.to_string(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            // First occurrence wins, as in browsers
            if element.has_attribute(&key) {
                continue;
            }
            let raw = String::from_utf8_lossy(&attr.value);
            element.set_attribute(&key, decode_entities(&raw));
        }

        self.current().append_child(&element);

        if self_closing || is_void_element(&name) {
            return Ok(());
        }

        if is_raw_text_element(&name) {
            let end = e.name().as_ref().to_vec();
            let text = self
                .reader
                .read_text(QName(&end))
                .map_err(|err| DomError::Syntax {
                    message: err.to_string(),
                    position: Some(self.reader.error_position()),
                })?;
            if !text.is_empty() {
                element.append_child(&Node::text(text.into_owned()));
            }
            return Ok(());
        }

        self.stack.push(element);
        Ok(())
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
        if let Some(index) = self
            .stack
            .iter()
            .rposition(|open| open.tag_name().as_deref() == Some(name.as_str()))
        {
            self.stack.truncate(index);
        }
    }

    fn append_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        self.current().append_child(&Node::text(text));
    }
}

/// Rewrite every `<` that cannot open markup as `&lt;`.
///
/// Tags are copied with their quoted attribute values untouched, as are
/// comments and the content of raw text elements.
fn escape_stray_lt(source: &str) -> Cow<'_, str> {
    let bytes = source.as_bytes();
    let is_markup_start = |i: usize| {
        matches!(bytes.get(i + 1), Some(&b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
    };
    if !(0..bytes.len()).any(|i| bytes[i] == b'<' && !is_markup_start(i)) {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len() + 8);
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        if !is_markup_start(i) {
            out.push_str(&source[last..i]);
            out.push_str("&lt;");
            i += 1;
            last = i;
            continue;
        }
        if source[i..].starts_with("<!--") {
            i = source[i + 4..].find("-->").map_or(bytes.len(), |end| i + 4 + end + 3);
            continue;
        }

        // Skip to the end of the tag, honouring quotes
        let start = i;
        let mut quote = None;
        i += 1;
        while i < bytes.len() {
            match (quote, bytes[i]) {
                (None, b'"' | b'\'') => quote = Some(bytes[i]),
                (Some(q), b) if b == q => quote = None,
                (None, b'>') => break,
                _ => {}
            }
            i += 1;
        }
        let tag = &source[start..i.min(bytes.len())];
        i += 1;

        let name: String = tag[1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if is_raw_text_element(&name) && !tag.ends_with('/') {
            let close = format!("</{name}");
            i = source
                .get(i..)
                .and_then(|rest| rest.to_ascii_lowercase().find(&close))
                .map_or(bytes.len(), |end| i + end);
        }
    }
    out.push_str(&source[last..]);
    Cow::Owned(out)
}

/// Decode character references. An `&` that does not start a known
/// reference is kept as text.
fn decode_entities(raw: &str) -> String {
    if let Ok(text) = unescape_with(raw, resolve_html5_entity) {
        return text.into_owned();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let reference = rest[1..]
            .find(';')
            .filter(|&end| end > 0 && end <= 32)
            .map(|end| &rest[..end + 2])
            .and_then(|candidate| {
                let text = unescape_with(candidate, resolve_html5_entity).ok()?;
                Some((candidate.len(), text))
            });
        match reference {
            Some((len, text)) => {
                out.push_str(&text);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
