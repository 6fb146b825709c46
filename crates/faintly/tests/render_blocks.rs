/*
 * render_blocks.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end block rendering against the template fixtures.
 */

use faintly::{Context, RenderError, RenderOptions, Renderer, SecurityMode, TemplateError};
use faintly_dom::Node;
use pollster::block_on;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;

fn renderer() -> Renderer {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    Renderer::from_directory(fixtures, RenderOptions::default())
}

fn block(name: &str) -> Node {
    let el = Node::element("div");
    el.set_attribute("class", name);
    el.set_attribute("data-block-name", name);
    el
}

fn render(name: &str, ctx: &mut Context) -> String {
    let el = block(name);
    block_on(renderer().render_block(&el, ctx)).expect("render failed");
    el.inner_html()
}

#[test]
fn cards_repeat_include_and_unwrap() {
    let mut ctx = Context::from_json(json!({
        "cards": [
            {"title": "One", "badge": "new"},
            {"title": "Two<b>"},
        ]
    }));

    assert_eq!(
        render("cards", &mut ctx),
        concat!(
            r#"<ul class="cards">"#,
            r#"<li class="card card-1"><h3>One</h3><span class="badge">new</span></li>"#,
            r#"<li class="card card-2"><h3>Two&lt;b&gt;</h3></li>"#,
            "</ul>",
        )
    );
}

#[test]
fn cards_fallback_when_empty() {
    let mut ctx = Context::from_json(json!({"cards": []}));
    assert_eq!(render("cards", &mut ctx), "<p>No cards</p>");

    assert_eq!(render("cards", &mut Context::new()), "<p>No cards</p>");
}

#[test]
fn includes_are_rendered_once_and_gated() {
    let mut ctx = Context::from_json(json!({
        "heading": "Welcome",
        "body": "Body text",
        "count": 3,
    }));

    assert_eq!(
        render("page", &mut ctx),
        concat!(
            // Escaped placeholders inside the included template stay literal
            "<header><h1>Welcome</h1><small>${raw}</small></header>",
            // Content wins over include; the include attribute is left alone
            r#"<main data-fly-include="/blocks/page/parts.html#title">Body text</main>"#,
            // Outside the block's directory: blocked, children untouched
            "<aside>untouched</aside>",
            "<p>${literal} 3</p>",
        )
    );
}

#[test]
fn nested_unwraps_promote_content() {
    let mut ctx = Context::from_json(json!({"flag": true, "off": 0}));
    assert_eq!(
        render("wrap", &mut ctx),
        "<section>1<b>2</b>34<em>5</em></section>"
    );
}

#[test]
fn attributes_filtered_by_default_policy() {
    let mut ctx = Context::from_json(json!({
        "links": [
            {"href": "https://example.com", "label": "ok", "attrs": {"target": "_blank", "onclick": "x()"}},
            {"href": "javascript:alert(1)", "label": "bad"},
            {"href": "/local", "label": "rel", "attrs": {"title": "T"}},
        ]
    }));

    assert_eq!(
        render("links", &mut ctx),
        concat!(
            r#"<a href="https://example.com" target="_blank">ok</a>"#,
            "<a>bad</a>",
            r#"<a href="/local" title="T">rel</a>"#,
        )
    );
}

#[test]
fn unsafe_mode_skips_checks() {
    let mut ctx = Context::from_json(json!({
        "links": [
            {"href": "javascript:alert(1)", "label": "bad", "attrs": {"onclick": "x()"}},
        ]
    }))
    .with_security(SecurityMode::Unsafe);

    assert_eq!(
        render("links", &mut ctx),
        r#"<a href="javascript:alert(1)" onclick="x()">bad</a>"#
    );
}

#[test]
fn utils_eval_in_text_and_directives() {
    let mut ctx = Context::from_json(json!({
        "price": 4,
        "qty": 3,
        "items": [
            {"name": "tea", "active": true},
            {"name": "milk", "active": false},
            {"name": "honey", "active": true},
        ],
    }));

    assert_eq!(
        render("calc", &mut ctx),
        "<p>12</p><p>six</p><p>TEA, HONEY</p>"
    );
}

#[test]
fn utils_eval_errors_abort_the_render() {
    let el = block("calc");
    let mut ctx = Context::from_json(json!({"price": 4}));

    let err = block_on(renderer().render_block(&el, &mut ctx)).unwrap_err();

    assert_eq!(err.to_string(), "ReferenceError: qty is not defined");
    // Nothing was written into the block
    assert_eq!(el.inner_html(), "");
}

#[test]
fn missing_block_template() {
    let err = block_on(renderer().render_block(&block("nope"), &mut Context::new())).unwrap_err();
    assert!(matches!(
        err,
        RenderError::Template(TemplateError::FetchFailed { ref block_name, .. }) if block_name == "nope"
    ));
}

#[test]
fn missing_named_template() {
    let el = block("cards");
    let mut ctx = Context::new().with_template(faintly::TemplateDescriptor::parse(
        "/blocks/cards/cards.html#ghost",
    ));

    let err = block_on(renderer().render_block(&el, &mut ctx)).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Failed to find template with id faintly-template--blocks-cards-cards-html-ghost."
    );
}

#[test]
fn context_receives_render_metadata() {
    let el = block("page");
    let mut ctx = Context::from_json(json!({"heading": "h", "body": "b", "count": 0}));

    block_on(renderer().render_block(&el, &mut ctx)).unwrap();

    assert_eq!(ctx.block_name(), Some("page"));
    assert!(ctx.block().is_some_and(|b| b.ptr_eq(&el)));
    assert_eq!(
        ctx.template().and_then(|t| t.path.clone()).as_deref(),
        Some("/blocks/page/page.html")
    );
}
