//! Integration tests for layout/yield/block composition

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use template_composer::{
    load_views, parse, parse_file, slot, Composer, ComposerConfig, LayoutMap, RenderContext,
    TemplateSet,
};

const VIEWS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/views");

fn composer(config: ComposerConfig) -> Composer {
    load_views(VIEWS, config).expect("fixture views should load")
}

fn render(composer: &Composer, name: &str, layout: Option<&str>, ctx: &mut RenderContext) -> String {
    let html = composer
        .render_with_layout(name, layout, ctx)
        .expect("Should render");
    String::from_utf8(html).unwrap()
}

#[test]
fn test_content_through_layout() {
    let composer = composer(ComposerConfig::default());
    let html = render(&composer, "hotels/show.html", Some("layout.html"), &mut RenderContext::new());

    assert_eq!(
        html,
        "<html>\n<head>\n<title>\n  Acme Inn\n\n</title>\n</head>\n<body>\nWelcome\n\n</body>\n</html>\n"
    );
    assert!(!html.contains("yield"));
    assert!(!html.contains("block"));
    assert!(!html.contains("composer_"));
}

#[test]
fn test_blocks_see_render_arguments() {
    let composer = composer(ComposerConfig::default());
    let mut ctx = RenderContext::new()
        .with("count", 2)
        .with("hotels", json!([{ "name": "Acme" }, { "name": "Grand" }]));
    let html = render(&composer, "hotels/index.html", Some("layout.html"), &mut ctx);

    assert!(html.contains("Hotels (2)"));
    assert!(html.contains("<li>Acme</li>"));
    assert!(html.contains("<li>Grand</li>"));
}

#[test]
fn test_captured_slots_are_left_in_context() {
    let composer = composer(ComposerConfig::default());
    let mut ctx = RenderContext::new();
    render(&composer, "hotels/show.html", Some("layout.html"), &mut ctx);

    assert_eq!(ctx.get(&slot::yield_key("title")), Some(&json!("  Acme Inn\n")));
    assert_eq!(ctx.get(slot::DEFAULT_SLOT), Some(&json!("Welcome\n")));
    assert!(!ctx.contains_key("ComposerCaptureMode"));
}

#[test]
fn test_layout_selected_from_map() {
    let layouts = LayoutMap::new().with("*", "layout.html");
    let composer = composer(ComposerConfig::default().with_layouts(layouts));
    let html = composer
        .render_named("hotels/show.html", &mut RenderContext::new())
        .unwrap();
    let html = String::from_utf8(html).unwrap();

    assert!(html.starts_with("<html>"));
    assert!(html.contains("Acme Inn"));
}

#[test]
fn test_layout_selected_by_method() {
    let layouts = LayoutMap::new().with("GET:hotels/show.html", "layout.html");
    let composer = composer(ComposerConfig::default().with_layouts(layouts));

    let get = composer
        .render_for_method("hotels/show.html", "get", &mut RenderContext::new())
        .unwrap();
    assert!(String::from_utf8(get).unwrap().starts_with("<html>"));

    // no layout: the content file is committed on its own
    let post = composer
        .render_for_method("hotels/show.html", "POST", &mut RenderContext::new())
        .unwrap();
    assert_eq!(post, b"Welcome\n");
}

#[test]
fn test_nested_slots() {
    let composer = composer(ComposerConfig::default());
    let mut ctx = RenderContext::new()
        .with("hotel", "Acme")
        .with("deal", "50% off");
    let html = render(&composer, "hotels/sidebar.html", None, &mut ctx);

    assert_eq!(
        html,
        "<main>Acme</main>\n  <aside>\n  <b>50% off</b>\n\n  </aside>\n\n"
    );
}

#[test]
fn test_deeply_nested_slots_within_limit() {
    let composer = composer(ComposerConfig::default());
    let html = render(&composer, "deep.html", None, &mut RenderContext::new());
    assert!(html.contains("<div>\n  <span>deep</span>\n\n  </div>"));
}

#[test]
fn test_capture_named() {
    let composer = composer(ComposerConfig::default());
    let mut ctx = RenderContext::new()
        .with("hotel", "Acme")
        .with("deal", "free breakfast");
    let fragment = composer.capture_named("hotels/sidebar.html", &mut ctx).unwrap();

    assert!(fragment.starts_with("<main>Acme</main>"));
    assert!(fragment.contains("<b>free breakfast</b>"));
}

#[test]
fn test_lenient_slots_render_empty() {
    let composer = composer(ComposerConfig::default().with_strict_slots(false));
    let html = render(&composer, "missing.html", None, &mut RenderContext::new());
    assert_eq!(html, "<p>before</p>\n\n<p>after</p>\n");
}

#[test]
fn test_caller_supplied_slot() {
    let composer = composer(ComposerConfig::default());
    let mut ctx = RenderContext::new().with(slot::yield_key("sidebar"), "<nav>menu</nav>");
    let html = render(&composer, "missing.html", None, &mut ctx);
    assert_eq!(html, "<p>before</p>\n<nav>menu</nav>\n<p>after</p>\n");
}

#[test]
fn test_file_without_directives_renders_verbatim() {
    let source = std::fs::read_to_string(format!("{}/plain.html", VIEWS)).unwrap();
    let composer = composer(ComposerConfig::default());
    let html = render(&composer, "plain.html", None, &mut RenderContext::new());
    assert_eq!(html, source);
}

#[test]
fn test_parse_fixture_is_deterministic() {
    let path = format!("{}/hotels/sidebar.html", VIEWS);
    let first = parse_file(&path).unwrap();
    let second = parse_file(&path).unwrap();
    assert_eq!(first, second);

    let names: Vec<&str> = first.block_names().collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"sidebar"));
    assert!(names.contains(&"ad"));
}

#[test]
fn test_same_block_name_in_two_files() {
    let a = parse("a.html", "- block \"title\"\n  A\n").unwrap();
    let b = parse("b.html", "- block \"title\"\n  B\n").unwrap();

    let key_a = a.yield_to_block[&slot::yield_key("title")].clone();
    let key_b = b.yield_to_block[&slot::yield_key("title")].clone();
    assert_ne!(key_a, key_b);
}

#[test]
fn test_crlf_sources() {
    let views = TemplateSet::builder()
        .source("layout.html", "<title>\r\n= yield \"title\"\r\n</title>\r\n= yield\r\n")
        .source("page.html", "- block \"title\"\r\n  Acme\r\nBody\r\n")
        .build()
        .unwrap();
    let composer = Composer::new(Arc::new(views));
    let html = composer
        .render_with_layout("page.html", Some("layout.html"), &mut RenderContext::new())
        .unwrap();

    assert_eq!(
        String::from_utf8(html).unwrap(),
        "<title>\r\n  Acme\r\n\r\n</title>\r\nBody\r\n\r\n"
    );
}

#[test]
fn test_layout_fills_its_own_slots() {
    let views = TemplateSet::builder()
        .source("layout.html", "- block \"nav\"\n  <nav/>\n= yield \"nav\"\n= yield\n")
        .source("page.html", "Body\n")
        .source("menu.html", "- block \"nav\"\n  <menu/>\nBody\n")
        .build()
        .unwrap();
    let composer = Composer::new(Arc::new(views));

    let html = render(&composer, "page.html", Some("layout.html"), &mut RenderContext::new());
    assert_eq!(html, "  <nav/>\n\nBody\n\n");

    // the content template's block wins over the layout's
    let html = render(&composer, "menu.html", Some("layout.html"), &mut RenderContext::new());
    assert_eq!(html, "  <menu/>\n\nBody\n\n");
}

#[test]
fn test_yield_inside_each_block() {
    let views = TemplateSet::builder()
        .source(
            "layout.html",
            "<ul>{{#each items}}<li>#{ yield \"title\" }</li>{{/each}}</ul>\n= yield\n",
        )
        .source("page.html", "- block \"title\"\n  Acme\nBody\n")
        .build()
        .unwrap();
    let composer = Composer::new(Arc::new(views));
    let mut ctx = RenderContext::new().with("items", json!([1, 2]));

    let html = render(&composer, "page.html", Some("layout.html"), &mut ctx);
    assert!(html.starts_with("<ul><li>  Acme\n</li><li>  Acme\n</li></ul>\n"));
    assert!(html.ends_with("Body\n\n"));
}
