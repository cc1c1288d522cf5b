//! Streaming chapter rewriting using lol_html
//!
//! Two passes over the markup: `scan` collects embedded references and head
//! state, `apply` rewrites references and injects head/body content.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use lol_html::html_content::{ContentType, Element};
use lol_html::{element, rewrite_str, RewriteStrSettings};

use crate::error::{ReaderError, Result};

/// Elements whose references get resolved
const REFERENCE_SELECTORS: &[&str] = &["img[src]", "svg image", "link[href]", "script[src]"];

/// What the first pass learned about a chapter
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocumentScan {
    /// Raw attribute values in document order, deduplicated
    pub references: Vec<String>,
    pub has_viewport: bool,
    pub has_head: bool,
    pub has_body: bool,
}

/// Rewrites for the second pass
#[derive(Debug, Default)]
pub struct RewritePlan {
    /// Raw attribute value → replacement reference
    pub replacements: HashMap<String, String>,
    /// Appended inside `<head>` (a `<head>` is created when absent)
    pub head_html: String,
    /// Appended at the end of `<body>`
    pub body_html: String,
}

/// Attributes carrying a resource reference on this element
fn reference_attrs(el: &Element) -> &'static [&'static str] {
    match el.tag_name().to_ascii_lowercase().as_str() {
        "img" | "script" => &["src"],
        "image" => &["href", "xlink:href"],
        "link" if is_stylesheet(el) => &["href"],
        _ => &[],
    }
}

fn is_stylesheet(el: &Element) -> bool {
    el.get_attribute("rel")
        .map(|rel| {
            rel.split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
        })
        .unwrap_or(false)
}

/// First pass: collect references and head/body/viewport presence.
pub fn scan(html: &str) -> Result<DocumentScan> {
    let references = RefCell::new(Vec::<String>::new());
    let has_viewport = Cell::new(false);
    let has_head = Cell::new(false);
    let has_body = Cell::new(false);

    let mut handlers = vec![
        element!("head", |_el| {
            has_head.set(true);
            Ok(())
        }),
        element!("body", |_el| {
            has_body.set(true);
            Ok(())
        }),
        element!("meta[name]", |el| {
            if el
                .get_attribute("name")
                .map(|name| name.eq_ignore_ascii_case("viewport"))
                .unwrap_or(false)
            {
                has_viewport.set(true);
            }
            Ok(())
        }),
    ];

    for selector in REFERENCE_SELECTORS {
        handlers.push(element!(*selector, |el| {
            for attr in reference_attrs(el) {
                if let Some(value) = el.get_attribute(attr) {
                    let mut refs = references.borrow_mut();
                    if !refs.contains(&value) {
                        refs.push(value);
                    }
                }
            }
            Ok(())
        }));
    }

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| ReaderError::Rewrite(e.to_string()))?;

    Ok(DocumentScan {
        references: references.into_inner(),
        has_viewport: has_viewport.get(),
        has_head: has_head.get(),
        has_body: has_body.get(),
    })
}

/// Second pass: swap references and inject head/body content.
pub fn apply(html: &str, scan: &DocumentScan, plan: &RewritePlan) -> Result<String> {
    let head_done = Cell::new(false);
    let body_done = Cell::new(false);
    let head_block = format!("<head>{}</head>", plan.head_html);

    let mut handlers = vec![
        element!("head", |el| {
            if !head_done.replace(true) {
                el.append(&plan.head_html, ContentType::Html);
            }
            Ok(())
        }),
        element!("body", |el| {
            if body_done.replace(true) {
                return Ok(());
            }
            if !scan.has_head && !head_done.replace(true) {
                el.before(&head_block, ContentType::Html);
            }
            el.append(&plan.body_html, ContentType::Html);
            Ok(())
        }),
    ];

    for selector in REFERENCE_SELECTORS {
        handlers.push(element!(*selector, |el| {
            for attr in reference_attrs(el) {
                let replacement = el
                    .get_attribute(attr)
                    .and_then(|value| plan.replacements.get(&value));
                if let Some(replacement) = replacement {
                    el.set_attribute(attr, replacement)?;
                }
            }
            Ok(())
        }));
    }

    let mut output = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| ReaderError::Rewrite(e.to_string()))?;

    // Bare fragments: no head or body element to hang content on
    if !head_done.get() {
        output.insert_str(0, &head_block);
    }
    if !body_done.get() {
        output.push_str(&plan.body_html);
    }

    Ok(output)
}
