//! Table of contents parser (EPUB 2 NCX and EPUB 3 Nav XHTML)

use roxmltree::{Document, Node};

use super::path;
use super::types::NavigationEntry;
use super::xml;
use crate::error::{ReaderError, Result};

/// Shape of a TOC document, detected from its root element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocKind {
    Ncx,
    Nav,
}

/// Parse a TOC document located at `toc_path` inside the archive.
///
/// Hrefs resolve against the TOC document's own directory.
pub fn parse(toc_document: &str, toc_path: &str) -> Result<Vec<NavigationEntry>> {
    let prepared = xml::replace_html_entities(toc_document);
    let doc = xml::parse_document(&prepared)
        .map_err(|e| ReaderError::TocMalformed(format!("{}: {}", toc_path, e)))?;

    let toc_dir = path::parent_dir(toc_path);

    let raw = match detect_kind(&doc) {
        Some(TocKind::Ncx) => ncx_entries(&doc),
        Some(TocKind::Nav) => nav_entries(&doc),
        None => {
            return Err(ReaderError::TocMalformed(format!(
                "{}: unrecognized root <{}>",
                toc_path,
                doc.root_element().tag_name().name()
            )))
        }
    };

    let entries: Vec<NavigationEntry> = raw
        .into_iter()
        .filter_map(|(title, href)| {
            let href = resolve_toc_href(toc_dir, &href);
            if title.is_empty() || href.is_empty() {
                return None;
            }
            Some(NavigationEntry { title, href })
        })
        .collect();

    tracing::debug!(toc = toc_path, entries = entries.len(), "Parsed navigation");
    Ok(entries)
}

pub fn detect_kind(doc: &Document) -> Option<TocKind> {
    match doc.root_element().tag_name().name() {
        "ncx" => Some(TocKind::Ncx),
        "html" => Some(TocKind::Nav),
        _ => None,
    }
}

/// `navMap > navPoint` as raw (title, href) pairs
fn ncx_entries(doc: &Document) -> Vec<(String, String)> {
    let Some(nav_map) = xml::child_element(doc.root_element(), "navMap") else {
        return Vec::new();
    };

    nav_map
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "navPoint")
        .map(|point| {
            let title = xml::child_element(point, "navLabel")
                .map(|label| {
                    label
                        .children()
                        .filter(|n| n.is_element() && n.tag_name().name() == "text")
                        .map(|text| xml::text_content(text).trim().to_string())
                        .filter(|text| !text.is_empty())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();

            let href = xml::child_element(point, "content")
                .and_then(|content| content.attribute("src"))
                .unwrap_or_default()
                .to_string();

            (title, href)
        })
        .collect()
}

/// Anchors inside the `toc`-typed `<nav>`, or the first `<nav>` if none is typed
fn nav_entries(doc: &Document) -> Vec<(String, String)> {
    let navs: Vec<Node> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "nav")
        .collect();

    let toc_nav = navs.iter().find(|nav| is_toc_nav(**nav)).or(navs.first());
    let Some(nav) = toc_nav else {
        return Vec::new();
    };

    nav.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "a")
        .map(|anchor| {
            let title = xml::collapse_whitespace(&xml::text_content(anchor));
            let href = anchor.attribute("href").unwrap_or_default().to_string();
            (title, href)
        })
        .collect()
}

fn is_toc_nav(nav: Node) -> bool {
    xml::attribute_local(nav, "type")
        .map(|value| value.split_whitespace().any(|token| token == "toc"))
        .unwrap_or(false)
}

/// Resolve, then cut anything trailing a content-document extension.
fn resolve_toc_href(toc_dir: &str, href: &str) -> String {
    if href.trim().is_empty() || path::is_external(href) {
        return String::new();
    }

    let resolved = path::resolve(toc_dir, href);
    // Only the final segment; directories may contain ".html"
    let name_start = resolved.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    let lower = resolved[name_start..].to_ascii_lowercase();

    for ext in [".xhtml", ".html", ".htm"] {
        if let Some(pos) = lower.find(ext) {
            return resolved[..name_start + pos + ext.len()].to_string();
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::archive::fixtures::NAV_XHTML;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text> Chapter 1 </text></navLabel>
      <content src="ch1.html#sec2"/>
      <navPoint id="p1-1" playOrder="2">
        <navLabel><text>Nested</text></navLabel>
        <content src="ch1.html#sub"/>
      </navPoint>
    </navPoint>
    <navPoint id="p2" playOrder="3">
      <navLabel><text>Chapter&nbsp;2</text></navLabel>
      <content src="Text/ch2.xhtml"/>
    </navPoint>
    <navPoint id="p3" playOrder="4">
      <navLabel><text></text></navLabel>
      <content src="ch3.html"/>
    </navPoint>
    <navPoint id="p4" playOrder="5">
      <navLabel><text>No content</text></navLabel>
    </navPoint>
  </navMap>
</ncx>"#;

    #[test]
    fn test_ncx_fragment_stripped() {
        let entries = parse(NCX, "OEBPS/toc.ncx").unwrap();
        assert_eq!(entries[0].title, "Chapter 1");
        assert_eq!(entries[0].href, "OEBPS/ch1.html");
    }

    #[test]
    fn test_ncx_walks_top_level_points_in_order() {
        let entries = parse(NCX, "OEBPS/toc.ncx").unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1", "Chapter\u{a0}2"]);
        assert_eq!(entries[1].href, "OEBPS/Text/ch2.xhtml");
    }

    #[test]
    fn test_ncx_multi_valued_label() {
        let ncx = r#"<ncx><navMap><navPoint>
            <navLabel><text>Part</text><text>One</text></navLabel>
            <content src="p.xhtml"/></navPoint></navMap></ncx>"#;
        let entries = parse(ncx, "toc.ncx").unwrap();
        assert_eq!(entries[0].title, "Part, One");
        assert_eq!(entries[0].href, "p.xhtml");
    }

    #[test]
    fn test_nav_document() {
        let entries = parse(NAV_XHTML, "OEBPS/nav.xhtml").unwrap();
        assert_eq!(
            entries,
            vec![
                NavigationEntry {
                    title: "Chapter One".into(),
                    href: "OEBPS/Text/ch1.xhtml".into()
                },
                NavigationEntry {
                    title: "Chapter Two".into(),
                    href: "OEBPS/Text/ch2.xhtml".into()
                },
            ]
        );
    }

    #[test]
    fn test_nav_prefers_toc_typed_nav() {
        let nav = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Cover</a></li></ol></nav>
  <nav epub:type="toc" id="toc"><ol>
    <li><a href="../Text/a.xhtml">  Alpha
        <span>Part</span></a>
      <ol><li><a href="../Text/b.xhtml#x">Beta</a></li></ol>
    </li>
    <li><a href="">Empty</a></li>
    <li><a href="../Text/c.xhtml"></a></li>
  </ol></nav>
</body></html>"#;
        let entries = parse(nav, "OEBPS/Nav/nav.xhtml").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Alpha Part");
        assert_eq!(entries[0].href, "OEBPS/Text/a.xhtml");
        assert_eq!(entries[1].href, "OEBPS/Text/b.xhtml");
    }

    #[test]
    fn test_nav_without_toc_type_uses_first_nav() {
        let nav = r#"<html><body><nav><a href="one.html">One</a></nav></body></html>"#;
        let entries = parse(nav, "nav.xhtml").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].href, "one.html");
    }

    #[test]
    fn test_trailing_content_after_extension_cut() {
        assert_eq!(resolve_toc_href("OEBPS", "ch1.xhtml%23frag"), "OEBPS/ch1.xhtml");
        assert_eq!(resolve_toc_href("", "Text/ch.htm"), "Text/ch.htm");
        assert_eq!(
            resolve_toc_href("OEBPS", "notes.html_files/a.htm"),
            "OEBPS/notes.html_files/a.htm"
        );
        assert_eq!(resolve_toc_href("", "https://example.com/a.html"), "");
    }

    #[test]
    fn test_malformed_toc() {
        assert!(matches!(
            parse("<ncx><navMap>", "toc.ncx"),
            Err(ReaderError::TocMalformed(_))
        ));
        assert!(matches!(
            parse("<rss/>", "feed.xml"),
            Err(ReaderError::TocMalformed(_))
        ));
    }
}
