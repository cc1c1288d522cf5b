//! Shared XML DOM helpers for package and navigation documents

use std::borrow::Cow;

use roxmltree::{Document, Node, ParsingOptions};

/// HTML named entities seen in Nav/NCX documents that XML does not predefine
const HTML_ENTITIES: &[(&str, u32)] = &[
    ("nbsp", 160),
    ("copy", 169),
    ("laquo", 171),
    ("shy", 173),
    ("reg", 174),
    ("middot", 183),
    ("raquo", 187),
    ("ensp", 8194),
    ("emsp", 8195),
    ("thinsp", 8201),
    ("ndash", 8211),
    ("mdash", 8212),
    ("lsquo", 8216),
    ("rsquo", 8217),
    ("ldquo", 8220),
    ("rdquo", 8221),
    ("bull", 8226),
    ("hellip", 8230),
    ("trade", 8482),
];

/// Parse with DTDs allowed. NCX and XHTML files routinely carry a DOCTYPE.
pub fn parse_document(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
}

/// Rewrite known HTML named entities into numeric character references.
pub fn replace_html_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut changed = false;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let replacement = after.find(';').filter(|&end| end <= 8).and_then(|end| {
            let name = &after[..end];
            HTML_ENTITIES
                .iter()
                .find(|(entity, _)| *entity == name)
                .map(|(_, code)| (end, *code))
        });

        match replacement {
            Some((end, code)) => {
                out.push_str(&format!("&#{};", code));
                rest = &after[end + 1..];
                changed = true;
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

/// All descendant text of a node, concatenated.
pub fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First direct child element with the given local name.
pub fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

/// Attribute lookup by local name, ignoring any namespace prefix.
pub fn attribute_local<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attr| attr.name() == name)
        .map(|attr| attr.value())
}
