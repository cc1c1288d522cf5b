//! Package document (OPF) parser
//!
//! Extracts metadata, manifest, spine and the cover image from the OPF file.
//! All hrefs are resolved against the package document's directory.

use std::collections::HashMap;

use roxmltree::Node;

use super::path;
use super::types::{ManifestItem, Metadata, PackageDocument, SpineItem};
use super::xml;
use crate::error::{ReaderError, Result};

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Parse a package document located at `package_path` inside the archive.
pub fn parse(package_xml: &str, package_path: &str) -> Result<PackageDocument> {
    let package_xml = xml::replace_html_entities(package_xml);
    let doc = xml::parse_document(&package_xml)
        .map_err(|e| ReaderError::PackageMalformed(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "package" {
        return Err(ReaderError::PackageMalformed(format!(
            "expected <package> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let package_dir = path::parent_dir(package_path);

    let (manifest, manifest_order) = xml::child_element(root, "manifest")
        .map(|node| parse_manifest(node, package_dir))
        .unwrap_or_default();

    let spine_node = xml::child_element(root, "spine");
    let spine = spine_node
        .map(|node| parse_spine(node, &manifest))
        .unwrap_or_default();

    let mut metadata = xml::child_element(root, "metadata")
        .map(|node| parse_metadata(node, root.attribute("unique-identifier")))
        .unwrap_or_default();

    let meta_cover = xml::child_element(root, "metadata").and_then(find_meta_cover);
    let cover_ctx = CoverContext {
        manifest: &manifest,
        order: &manifest_order,
        meta_cover,
        package_dir,
    };
    metadata.cover_image = resolve_cover(&cover_ctx);

    let toc_href = find_toc_href(
        &manifest,
        &manifest_order,
        spine_node.and_then(|node| node.attribute("toc")),
    );

    tracing::debug!(
        title = %metadata.title,
        manifest = manifest.len(),
        spine = spine.len(),
        toc = ?toc_href,
        "Parsed package document"
    );

    Ok(PackageDocument {
        package_path: package_path.to_string(),
        metadata,
        manifest,
        manifest_order,
        spine,
        toc_href,
    })
}

fn parse_metadata(node: Node, unique_identifier: Option<&str>) -> Metadata {
    let mut values: HashMap<&str, Vec<String>> = HashMap::new();
    let mut identifiers: Vec<(Option<&str>, String)> = Vec::new();

    for child in node.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name();
        let text = xml::text_content(child).trim().to_string();
        if text.is_empty() {
            continue;
        }

        if name == "identifier" {
            identifiers.push((child.attribute("id"), text.clone()));
        }
        values.entry(name).or_default().push(text);
    }

    let joined = |name: &str| values.get(name).map(|v| v.join(", ")).unwrap_or_default();

    // The package names its unique identifier by element id
    let identifier = unique_identifier
        .and_then(|uid| identifiers.iter().find(|(id, _)| *id == Some(uid)))
        .or_else(|| identifiers.first())
        .map(|(_, value)| value.clone())
        .unwrap_or_default();

    let contributor = joined("contributor");

    Metadata {
        title: joined("title"),
        author: joined("creator"),
        language: joined("language"),
        date: joined("date"),
        identifier,
        contributor: (!contributor.is_empty()).then_some(contributor),
        cover_image: None,
    }
}

fn parse_manifest(node: Node, package_dir: &str) -> (HashMap<String, ManifestItem>, Vec<String>) {
    let mut manifest = HashMap::new();
    let mut order = Vec::new();

    for item in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "item")
    {
        let (Some(id), Some(href)) = (item.attribute("id"), item.attribute("href")) else {
            continue;
        };

        let manifest_item = ManifestItem {
            id: id.to_string(),
            href: path::resolve(package_dir, href),
            media_type: item.attribute("media-type").map(str::to_string),
            properties: item.attribute("properties").map(str::to_string),
        };

        if manifest.insert(id.to_string(), manifest_item).is_none() {
            order.push(id.to_string());
        }
    }

    (manifest, order)
}

fn parse_spine(node: Node, manifest: &HashMap<String, ManifestItem>) -> Vec<SpineItem> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "itemref")
        .filter_map(|itemref| {
            let idref = itemref.attribute("idref")?;
            let Some(item) = manifest.get(idref) else {
                tracing::warn!(idref, "Spine references unknown manifest item");
                return None;
            };
            Some(SpineItem {
                id: item.id.clone(),
                href: item.href.clone(),
                linear: itemref.attribute("linear") != Some("no"),
            })
        })
        .collect()
}

fn find_meta_cover<'a>(metadata: Node<'a, '_>) -> Option<&'a str> {
    metadata
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "meta")
        .find(|meta| meta.attribute("name") == Some("cover"))
        .and_then(|meta| meta.attribute("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
}

/// Nav document first, then the spine's NCX reference, then any NCX item.
fn find_toc_href(
    manifest: &HashMap<String, ManifestItem>,
    order: &[String],
    spine_toc: Option<&str>,
) -> Option<String> {
    let in_order = || order.iter().filter_map(|id| manifest.get(id));

    if let Some(nav) = in_order().find(|item| item.has_property("nav")) {
        return Some(nav.href.clone());
    }

    if let Some(ncx) = spine_toc.and_then(|id| manifest.get(id)) {
        return Some(ncx.href.clone());
    }

    in_order()
        .find(|item| {
            item.media_type.as_deref() == Some(NCX_MEDIA_TYPE)
                || path::extension(&item.href).as_deref() == Some("ncx")
        })
        .map(|item| item.href.clone())
}

/// Outcome of a single cover lookup step
#[derive(Debug, PartialEq)]
enum CoverCandidate {
    Found(String),
    NotFound,
}

struct CoverContext<'a> {
    manifest: &'a HashMap<String, ManifestItem>,
    order: &'a [String],
    meta_cover: Option<&'a str>,
    package_dir: &'a str,
}

impl<'a> CoverContext<'a> {
    fn items(&self) -> impl Iterator<Item = &'a ManifestItem> + 'a {
        let manifest = self.manifest;
        self.order.iter().filter_map(move |id| manifest.get(id))
    }
}

type CoverStrategy = fn(&CoverContext) -> CoverCandidate;

/// Lookup steps in priority order. A step only wins with a valid image href.
const COVER_STRATEGIES: &[CoverStrategy] = &[
    cover_from_meta,
    cover_from_conventional_id,
    cover_from_properties,
    cover_from_image_like_id,
    cover_from_first_image,
];

fn resolve_cover(ctx: &CoverContext) -> Option<String> {
    COVER_STRATEGIES.iter().find_map(|strategy| match strategy(ctx) {
        CoverCandidate::Found(href) => Some(href),
        CoverCandidate::NotFound => None,
    })
}

fn image_candidate(href: &str) -> CoverCandidate {
    if path::is_image_path(href) {
        CoverCandidate::Found(href.to_string())
    } else {
        CoverCandidate::NotFound
    }
}

/// `<meta name="cover" content="...">`: a manifest id, else a relative href
fn cover_from_meta(ctx: &CoverContext) -> CoverCandidate {
    let Some(content) = ctx.meta_cover else {
        return CoverCandidate::NotFound;
    };

    match ctx.manifest.get(content) {
        Some(item) => image_candidate(&item.href),
        None => image_candidate(&path::resolve(ctx.package_dir, content)),
    }
}

fn cover_from_conventional_id(ctx: &CoverContext) -> CoverCandidate {
    for id in ["cover", "cover-image"] {
        if let Some(item) = ctx.manifest.get(id) {
            if let found @ CoverCandidate::Found(_) = image_candidate(&item.href) {
                return found;
            }
        }
    }
    CoverCandidate::NotFound
}

fn cover_from_properties(ctx: &CoverContext) -> CoverCandidate {
    ctx.items()
        .find(|item| item.has_property("cover-image"))
        .map(|item| image_candidate(&item.href))
        .unwrap_or(CoverCandidate::NotFound)
}

fn cover_from_image_like_id(ctx: &CoverContext) -> CoverCandidate {
    ctx.items()
        .find(|item| path::is_image_path(&item.id))
        .map(|item| image_candidate(&item.href))
        .unwrap_or(CoverCandidate::NotFound)
}

fn cover_from_first_image(ctx: &CoverContext) -> CoverCandidate {
    ctx.items()
        .find(|item| path::is_image_path(&item.href))
        .map(|item| CoverCandidate::Found(item.href.clone()))
        .unwrap_or(CoverCandidate::NotFound)
}
