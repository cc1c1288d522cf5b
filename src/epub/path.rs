//! Archive-internal path handling
//!
//! Every href that leaves this module is archive-absolute: no leading slash,
//! forward slashes only, and no `.`, `..` or empty segments.

/// Directory portion of an archive path (`""` for entries at the root).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Collapse `.`/`..`/empty segments and normalize separators.
///
/// `..` never climbs above the archive root.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// Percent-decode an href, keeping the raw text when it is not valid UTF-8.
pub fn decode(href: &str) -> String {
    urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string())
}

/// Drop any `#fragment` or `?query` suffix.
pub fn strip_fragment(href: &str) -> &str {
    let end = href.find(['#', '?']).unwrap_or(href.len());
    &href[..end]
}

/// Resolve an href found in a document living in `base_dir`.
///
/// The href is fragment-stripped and percent-decoded first. A leading slash
/// makes it relative to the archive root.
pub fn resolve(base_dir: &str, href: &str) -> String {
    let decoded = decode(strip_fragment(href.trim()));

    if decoded.starts_with('/') || base_dir.is_empty() {
        normalize(&decoded)
    } else {
        normalize(&format!("{}/{}", base_dir, decoded))
    }
}

/// References the rewriter must leave alone.
pub fn is_external(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return true;
    }

    let lower = href.to_ascii_lowercase();
    ["http:", "https:", "data:", "blob:", "javascript:", "mailto:", "file:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
        || lower.starts_with("//")
}

/// Lower-cased extension of the final path segment.
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub fn is_image_path(path: &str) -> bool {
    extension(strip_fragment(path))
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
