//! EPUB data model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Book metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub language: String,
    pub date: String,
    /// Unique identifier; empty only when the package declares none
    pub identifier: String,
    pub contributor: Option<String>,
    /// Archive-absolute href of the cover image
    pub cover_image: Option<String>,
}

/// Manifest item from the package document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    /// Archive-absolute, normalized
    pub href: String,
    pub media_type: Option<String>,
    pub properties: Option<String>,
}

impl ManifestItem {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_deref()
            .map(|props| props.split_whitespace().any(|p| p == name))
            .unwrap_or(false)
    }
}

/// Spine item (reading order entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpineItem {
    pub id: String,
    pub href: String,
    pub linear: bool,
}

/// Table of contents entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub title: String,
    /// Archive-absolute, fragment-stripped
    pub href: String,
}

/// Parsed package document. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDocument {
    pub package_path: String,
    pub metadata: Metadata,
    pub manifest: HashMap<String, ManifestItem>,
    /// Manifest ids in document order
    pub manifest_order: Vec<String>,
    pub spine: Vec<SpineItem>,
    /// Archive-absolute href of the TOC document (Nav XHTML or NCX)
    pub toc_href: Option<String>,
}

impl PackageDocument {
    /// Manifest items in document order
    pub fn manifest_items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest_order
            .iter()
            .filter_map(|id| self.manifest.get(id))
    }

    /// Spine position of an archive-absolute href
    pub fn spine_index_of(&self, href: &str) -> Option<usize> {
        self.spine.iter().position(|item| item.href == href)
    }
}
