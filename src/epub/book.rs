//! Book loading: container → package → navigation, plus stable identity

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::archive::{ArchiveReader, ZipArchiveReader};
use super::container;
use super::navigation;
use super::package;
use super::types::{NavigationEntry, PackageDocument};
use crate::error::{ReaderError, Result};

/// Everything derived once per book load
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedBook {
    pub book_id: String,
    pub archive_path: PathBuf,
    /// SHA-256 of the archive bytes
    pub fingerprint: String,
    pub package: PackageDocument,
    pub navigation: Vec<NavigationEntry>,
}

impl LoadedBook {
    pub fn chapter_count(&self) -> usize {
        self.package.spine.len()
    }

    pub fn spine_href(&self, index: usize) -> Option<&str> {
        self.package.spine.get(index).map(|item| item.href.as_str())
    }

    pub fn spine_index_of(&self, href: &str) -> Option<usize> {
        self.package.spine_index_of(href)
    }

    /// Spine position targeted by a TOC entry
    pub fn toc_spine_index(&self, toc_index: usize) -> Option<usize> {
        self.navigation
            .get(toc_index)
            .and_then(|entry| self.spine_index_of(&entry.href))
    }

    /// Open a fresh reader over the archive for a single operation
    pub fn open_archive(&self) -> Result<ZipArchiveReader<BufReader<File>>> {
        ZipArchiveReader::open(&self.archive_path)
    }

    /// Raw bytes of the resolved cover image, if any
    pub fn cover_bytes(&self) -> Result<Option<Vec<u8>>> {
        let Some(cover) = self.package.metadata.cover_image.as_deref() else {
            return Ok(None);
        };

        let bytes = self.open_archive()?.read_bytes(cover)?;
        if bytes.is_none() {
            tracing::warn!(book_id = %self.book_id, href = cover, "Cover image missing from archive");
        }
        Ok(bytes)
    }
}

pub struct BookLoader;

impl BookLoader {
    /// Load a book from an archive on disk
    pub fn load(path: impl AsRef<Path>) -> Result<LoadedBook> {
        let path = path.as_ref();
        let fingerprint = fingerprint_file(path)?;
        let mut archive = ZipArchiveReader::open(path)?;
        Self::load_from_archive(&mut archive, path.to_path_buf(), fingerprint)
    }

    /// Load on the blocking pool
    pub async fn load_async(path: impl Into<PathBuf>) -> Result<LoadedBook> {
        let path = path.into();
        tokio::task::spawn_blocking(move || Self::load(path)).await?
    }

    /// Parse an already opened archive.
    ///
    /// Container and package failures abort the load. A missing or malformed
    /// TOC only logs a warning and leaves the navigation list empty.
    pub fn load_from_archive(
        archive: &mut dyn ArchiveReader,
        archive_path: PathBuf,
        fingerprint: String,
    ) -> Result<LoadedBook> {
        let package_path = container::locate_package(archive)?;
        let package_xml = archive
            .read_text(&package_path)?
            .ok_or_else(|| ReaderError::PackageNotFound(package_path.clone()))?;
        let package = package::parse(&package_xml, &package_path)?;

        let navigation = match load_navigation(archive, &package) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Continuing without table of contents");
                Vec::new()
            }
        };

        let book_id = derive_book_id(
            &package.metadata.identifier,
            &package.metadata.title,
            &package.metadata.author,
        );

        tracing::info!(
            book_id = %book_id,
            title = %package.metadata.title,
            chapters = package.spine.len(),
            toc_entries = navigation.len(),
            "Loaded book"
        );

        Ok(LoadedBook {
            book_id,
            archive_path,
            fingerprint,
            package,
            navigation,
        })
    }
}

fn load_navigation(
    archive: &mut dyn ArchiveReader,
    package: &PackageDocument,
) -> Result<Vec<NavigationEntry>> {
    let Some(toc_href) = package.toc_href.as_deref() else {
        return Err(ReaderError::TocNotFound(
            "package declares no TOC document".to_string(),
        ));
    };

    let toc_document = archive
        .read_text(toc_href)?
        .ok_or_else(|| ReaderError::TocNotFound(toc_href.to_string()))?;

    navigation::parse(&toc_document, toc_href)
}

/// Stable book id: digest of the package identifier, else of title + author.
pub fn derive_book_id(identifier: &str, title: &str, author: &str) -> String {
    let mut hasher = Sha256::new();
    if identifier.trim().is_empty() {
        hasher.update(title.as_bytes());
        hasher.update(author.as_bytes());
    } else {
        hasher.update(identifier.trim().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// SHA-256 of a file's bytes, streamed
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
