//! Resource embedding for prepared chapters

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::EmbeddingMode;
use crate::epub::path;
use crate::error::{ReaderError, Result};

/// MIME type used in `data:` URIs
pub fn mime_for(archive_path: &str) -> &'static str {
    match path::extension(archive_path).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub fn data_uri(archive_path: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_for(archive_path), STANDARD.encode(bytes))
}

/// Absolute `file://` URL with each path segment percent-encoded
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded: Vec<String> = raw
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let joined = encoded.join("/");

    if joined.starts_with('/') {
        format!("file://{}", joined)
    } else {
        format!("file:///{}", joined)
    }
}

/// Write `bytes` under `root` at an archive-relative path, creating parents.
pub fn write_under(root: &Path, archive_path: &str, bytes: &[u8]) -> Result<PathBuf> {
    let target = root.join(archive_path);
    let write = || -> std::io::Result<PathBuf> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        fs::canonicalize(&target)
    };

    write().map_err(|source| ReaderError::CacheWriteFailure {
        path: target.clone(),
        source,
    })
}

/// Produce the replacement reference for one resolved resource.
pub fn embed(
    mode: EmbeddingMode,
    archive_path: &str,
    bytes: &[u8],
    book_cache_dir: &Path,
) -> Result<String> {
    match mode {
        EmbeddingMode::SiblingFiles => {
            let written = write_under(book_cache_dir, archive_path, bytes)?;
            Ok(file_url(&written))
        }
        EmbeddingMode::InlineDataUris => Ok(data_uri(archive_path, bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("OEBPS/a.PNG"), "image/png");
        assert_eq!(mime_for("b.jpeg"), "image/jpeg");
        assert_eq!(mime_for("c.jpg"), "image/jpeg");
        assert_eq!(mime_for("style.css"), "application/octet-stream");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("x.png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_file_url_encodes_segments() {
        assert_eq!(
            file_url(Path::new("/tmp/my books/ch 1.xhtml")),
            "file:///tmp/my%20books/ch%201.xhtml"
        );
    }

    #[test]
    fn test_sibling_embedding_preserves_relative_path() {
        let dir = TempDir::new().unwrap();
        let url = embed(
            EmbeddingMode::SiblingFiles,
            "OEBPS/Images/1.jpg",
            b"jpeg",
            dir.path(),
        )
        .unwrap();

        let on_disk = dir.path().join("OEBPS/Images/1.jpg");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"jpeg");
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("/OEBPS/Images/1.jpg"));
    }

    #[test]
    fn test_inline_embedding_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let uri = embed(EmbeddingMode::InlineDataUris, "a.png", b"png", dir.path()).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
