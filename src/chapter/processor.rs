//! Chapter preparation: extract, resolve resources, inject runtime, persist

use std::collections::HashMap;
use std::path::Path;

use super::embed;
use super::rewrite::{self, RewritePlan};
use super::scripts::ScriptsCache;
use super::style::StyleConfig;
use super::{ChapterArtifact, EmbeddingMode};
use crate::epub::archive::ArchiveReader;
use crate::epub::path;
use crate::error::{ReaderError, Result};

pub const VIEWPORT_CONTENT: &str =
    "width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=0";

pub const INJECTED_STYLE_ID: &str = "libros-injected-style";

/// Turns spine items into display-ready documents
#[derive(Debug, Clone)]
pub struct ChapterProcessor {
    script_urls: Vec<String>,
    style: Option<StyleConfig>,
}

impl ChapterProcessor {
    pub fn new(scripts: &ScriptsCache, style: Option<StyleConfig>) -> Self {
        Self {
            script_urls: scripts.script_urls(),
            style,
        }
    }

    /// Prepare one spine item and persist it at `<book_cache_dir>/<spine_href>`.
    ///
    /// Missing resources are logged and their references left untouched.
    pub fn prepare(
        &self,
        archive: &mut dyn ArchiveReader,
        spine_href: &str,
        book_cache_dir: &Path,
        mode: EmbeddingMode,
    ) -> Result<ChapterArtifact> {
        let html = archive
            .read_text(spine_href)?
            .ok_or_else(|| ReaderError::ChapterNotFound(spine_href.to_string()))?;

        let scan = rewrite::scan(&html)?;
        let chapter_dir = path::parent_dir(spine_href);

        let mut replacements = HashMap::new();
        for raw in &scan.references {
            if path::is_external(raw) {
                continue;
            }

            let resolved = path::resolve(chapter_dir, raw);
            let Some(bytes) = archive.read_bytes(&resolved)? else {
                let missing = ReaderError::ResourceNotFound(resolved.clone());
                tracing::warn!(chapter = spine_href, reference = %raw, "{}", missing);
                continue;
            };

            let replacement = embed::embed(mode, &resolved, &bytes, book_cache_dir)?;
            replacements.insert(raw.clone(), replacement);
        }

        let plan = RewritePlan {
            replacements,
            head_html: self.head_html(scan.has_viewport),
            body_html: self.body_html(),
        };
        let output = rewrite::apply(&html, &scan, &plan)?;

        let written = embed::write_under(book_cache_dir, spine_href, output.as_bytes())?;

        tracing::debug!(
            chapter = spine_href,
            resources = plan.replacements.len(),
            mode = ?mode,
            "Prepared chapter"
        );

        Ok(ChapterArtifact {
            source_href: spine_href.to_string(),
            prepared_path: written,
            embedding_mode: mode,
        })
    }

    fn head_html(&self, has_viewport: bool) -> String {
        let mut head = String::new();
        if !has_viewport {
            head.push_str(&format!(
                "<meta name=\"viewport\" content=\"{}\"/>",
                VIEWPORT_CONTENT
            ));
        }
        if let Some(style) = &self.style {
            head.push_str(&format!(
                "<style id=\"{}\">{}</style>",
                INJECTED_STYLE_ID,
                style.to_css()
            ));
        }
        head
    }

    fn body_html(&self) -> String {
        self.script_urls
            .iter()
            .map(|url| format!("<script src=\"{}\"></script>", url))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::archive::fixtures::{sample_reader, zip_bytes, PNG_BYTES};
    use crate::epub::archive::ZipArchiveReader;
    use tempfile::TempDir;

    fn processor(style: Option<StyleConfig>) -> ChapterProcessor {
        ChapterProcessor::new(&ScriptsCache::new("/cache/scripts"), style)
    }

    #[test]
    fn test_prepare_sibling_files() {
        let dir = TempDir::new().unwrap();
        let mut reader = sample_reader();

        let artifact = processor(None)
            .prepare(
                &mut reader,
                "OEBPS/Text/ch1.xhtml",
                dir.path(),
                EmbeddingMode::SiblingFiles,
            )
            .unwrap();

        assert_eq!(artifact.source_href, "OEBPS/Text/ch1.xhtml");
        assert_eq!(artifact.embedding_mode, EmbeddingMode::SiblingFiles);
        assert!(artifact.prepared_path.ends_with("OEBPS/Text/ch1.xhtml"));

        // Resources land next to the chapter at their archive paths
        assert_eq!(
            std::fs::read(dir.path().join("OEBPS/Images/a.png")).unwrap(),
            PNG_BYTES
        );
        assert!(dir.path().join("OEBPS/Styles/main.css").exists());

        let html = std::fs::read_to_string(&artifact.prepared_path).unwrap();
        assert!(html.contains("/OEBPS/Images/a.png\""));
        assert!(!html.contains("\"../Images/a.png\""));
        assert!(html.contains("https://example.com/remote.png"));
        assert!(html.contains(VIEWPORT_CONTENT));
        // Links between chapters are left for the bridge
        assert!(html.contains("href=\"ch2.xhtml\""));
    }

    #[test]
    fn test_scripts_appended_in_order() {
        let dir = TempDir::new().unwrap();
        let mut reader = sample_reader();
        let artifact = processor(None)
            .prepare(
                &mut reader,
                "OEBPS/Text/ch1.xhtml",
                dir.path(),
                EmbeddingMode::InlineDataUris,
            )
            .unwrap();

        let html = std::fs::read_to_string(&artifact.prepared_path).unwrap();
        let positions: Vec<usize> = [
            "swipe-shift.js",
            "reading-progress.js",
            "intercept-clicks.js",
            "annotations.js",
            "style-injection.js",
        ]
        .iter()
        .map(|name| html.find(&format!("file:///cache/scripts/{}", name)).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(positions[4] < html.find("</body>").unwrap());
    }

    #[test]
    fn test_prepare_inline_data_uris() {
        let dir = TempDir::new().unwrap();
        let mut reader = sample_reader();
        let artifact = processor(None)
            .prepare(
                &mut reader,
                "OEBPS/Text/ch1.xhtml",
                dir.path(),
                EmbeddingMode::InlineDataUris,
            )
            .unwrap();

        let html = std::fs::read_to_string(&artifact.prepared_path).unwrap();
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("data:application/octet-stream;base64,"));
        assert!(!dir.path().join("OEBPS/Images/a.png").exists());
    }

    #[test]
    fn test_missing_resource_left_untouched() {
        let dir = TempDir::new().unwrap();
        let mut reader = sample_reader();
        let artifact = processor(None)
            .prepare(
                &mut reader,
                "OEBPS/Text/ch2.xhtml",
                dir.path(),
                EmbeddingMode::SiblingFiles,
            )
            .unwrap();

        let html = std::fs::read_to_string(&artifact.prepared_path).unwrap();
        assert!(html.contains("src=\"../Images/missing.png\""));
    }

    #[test]
    fn test_relative_image_read_from_resolved_entry() {
        let chapter = r#"<html><head></head><body><img src="../Images/1.jpg"/></body></html>"#;
        let data = zip_bytes(&[
            ("OEBPS/Text/ch1.html", chapter.as_bytes()),
            ("OEBPS/Images/1.jpg", b"jpeg-bytes"),
        ]);
        let mut reader = ZipArchiveReader::from_bytes(data).unwrap();
        let dir = TempDir::new().unwrap();

        let artifact = processor(None)
            .prepare(
                &mut reader,
                "OEBPS/Text/ch1.html",
                dir.path(),
                EmbeddingMode::InlineDataUris,
            )
            .unwrap();

        let html = std::fs::read_to_string(&artifact.prepared_path).unwrap();
        assert!(html.contains("data:image/jpeg;base64,anBlZy1ieXRlcw=="));
    }

    #[test]
    fn test_style_injected_and_existing_viewport_kept() {
        let chapter = r#"<html><head><meta name="viewport" content="width=320"/></head><body><p>x</p></body></html>"#;
        let data = zip_bytes(&[("c.html", chapter.as_bytes())]);
        let mut reader = ZipArchiveReader::from_bytes(data).unwrap();
        let dir = TempDir::new().unwrap();

        let artifact = processor(Some(StyleConfig::default()))
            .prepare(&mut reader, "c.html", dir.path(), EmbeddingMode::SiblingFiles)
            .unwrap();

        let html = std::fs::read_to_string(&artifact.prepared_path).unwrap();
        assert_eq!(html.matches("name=\"viewport\"").count(), 1);
        assert!(html.contains("<style id=\"libros-injected-style\">"));
    }

    #[test]
    fn test_chapter_not_found() {
        let dir = TempDir::new().unwrap();
        let mut reader = sample_reader();
        let err = processor(None)
            .prepare(&mut reader, "OEBPS/Text/ch9.xhtml", dir.path(), EmbeddingMode::SiblingFiles)
            .unwrap_err();
        assert!(matches!(err, ReaderError::ChapterNotFound(ref href) if href == "OEBPS/Text/ch9.xhtml"));
    }
}
