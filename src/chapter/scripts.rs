//! Runtime scripts shared by every prepared chapter
//!
//! Scripts ship inside the crate and are materialized once into a
//! book-independent directory that chapters reference by `file://` URL.

use std::path::{Path, PathBuf};

use super::embed::file_url;
use crate::error::{ReaderError, Result};

/// Scripts appended to each chapter body, in injection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeScript {
    SwipeShift,
    ReadingProgress,
    InterceptClicks,
    Annotations,
    StyleInjection,
}

impl RuntimeScript {
    pub const ALL: [RuntimeScript; 5] = [
        RuntimeScript::SwipeShift,
        RuntimeScript::ReadingProgress,
        RuntimeScript::InterceptClicks,
        RuntimeScript::Annotations,
        RuntimeScript::StyleInjection,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            RuntimeScript::SwipeShift => "swipe-shift.js",
            RuntimeScript::ReadingProgress => "reading-progress.js",
            RuntimeScript::InterceptClicks => "intercept-clicks.js",
            RuntimeScript::Annotations => "annotations.js",
            RuntimeScript::StyleInjection => "style-injection.js",
        }
    }

    pub fn contents(&self) -> &'static str {
        match self {
            RuntimeScript::SwipeShift => include_str!("../../assets/scripts/swipe-shift.js"),
            RuntimeScript::ReadingProgress => {
                include_str!("../../assets/scripts/reading-progress.js")
            }
            RuntimeScript::InterceptClicks => {
                include_str!("../../assets/scripts/intercept-clicks.js")
            }
            RuntimeScript::Annotations => include_str!("../../assets/scripts/annotations.js"),
            RuntimeScript::StyleInjection => {
                include_str!("../../assets/scripts/style-injection.js")
            }
        }
    }
}

/// Directory holding the runtime scripts
#[derive(Debug, Clone)]
pub struct ScriptsCache {
    dir: PathBuf,
}

impl ScriptsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn script_path(&self, script: RuntimeScript) -> PathBuf {
        self.dir.join(script.file_name())
    }

    /// `file://` URLs of every script, in injection order
    pub fn script_urls(&self) -> Vec<String> {
        RuntimeScript::ALL
            .iter()
            .map(|script| file_url(&self.script_path(*script)))
            .collect()
    }

    /// Write any script that is missing or out of date.
    ///
    /// Returns the paths of all scripts.
    pub async fn install(&self) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReaderError::CacheWriteFailure {
                path: self.dir.clone(),
                source,
            })?;

        let mut paths = Vec::with_capacity(RuntimeScript::ALL.len());
        for script in RuntimeScript::ALL {
            let path = self.script_path(script);
            let current = tokio::fs::read(&path).await.ok();

            if current.as_deref() != Some(script.contents().as_bytes()) {
                tokio::fs::write(&path, script.contents())
                    .await
                    .map_err(|source| ReaderError::CacheWriteFailure {
                        path: path.clone(),
                        source,
                    })?;
                tracing::debug!(script = script.file_name(), "Installed runtime script");
            }
            paths.push(path);
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_install_writes_all_scripts() {
        let dir = TempDir::new().unwrap();
        let cache = ScriptsCache::new(dir.path().join("scripts"));

        let paths = cache.install().await.unwrap();
        assert_eq!(paths.len(), 5);
        for (path, script) in paths.iter().zip(RuntimeScript::ALL) {
            let written = std::fs::read_to_string(path).unwrap();
            assert_eq!(written, script.contents());
        }
    }

    #[tokio::test]
    async fn test_install_repairs_modified_script() {
        let dir = TempDir::new().unwrap();
        let cache = ScriptsCache::new(dir.path());
        cache.install().await.unwrap();

        let path = cache.script_path(RuntimeScript::Annotations);
        std::fs::write(&path, "tampered").unwrap();
        cache.install().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            RuntimeScript::Annotations.contents()
        );
    }

    #[test]
    fn test_script_urls_in_injection_order() {
        let cache = ScriptsCache::new("/cache/scripts");
        let urls = cache.script_urls();
        assert_eq!(urls[0], "file:///cache/scripts/swipe-shift.js");
        assert_eq!(urls[4], "file:///cache/scripts/style-injection.js");
    }

    #[test]
    fn test_style_injection_announces_bridge() {
        assert!(RuntimeScript::StyleInjection
            .contents()
            .contains("bridgeReady"));
        assert!(RuntimeScript::SwipeShift.contents().contains("swipe-end"));
    }

    #[test]
    fn test_progress_has_fallback_timer() {
        let progress = RuntimeScript::ReadingProgress.contents();
        assert!(progress.contains("requestAnimationFrame"));
        assert!(progress.contains("setInterval(schedule"));
    }
}
