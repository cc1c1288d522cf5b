//! On-disk chapter cache
//!
//! Layout: `<root>/<book_id>/<archive path>` for prepared chapters and their
//! sibling resources, `<root>/scripts/` for the shared runtime scripts.
//! Each book directory carries a stamp recording the archive fingerprint it
//! was built from; a fingerprint mismatch purges the directory.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell, RwLock};

use crate::chapter::{ChapterArtifact, ChapterProcessor, EmbeddingMode, ScriptsCache, StyleConfig};
use crate::epub::{LoadedBook, ZipArchiveReader};
use crate::error::{ReaderError, Result};

const STAMP_FILE: &str = ".libros-stamp.json";
const SCRIPTS_DIR: &str = "scripts";

/// Record of what a book directory was built from
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheStamp {
    fingerprint: String,
    /// Spine href → artifact
    artifacts: HashMap<String, ChapterArtifact>,
}

#[derive(Debug, Clone)]
struct BookSource {
    archive_path: PathBuf,
    fingerprint: String,
}

/// Thread-safe chapter cache
#[derive(Clone)]
pub struct ChapterCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    root: PathBuf,
    mode: EmbeddingMode,
    processor: ChapterProcessor,
    scripts: ScriptsCache,
    scripts_ready: OnceCell<()>,
    books: RwLock<HashMap<String, BookSource>>,
    /// Serializes stamp read-modify-write cycles
    stamp_lock: Mutex<()>,
}

impl ChapterCache {
    pub fn new(root: impl Into<PathBuf>, mode: EmbeddingMode, style: Option<StyleConfig>) -> Self {
        let root = root.into();
        let scripts = ScriptsCache::new(root.join(SCRIPTS_DIR));
        let processor = ChapterProcessor::new(&scripts, style);

        Self {
            inner: Arc::new(CacheInner {
                root,
                mode,
                processor,
                scripts,
                scripts_ready: OnceCell::new(),
                books: RwLock::new(HashMap::new()),
                stamp_lock: Mutex::new(()),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn embedding_mode(&self) -> EmbeddingMode {
        self.inner.mode
    }

    /// Shared, book-independent scripts directory
    pub fn scripts_dir(&self) -> &Path {
        self.inner.scripts.dir()
    }

    pub fn book_dir(&self, book_id: &str) -> PathBuf {
        self.inner.root.join(book_id)
    }

    /// Make a loaded book's archive available to `get`
    pub async fn register(&self, book: &LoadedBook) {
        self.register_source(&book.book_id, book.archive_path.clone(), book.fingerprint.clone())
            .await;
    }

    pub async fn register_source(&self, book_id: &str, archive_path: PathBuf, fingerprint: String) {
        let mut books = self.inner.books.write().await;
        books.insert(
            book_id.to_string(),
            BookSource {
                archive_path,
                fingerprint,
            },
        );
    }

    /// Prepared chapter for a spine href, reusing a fresh artifact when present.
    pub async fn get(&self, book_id: &str, spine_href: &str) -> Result<ChapterArtifact> {
        self.ensure_scripts().await?;

        let source = {
            let books = self.inner.books.read().await;
            books
                .get(book_id)
                .cloned()
                .ok_or_else(|| ReaderError::UnknownBook(book_id.to_string()))?
        };
        let book_dir = self.checked_book_dir(book_id)?;

        if let Some(artifact) = self.lookup(&book_dir, &source, spine_href).await? {
            tracing::debug!(book_id, href = spine_href, "Chapter cache hit");
            return Ok(artifact);
        }

        tracing::debug!(book_id, href = spine_href, "Chapter cache miss, preparing");

        let inner = self.inner.clone();
        let href = spine_href.to_string();
        let dir = book_dir.clone();
        let archive_path = source.archive_path.clone();
        let artifact = tokio::task::spawn_blocking(move || {
            let mut archive = ZipArchiveReader::open(&archive_path)?;
            inner.processor.prepare(&mut archive, &href, &dir, inner.mode)
        })
        .await??;

        self.record(&book_dir, &source, &artifact).await?;
        Ok(artifact)
    }

    /// Remove every cached artifact of a book
    pub async fn invalidate(&self, book_id: &str) -> Result<()> {
        let book_dir = self.checked_book_dir(book_id)?;
        let _guard = self.inner.stamp_lock.lock().await;

        match tokio::fs::remove_dir_all(&book_dir).await {
            Ok(()) => {
                tracing::info!(book_id, "Invalidated chapter cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Book directory for an id that names exactly one entry under the root
    fn checked_book_dir(&self, book_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(book_id).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        if !single || book_id == SCRIPTS_DIR || book_id != book_id.trim() {
            tracing::warn!(book_id, "Rejecting book id outside the cache layout");
            return Err(ReaderError::UnknownBook(book_id.to_string()));
        }
        Ok(self.book_dir(book_id))
    }

    async fn ensure_scripts(&self) -> Result<()> {
        self.inner
            .scripts_ready
            .get_or_try_init(|| async { self.inner.scripts.install().await.map(|_| ()) })
            .await?;
        Ok(())
    }

    /// Check the stamp; purge the book directory when it is stale.
    async fn lookup(
        &self,
        book_dir: &Path,
        source: &BookSource,
        spine_href: &str,
    ) -> Result<Option<ChapterArtifact>> {
        let _guard = self.inner.stamp_lock.lock().await;

        match read_stamp(book_dir).await {
            Some(stamp) if stamp.fingerprint == source.fingerprint => {
                let Some(artifact) = stamp.artifacts.get(spine_href) else {
                    return Ok(None);
                };
                let exists = tokio::fs::try_exists(&artifact.prepared_path)
                    .await
                    .unwrap_or(false);
                if artifact.embedding_mode == self.inner.mode && exists {
                    return Ok(Some(artifact.clone()));
                }
                Ok(None)
            }
            stale => {
                if stale.is_some() {
                    tracing::info!(book_dir = %book_dir.display(), "Archive changed, purging cached chapters");
                }
                purge(book_dir).await?;
                let fresh = CacheStamp {
                    fingerprint: source.fingerprint.clone(),
                    artifacts: HashMap::new(),
                };
                write_stamp(book_dir, &fresh).await?;
                Ok(None)
            }
        }
    }

    async fn record(&self, book_dir: &Path, source: &BookSource, artifact: &ChapterArtifact) -> Result<()> {
        let _guard = self.inner.stamp_lock.lock().await;

        let mut stamp = read_stamp(book_dir).await.unwrap_or_default();
        if stamp.fingerprint != source.fingerprint {
            stamp = CacheStamp {
                fingerprint: source.fingerprint.clone(),
                artifacts: HashMap::new(),
            };
        }
        stamp
            .artifacts
            .insert(artifact.source_href.clone(), artifact.clone());
        write_stamp(book_dir, &stamp).await
    }
}

async fn read_stamp(book_dir: &Path) -> Option<CacheStamp> {
    let bytes = tokio::fs::read(book_dir.join(STAMP_FILE)).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(stamp) => Some(stamp),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable cache stamp");
            None
        }
    }
}

async fn write_stamp(book_dir: &Path, stamp: &CacheStamp) -> Result<()> {
    let path = book_dir.join(STAMP_FILE);
    let write = async {
        tokio::fs::create_dir_all(book_dir).await?;
        let bytes = serde_json::to_vec_pretty(stamp).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, bytes).await
    };

    write
        .await
        .map_err(|source| ReaderError::CacheWriteFailure { path, source })
}

async fn purge(book_dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(book_dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
