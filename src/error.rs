//! Error types for the Los Libros reader core

use std::path::PathBuf;
use thiserror::Error;

/// Library-wide result type
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Reader error type
#[derive(Error, Debug)]
pub enum ReaderError {
    /// `META-INF/container.xml` is absent from the archive
    #[error("Container document not found: META-INF/container.xml")]
    ContainerMissing,

    #[error("Malformed container document: {0}")]
    ContainerMalformed(String),

    #[error("Package document not found: {0}")]
    PackageNotFound(String),

    #[error("Malformed package document: {0}")]
    PackageMalformed(String),

    #[error("TOC document not found: {0}")]
    TocNotFound(String),

    #[error("Malformed TOC document: {0}")]
    TocMalformed(String),

    /// The spine item's content is missing from the archive
    #[error("Chapter not found: {0}")]
    ChapterNotFound(String),

    /// A referenced resource is missing. Logged and skipped during rewriting.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Failed to write cache entry {path}: {source}")]
    CacheWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),

    #[error("Bridge protocol error: {0}")]
    BridgeProtocol(String),

    #[error("Chapter index {index} out of range (book has {count} chapters)")]
    NavigationOutOfRange { index: usize, count: usize },

    #[error("Progress store error: {0}")]
    Progress(#[from] sqlx::Error),

    #[error("Book not registered with cache: {0}")]
    UnknownBook(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ReaderError {
    /// Whether this error aborts loading a book.
    ///
    /// TOC failures degrade to an empty navigation list instead.
    pub fn is_fatal_to_load(&self) -> bool {
        matches!(
            self,
            ReaderError::ContainerMissing
                | ReaderError::ContainerMalformed(_)
                | ReaderError::PackageNotFound(_)
                | ReaderError::PackageMalformed(_)
                | ReaderError::Archive(_)
                | ReaderError::Io(_)
        )
    }
}

impl From<tokio::task::JoinError> for ReaderError {
    fn from(e: tokio::task::JoinError) -> Self {
        ReaderError::Task(e.to_string())
    }
}
