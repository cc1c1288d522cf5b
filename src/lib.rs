//! Los Libros reader core
//!
//! Opens EPUB archives, prepares display-ready chapters with their
//! resources embedded, and keeps a rendering surface in sync with the
//! reading position over a small JSON message bridge.

pub mod bridge;
pub mod cache;
pub mod chapter;
pub mod config;
pub mod epub;
pub mod error;

pub use cache::ChapterCache;
pub use config::Config;
pub use error::{ReaderError, Result};
