//! EPUB parsing module
//!
//! Locates the package document, parses metadata, manifest, spine and the
//! table of contents, and loads books with a stable identity.

pub mod archive;
pub mod book;
pub mod container;
pub mod navigation;
pub mod package;
pub mod path;
pub mod types;
mod xml;

pub use archive::{ArchiveReader, ZipArchiveReader};
pub use book::{BookLoader, LoadedBook};
pub use container::locate_package;
pub use types::*;
