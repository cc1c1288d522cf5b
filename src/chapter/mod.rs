//! Chapter preparation module
//!
//! Produces display-ready chapter documents with embedded resources
//! resolved and the reader runtime injected.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod embed;
pub mod processor;
pub mod rewrite;
pub mod scripts;
pub mod style;

pub use processor::ChapterProcessor;
pub use scripts::{RuntimeScript, ScriptsCache};
pub use style::{StyleConfig, Theme};

/// How embedded resources are made reachable from a prepared chapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingMode {
    /// Resources written next to the chapter, referenced by `file://` URL
    #[default]
    SiblingFiles,
    /// Resources inlined as base64 `data:` URIs
    InlineDataUris,
}

impl FromStr for EmbeddingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sibling" | "sibling-files" => Ok(EmbeddingMode::SiblingFiles),
            "inline" | "inline-data-uris" => Ok(EmbeddingMode::InlineDataUris),
            other => Err(format!("unknown embedding mode: {}", other)),
        }
    }
}

impl fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingMode::SiblingFiles => write!(f, "sibling"),
            EmbeddingMode::InlineDataUris => write!(f, "inline"),
        }
    }
}

/// A prepared chapter on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterArtifact {
    /// Archive-absolute spine href the artifact was built from
    pub source_href: String,
    pub prepared_path: PathBuf,
    pub embedding_mode: EmbeddingMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_mode_parse() {
        assert_eq!("inline".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::InlineDataUris);
        assert_eq!("Sibling".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::SiblingFiles);
        assert!("both".parse::<EmbeddingMode>().is_err());
    }
}
