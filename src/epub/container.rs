//! `META-INF/container.xml` resolution

use quick_xml::events::Event;
use quick_xml::Reader;

use super::archive::ArchiveReader;
use super::path;
use crate::error::{ReaderError, Result};

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Locate the package document declared by the archive's container.
///
/// The first `rootfile` with a `full-path` wins; additional root files are
/// ignored.
pub fn locate_package(archive: &mut dyn ArchiveReader) -> Result<String> {
    let content = archive
        .read_text(CONTAINER_PATH)?
        .ok_or(ReaderError::ContainerMissing)?;

    let package_path = parse_container(&content)?;
    tracing::debug!(package_path = %package_path, "Resolved package document");
    Ok(package_path)
}

/// Extract the first rootfile `full-path` from container XML.
pub fn parse_container(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() != b"full-path" {
                        continue;
                    }
                    let value = attr
                        .unescape_value()
                        .map_err(|e| ReaderError::ContainerMalformed(e.to_string()))?;
                    let full_path = path::normalize(&path::decode(value.trim()));
                    if !full_path.is_empty() {
                        return Ok(full_path);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ReaderError::ContainerMalformed(e.to_string())),
            _ => {}
        }
    }

    Err(ReaderError::ContainerMalformed(
        "no rootfile with a full-path attribute".to_string(),
    ))
}
