//! Read access to the entries of an EPUB (ZIP) archive

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::Result;

/// Upper bound on buffer space reserved from a declared entry size
const MAX_PREALLOCATION: u64 = 1 << 20;

/// Byte and text reads by archive-internal path.
///
/// Implementations are owned by a single operation; they are not shared
/// between concurrent tasks. Missing entries are `Ok(None)` so each caller
/// can raise its own error kind.
pub trait ArchiveReader {
    fn read_bytes(&mut self, path: &str) -> Result<Option<Vec<u8>>>;

    fn contains(&self, path: &str) -> bool;

    /// Decode an entry as UTF-8 text, dropping a leading BOM.
    fn read_text(&mut self, path: &str) -> Result<Option<String>> {
        Ok(self.read_bytes(path)?.map(|bytes| {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
            String::from_utf8_lossy(bytes).into_owned()
        }))
    }
}

/// ZIP-backed archive reader
pub struct ZipArchiveReader<R: Read + Seek> {
    archive: ZipArchive<R>,
    names: Vec<String>,
}

impl ZipArchiveReader<BufReader<File>> {
    /// Open an archive on disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl ZipArchiveReader<Cursor<Vec<u8>>> {
    /// Wrap an archive already held in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::new(Cursor::new(data))
    }
}

impl<R: Read + Seek> ZipArchiveReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        let names = archive.file_names().map(str::to_string).collect();
        Ok(Self { archive, names })
    }

    /// Entry names as stored in the archive
    pub fn entry_names(&self) -> &[String] {
        &self.names
    }

    /// Map a requested path onto a stored entry name.
    ///
    /// Tries an exact match, then a case-insensitive one. Stored names are
    /// compared after separator and leading `./`/`/` cleanup.
    fn find_entry(&self, path: &str) -> Option<&str> {
        let wanted = path.trim_start_matches('/');

        if let Some(name) = self.names.iter().find(|n| n.as_str() == wanted) {
            return Some(name);
        }

        let wanted_lower = wanted.to_lowercase();
        self.names
            .iter()
            .find(|name| clean_entry_name(name).to_lowercase() == wanted_lower)
            .map(String::as_str)
    }
}

impl<R: Read + Seek> ArchiveReader for ZipArchiveReader<R> {
    fn read_bytes(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(name) = self.find_entry(path).map(str::to_string) else {
            return Ok(None);
        };

        let mut entry = match self.archive.by_name(&name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let capacity = entry.size().min(MAX_PREALLOCATION) as usize;
        let mut buf = Vec::with_capacity(capacity);
        entry.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    fn contains(&self, path: &str) -> bool {
        self.find_entry(path).is_some()
    }
}

fn clean_entry_name(name: &str) -> String {
    name.replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory EPUB archives for tests

    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::ZipArchiveReader;

    pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    pub const PACKAGE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="isbn">urn:isbn:000</dc:identifier>
    <dc:identifier id="bookid">urn:uuid:1234</dc:identifier>
    <dc:title>Test Book</dc:title>
    <dc:creator>Ada Writer</dc:creator>
    <dc:language>en</dc:language>
    <dc:date>2020-01-01</dc:date>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="ch1" href="Text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="Text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover-img" href="images/c.jpg" media-type="image/jpeg"/>
    <item id="pic" href="Images/a.png" media-type="image/png"/>
    <item id="css" href="Styles/main.css" media-type="text/css"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

    pub const NAV_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="toc">
    <ol>
      <li><a href="Text/ch1.xhtml">Chapter One</a></li>
      <li><a href="Text/ch2.xhtml#part">Chapter Two</a></li>
    </ol>
  </nav>
</body>
</html>"#;

    pub const CHAPTER_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>One</title>
  <link rel="stylesheet" type="text/css" href="../Styles/main.css"/>
</head>
<body>
  <h1 id="start">One</h1>
  <p>First.</p>
  <img src="../Images/a.png" alt="a"/>
  <img src="https://example.com/remote.png" alt="remote"/>
  <a href="ch2.xhtml">Next</a>
</body>
</html>"#;

    pub const CHAPTER_TWO: &str = r#"<html><head><title>Two</title></head><body><p id="part">Second.</p><img src="../Images/missing.png"/></body></html>"#;

    pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    /// Zip the given entries into an in-memory archive.
    pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// A small but complete EPUB 3 book with two chapters.
    pub fn sample_book() -> Vec<u8> {
        zip_bytes(&[
            ("mimetype", b"application/epub+zip"),
            ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", PACKAGE_OPF.as_bytes()),
            ("OEBPS/nav.xhtml", NAV_XHTML.as_bytes()),
            ("OEBPS/Text/ch1.xhtml", CHAPTER_ONE.as_bytes()),
            ("OEBPS/Text/ch2.xhtml", CHAPTER_TWO.as_bytes()),
            ("OEBPS/Images/a.png", PNG_BYTES),
            ("OEBPS/images/c.jpg", b"\xFF\xD8\xFFjpeg"),
            ("OEBPS/Styles/main.css", b"body { margin: 0; }"),
        ])
    }

    pub fn sample_reader() -> ZipArchiveReader<Cursor<Vec<u8>>> {
        ZipArchiveReader::from_bytes(sample_book()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_read_existing_entry() {
        let mut reader = sample_reader();
        let css = reader.read_text("OEBPS/Styles/main.css").unwrap();
        assert_eq!(css.as_deref(), Some("body { margin: 0; }"));
    }

    #[test]
    fn test_missing_entry_is_none() {
        let mut reader = sample_reader();
        assert!(reader.read_bytes("OEBPS/nope.xhtml").unwrap().is_none());
        assert!(!reader.contains("OEBPS/nope.xhtml"));
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let mut reader = sample_reader();
        assert!(reader.contains("oebps/images/A.PNG"));
        let bytes = reader.read_bytes("OEBPS/IMAGES/a.png").unwrap().unwrap();
        assert_eq!(bytes, PNG_BYTES);
    }

    #[test]
    fn test_read_text_strips_bom() {
        let data = zip_bytes(&[("a.txt", b"\xEF\xBB\xBFhello")]);
        let mut reader = ZipArchiveReader::from_bytes(data).unwrap();
        assert_eq!(reader.read_text("a.txt").unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn test_entry_larger_than_preallocation() {
        let big = vec![7u8; (MAX_PREALLOCATION as usize) * 2 + 3];
        let data = zip_bytes(&[("big.bin", big.as_slice())]);
        let mut reader = ZipArchiveReader::from_bytes(data).unwrap();
        assert_eq!(reader.read_bytes("big.bin").unwrap(), Some(big));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(ZipArchiveReader::from_bytes(b"plain text".to_vec()).is_err());
    }
}
