//! Input materialisation: copy the caller's stream to a local temp file.
//!
//! The external converters need a file-system path, and the fallback path
//! needs to re-read the same bytes. [`LocalResource`] owns a
//! `NamedTempFile` in the configured temp base directory; the file is
//! removed when the resource is disposed or dropped, whichever comes first,
//! including during unwinding.

use crate::error::DocConvError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// The caller's input copied to disk for the duration of one conversion.
#[derive(Debug)]
pub struct LocalResource {
    file: NamedTempFile,
}

impl LocalResource {
    /// Copy `input` into a new temp file under `base`.
    pub fn materialize<R: Read>(
        mut input: R,
        base: &Path,
        prefix: &str,
    ) -> Result<Self, DocConvError> {
        let creation = |source: io::Error| DocConvError::ResourceCreation {
            dir: base.to_path_buf(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(base)
            .map_err(creation)?;
        let bytes = io::copy(&mut input, &mut file).map_err(creation)?;
        file.flush().map_err(creation)?;

        debug!("Materialised {} bytes to {}", bytes, file.path().display());
        Ok(Self { file })
    }

    /// Stable path of the local copy.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Move the read position back to the first byte.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.file.as_file_mut().seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// A second handle on the same open file, sharing its read position.
    pub fn handle(&self) -> io::Result<File> {
        self.file.as_file().try_clone()
    }

    /// Read the first `N` bytes (fewer if the file is shorter) and rewind.
    pub fn peek<const N: usize>(&mut self) -> io::Result<Vec<u8>> {
        self.rewind()?;
        let mut head = Vec::with_capacity(N);
        self.file.as_file_mut().take(N as u64).read_to_end(&mut head)?;
        self.rewind()?;
        Ok(head)
    }

    /// Delete the local copy now, logging rather than failing on error.
    pub fn dispose(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Container families the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Word 97–2003 binary document in an OLE2 compound file.
    Doc,
    /// Office Open XML word-processing document.
    Docx,
    /// Portable Document Format.
    Pdf,
}

/// OLE2 / CFB signature, `D0 CF 11 E0 A1 B1 1A E1`.
const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const PDF_MAGIC: [u8; 4] = *b"%PDF";

impl DocumentKind {
    /// Identify the container from its leading bytes.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.starts_with(&CFB_MAGIC) {
            Some(Self::Doc)
        } else if head.starts_with(&PDF_MAGIC) {
            Some(Self::Pdf)
        } else if head.starts_with(&ZIP_MAGIC) {
            Some(Self::Docx)
        } else {
            None
        }
    }

    /// Map a file extension (case-insensitive, without dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "doc" | "dot" => Some(Self::Doc),
            "docx" | "dotx" | "docm" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Prefix used for the temp file holding the input.
    pub(crate) fn temp_prefix(self) -> &'static str {
        match self {
            Self::Doc => "docconv-doc-",
            Self::Docx => "docconv-docx-",
            Self::Pdf => "docconv-pdf-",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_copies_and_dispose_removes() {
        let dir = tempfile::tempdir().unwrap();
        let res = LocalResource::materialize(&b"%PDF-1.7 body"[..], dir.path(), "t-").unwrap();
        let path = res.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 body");

        res.dispose();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let res = LocalResource::materialize(&b"abc"[..], dir.path(), "t-").unwrap();
            res.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn materialize_into_missing_dir_fails() {
        let err = LocalResource::materialize(&b"abc"[..], Path::new("/no/such/dir/x"), "t-")
            .unwrap_err();
        assert!(matches!(err, DocConvError::ResourceCreation { .. }));
    }

    #[test]
    fn rewind_resets_shared_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut res = LocalResource::materialize(&b"0123456789"[..], dir.path(), "t-").unwrap();
        let mut handle = res.handle().unwrap();
        // The copy left the position at the end.
        assert_eq!(handle.stream_position().unwrap(), 10);

        res.rewind().unwrap();
        assert_eq!(handle.stream_position().unwrap(), 0);
        let mut s = String::new();
        handle.read_to_string(&mut s).unwrap();
        assert_eq!(s, "0123456789");
    }

    #[test]
    fn peek_reads_head_and_rewinds() {
        let dir = tempfile::tempdir().unwrap();
        let mut res = LocalResource::materialize(&b"%PDF-1.4\n"[..], dir.path(), "t-").unwrap();
        assert_eq!(res.peek::<4>().unwrap(), b"%PDF");
        assert_eq!(res.handle().unwrap().stream_position().unwrap(), 0);
    }

    #[test]
    fn sniff_known_containers() {
        assert_eq!(DocumentKind::sniff(&CFB_MAGIC), Some(DocumentKind::Doc));
        assert_eq!(DocumentKind::sniff(b"%PDF-1.7"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::sniff(b"PK\x03\x04rest"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::sniff(b"{\\rtf1"), None);
        assert_eq!(DocumentKind::sniff(b""), None);
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("DOC"), Some(DocumentKind::Doc));
        assert_eq!(DocumentKind::from_extension("docx"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("txt"), None);
    }
}
