//! Error types for the edgequake-docconv library.
//!
//! Failures are layered by how far they are allowed to travel:
//!
//! * [`DocConvError`]: **fatal**. The conversion cannot produce a body at
//!   all (the input could not be materialised, both extraction attempts
//!   failed, the format is unknown). Returned as `Err(DocConvError)` from the
//!   top-level `convert*` functions.
//!
//! * [`ExtractError`]: the reason a single extraction attempt failed. The
//!   fallback controller consumes these; only when no attempt is left do
//!   they surface wrapped in a [`DocConvError`].
//!
//! * [`ImageOcrError`]: the image-OCR branch of the PDF pipeline failed as a
//!   whole. Logged by the pipeline, never returned to the caller.
//!
//! * [`ImageError`]: **non-fatal**. OCR of one image failed. Stored in
//!   [`crate::output::ConversionStats`] so callers can inspect what was
//!   dropped.
//!
//! * [`ToolError`]: what an external collaborator (command, parser) reports.
//!   The pipeline maps it into one of the types above.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docconv library.
#[derive(Debug, Error)]
pub enum DocConvError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input file could not be opened.
    #[error("Failed to open input '{path}': {source}")]
    InputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input stream could not be copied to a local temp file.
    #[error("Failed to create local copy of the input in '{dir}': {source}")]
    ResourceCreation {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input's leading bytes match none of the supported containers.
    #[error("Unsupported document format (first bytes: {magic:02X?})\nSupported: .doc, .docx, .pdf")]
    UnsupportedFormat { magic: Vec<u8> },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The only extraction attempt failed.
    #[error("Extraction failed: {source}")]
    Extraction {
        #[source]
        source: ExtractError,
    },

    /// The primary attempt failed and so did the alternate-format retry.
    #[error("Extraction failed: {fallback}\nPrimary attempt: {primary}")]
    FallbackFailed {
        primary: ExtractError,
        fallback: ExtractError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why one extraction attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractError {
    /// The resource is not a valid compound-file container.
    #[error("container parse error: {0}")]
    ContainerParse(String),

    /// The metadata channel terminated abnormally.
    #[error("metadata decode error: {0}")]
    MetadataDecode(String),

    /// The body-conversion command could not run or exited non-zero.
    #[error("body conversion command failed: {0}")]
    BodyCommand(String),

    /// The body-conversion command ran but its output could not be read.
    #[error("could not read converted body: {0}")]
    BodyRead(String),

    /// The alternate-format extractor failed.
    #[error("alternate format extraction failed: {0}")]
    Alternate(String),
}

/// Failure of the image-OCR branch as a whole.
#[derive(Debug, Error)]
pub enum ImageOcrError {
    /// The working directory for extracted images could not be created.
    #[error("could not create image working directory in '{dir}': {detail}")]
    TempDirectory { dir: PathBuf, detail: String },

    /// The image-extraction command failed.
    #[error("image extraction command failed: {0}")]
    ExtractionCommand(String),

    /// The font-listing probe failed.
    #[error("font probe failed: {0}")]
    FontProbe(String),
}

/// A non-fatal error for a single image.
///
/// Recorded in [`crate::output::ConversionStats::image_errors`]. The rest of
/// the images, and the document's text layer, are unaffected.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The extracted image file could not be opened.
    #[error("{path}: could not open image: {detail}")]
    Open { path: PathBuf, detail: String },

    /// The OCR engine returned an error.
    #[error("{path}: OCR failed: {detail}")]
    Ocr { path: PathBuf, detail: String },

    /// The OCR task panicked.
    #[error("{path}: OCR task aborted: {detail}")]
    Aborted { path: PathBuf, detail: String },
}

/// Error reported by an external collaborator.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started (missing binary, permissions).
    #[error("could not run '{program}': {source}\nIs it installed and on PATH?")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The program succeeded but did not produce the expected file.
    #[error("expected output '{path}' was not produced")]
    MissingOutput { path: PathBuf },

    /// The input bytes are not in the format the collaborator expects.
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_failed_mentions_both_attempts() {
        let e = DocConvError::FallbackFailed {
            primary: ExtractError::BodyCommand("wvText exited with 1".into()),
            fallback: ExtractError::Alternate("not a zip archive".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("not a zip archive"), "got: {msg}");
        assert!(msg.contains("wvText exited with 1"), "got: {msg}");
    }

    #[test]
    fn unsupported_format_shows_magic() {
        let e = DocConvError::UnsupportedFormat {
            magic: vec![0x7B, 0x5C],
        };
        assert!(e.to_string().contains("7B"));
    }

    #[test]
    fn tool_error_failed_display() {
        let e = ToolError::Failed {
            program: "pdfimages".into(),
            status: "exit status: 99".into(),
            stderr: "Couldn't open file".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pdfimages"));
        assert!(msg.contains("Couldn't open file"));
    }

    #[test]
    fn image_error_roundtrips_through_json() {
        let e = ImageError::Ocr {
            path: PathBuf::from("/tmp/img-000.png"),
            detail: "empty page".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ImageError = serde_json::from_str(&json).unwrap();
        assert!(back.to_string().contains("empty page"));
    }
}
