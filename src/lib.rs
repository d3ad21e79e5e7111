//! # edgequake-docconv
//!
//! Extract plain text and metadata from `.doc`, `.docx` and `.pdf` documents
//! by orchestrating the command-line tools that already know the formats.
//!
//! ## Why orchestration?
//!
//! `wvText`, `pdftotext`, `pdfinfo`, `pdfimages` and `tesseract` are mature
//! and fast, but each does one thing and fails in its own way. This crate
//! runs them concurrently where possible, falls back to the zip-based reader
//! when a "`.doc`" is really a `.docx`, recognises scanned PDFs page image by
//! page image, and turns whatever partial results survive into one
//! [`ConversionOutput`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! input stream
//!  │
//!  ├─ 1. Materialise  copy to a temp file, sniff the format
//!  ├─ 2. Extract      body ∥ metadata, joined (wvText + property sets,
//!  │                  pdftotext + pdfinfo)
//!  ├─ 3. Fallback     .doc only: rewind, retry once as .docx
//!  ├─ 4. Probe        .pdf only: no fonts on the first pages ⇒ scanned
//!  ├─ 5. OCR          pdfimages ─▶ tesseract × N (bounded) ─▶ join
//!  └─ 6. Output       body + metadata (with epoch dates) + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docconv::{convert_path, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert_path("minutes.doc", &config).await?;
//!     println!("{}", output.body);
//!     eprintln!("fallback used: {}", output.stats.fallback_used);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docconv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-docconv = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Package | Used for |
//! |------|---------|----------|
//! | `wvText` | wv | `.doc` body text |
//! | `pdftotext`, `pdfinfo`, `pdfimages`, `pdffonts` | poppler-utils | PDF text, metadata, images, font probe |
//! | `tesseract` | tesseract-ocr | OCR of scanned pages |
//!
//! `.docx` files and `.doc` metadata are read in-process and need no tools.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ToolCommands};
pub use convert::{
    convert, convert_doc, convert_docx, convert_path, convert_pdf, convert_sync, convert_to_file,
    Converter,
};
pub use error::{DocConvError, ExtractError, ImageError, ImageOcrError, ToolError};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::metadata::{normalize_properties, MetadataRecord};
pub use pipeline::resource::DocumentKind;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use tools::Toolkit;
