//! Extraction pipeline stages.
//!
//! Each submodule owns one step of the orchestration. The collaborators that
//! do the actual parsing live in [`crate::tools`]; nothing here understands a
//! file format.
//!
//! ## Data Flow
//!
//! ```text
//!                 ┌──────────── metadata (property sets / pdfinfo) ──┐
//! resource ──▶ dual                                                  join ──▶ metadata normaliser
//!                 └──────────── body (wvText / pdftotext) ───────────┘
//!                      ▲
//!   fallback ──────────┘  on failure: rewind, run the .docx extractor once
//!
//!   page (PDF only) ──▶ probe (pdffonts) ──▶ images (pdfimages ─▶ OCR × N ─▶ join)
//! ```
//!
//! 1. [`resource`]: copy the caller's stream to a local temp file
//! 2. [`dual`]: body and metadata channels, run concurrently and joined
//! 3. [`metadata`]: derive epoch-second dates from raw timestamps
//! 4. [`fallback`]: primary attempt, then at most one alternate-format retry
//! 5. [`probe`]: font-listing heuristic for image-only PDFs
//! 6. [`images`]: image extraction and parallel OCR with partial failure
//! 7. [`page`]: the PDF pipeline tying 2–6 together

pub mod dual;
pub mod fallback;
pub mod images;
pub mod metadata;
pub mod page;
pub mod probe;
pub mod resource;
