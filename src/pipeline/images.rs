//! Embedded-image OCR: extract every raster image of a PDF into a private
//! directory, recognise each one on its own task, and join the texts.
//!
//! ## Completion
//!
//! Fan-in goes through a [`JoinSet`]. A task's result is observed only after
//! the task's future has returned, which is after its OCR call has returned,
//! so the aggregate can never be finalised while a recognition is still
//! running. Tasks are throttled by a semaphore sized from
//! `ConversionConfig::ocr_concurrency`.
//!
//! ## Partial failure
//!
//! A failed image is logged, reported through the progress callback and
//! recorded as an [`ImageError`]; the other images are unaffected. Only a
//! failure to create the working directory or to run the extraction tool
//! fails the whole operation.
//!
//! An image recognised as blank (whitespace only) is a success that
//! contributes no fragment, so a blank scanned page never leaves a double
//! separator in the joined text.

use crate::config::ConversionConfig;
use crate::error::{ImageError, ImageOcrError};
use crate::pipeline::dual::panic_detail;
use crate::progress::ProgressCallback;
use crate::tools::{ImageExtractor, OcrEngine, Toolkit};
use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Joined OCR text of a document's images.
#[derive(Debug, Clone, Default)]
pub struct AggregatedBody {
    /// Trimmed fragments in image-path order, joined by one space.
    ///
    /// Every image that did not fail is represented, except those whose
    /// recognised text is empty after trimming (blank pages): they count as
    /// successes but add nothing here.
    pub text: String,
    /// Number of whitelisted image files found after extraction.
    pub images_found: usize,
    /// One entry per image whose OCR failed.
    pub failures: Vec<ImageError>,
}

/// Extracts and recognises the images of one PDF.
#[derive(Clone)]
pub struct ImageOcrFanOut {
    extractor: Arc<dyn ImageExtractor>,
    ocr: Arc<dyn OcrEngine>,
    extensions: Vec<String>,
    concurrency: usize,
    temp_root: PathBuf,
    progress: Option<ProgressCallback>,
}

impl ImageOcrFanOut {
    pub fn from_config(toolkit: &Toolkit, config: &ConversionConfig) -> Self {
        Self {
            extractor: Arc::clone(&toolkit.pdf_images),
            ocr: Arc::clone(&toolkit.ocr),
            extensions: config.image_extensions.clone(),
            concurrency: config.ocr_concurrency.max(1),
            temp_root: config.temp_root(),
            progress: config.progress_callback.clone(),
        }
    }

    /// Extract, recognise and aggregate the images of the PDF at `input`.
    ///
    /// The working directory is removed before this returns, on every path.
    pub async fn run(&self, input: &Path) -> Result<AggregatedBody, ImageOcrError> {
        let workdir = tempfile::Builder::new()
            .prefix("tmp-imgs-")
            .tempdir_in(&self.temp_root)
            .map_err(|e| ImageOcrError::TempDirectory {
                dir: self.temp_root.clone(),
                detail: e.to_string(),
            })?;

        let result = self.extract_and_recognise(input, workdir.path()).await;

        let dir = workdir.path().to_path_buf();
        if let Err(e) = workdir.close() {
            warn!("Failed to remove image directory {}: {}", dir.display(), e);
        }
        result
    }

    async fn extract_and_recognise(
        &self,
        input: &Path,
        workdir: &Path,
    ) -> Result<AggregatedBody, ImageOcrError> {
        {
            let extractor = Arc::clone(&self.extractor);
            let input = input.to_path_buf();
            let out_dir = workdir.to_path_buf();
            tokio::task::spawn_blocking(move || extractor.extract(&input, &out_dir))
                .await
                .map_err(|e| ImageOcrError::ExtractionCommand(panic_detail(e)))?
                .map_err(|e| ImageOcrError::ExtractionCommand(e.to_string()))?;
        }

        let images = discover_images(workdir, &self.extensions);
        let total = images.len();
        if total == 0 {
            debug!("No images extracted from {}", input.display());
            return Ok(AggregatedBody::default());
        }
        info!("OCR of {} images (concurrency {})", total, self.concurrency);
        if let Some(ref cb) = self.progress {
            cb.on_images_discovered(total);
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = ImageTasks::default();
        for path in images {
            let ocr = Arc::clone(&self.ocr);
            let permits = Arc::clone(&permits);
            let image = path.clone();
            tasks.spawn(path, async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let aborted = image.clone();
                tokio::task::spawn_blocking(move || recognize(ocr.as_ref(), &image))
                    .await
                    .unwrap_or_else(|e| {
                        Err(ImageError::Aborted {
                            path: aborted,
                            detail: panic_detail(e),
                        })
                    })
            });
        }

        let mut fragments: Vec<(PathBuf, String)> = Vec::with_capacity(total);
        let mut failures = Vec::new();
        while let Some((path, result)) = tasks.next().await {
            match result {
                Ok(text) => {
                    if let Some(ref cb) = self.progress {
                        cb.on_image_complete(&path, total, text.len());
                    }
                    if !text.is_empty() {
                        fragments.push((path, text));
                    }
                }
                Err(err) => {
                    warn!("{}", err);
                    if let Some(ref cb) = self.progress {
                        cb.on_image_error(&path, total, &err.to_string());
                    }
                    failures.push(err);
                }
            }
        }

        if let Some(ref cb) = self.progress {
            cb.on_ocr_complete(total, total - failures.len());
        }

        fragments.sort_by(|a, b| a.0.cmp(&b.0));
        let text = fragments
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            "OCR complete: {}/{} images, {} chars",
            total - failures.len(),
            total,
            text.len()
        );
        Ok(AggregatedBody {
            text,
            images_found: total,
            failures,
        })
    }
}

/// OCR tasks keyed by task id, so a task that dies still names its image.
#[derive(Default)]
struct ImageTasks {
    set: JoinSet<Result<String, ImageError>>,
    paths: HashMap<task::Id, PathBuf>,
}

impl ImageTasks {
    fn spawn<F>(&mut self, path: PathBuf, ocr: F)
    where
        F: Future<Output = Result<String, ImageError>> + Send + 'static,
    {
        let id = self.set.spawn(ocr).id();
        self.paths.insert(id, path);
    }

    /// Next finished task, in completion order.
    async fn next(&mut self) -> Option<(PathBuf, Result<String, ImageError>)> {
        let (id, outcome) = match self.set.join_next_with_id().await? {
            Ok((id, result)) => (id, Ok(result)),
            Err(e) => (e.id(), Err(panic_detail(e))),
        };
        let path = self.paths.remove(&id).unwrap_or_default();
        let result = outcome.unwrap_or_else(|detail| {
            Err(ImageError::Aborted {
                path: path.clone(),
                detail,
            })
        });
        Some((path, result))
    }
}

/// Whitelisted image files under `dir`, sorted by path.
fn discover_images(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|w| w.eq_ignore_ascii_case(ext)))
        })
        .collect();
    images.sort();
    images
}

fn recognize(ocr: &dyn OcrEngine, path: &Path) -> Result<String, ImageError> {
    let mut file = File::open(path).map_err(|e| ImageError::Open {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let output = ocr.recognize(&mut file).map_err(|e| ImageError::Ocr {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(output.text.trim().to_string())
}
