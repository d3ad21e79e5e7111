//! Progress-callback trait for the image-OCR stage.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while a scanned PDF's images are being recognised. Text-layer
//! extraction is a single external call and reports nothing.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docconv::{ConversionProgressCallback, ConversionConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, image: &Path, total: usize, text_len: usize) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}/{total} {} ({text_len} bytes)", image.display());
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = ConversionConfig::builder()
//!     .progress_callback(cb as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the image-OCR stage as images are discovered and recognised.
///
/// All methods have default no-op implementations. Events are emitted from the
/// single task that collects OCR results, one at a time, but that task may run
/// on any runtime thread, hence `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after image extraction, before any OCR task starts.
    ///
    /// Not called when the document has no images.
    fn on_images_discovered(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called when OCR of one image has finished successfully.
    fn on_image_complete(&self, image: &Path, total_images: usize, text_len: usize) {
        let _ = (image, total_images, text_len);
    }

    /// Called when OCR of one image failed. The image is left out of the body.
    fn on_image_error(&self, image: &Path, total_images: usize, error: &str) {
        let _ = (image, total_images, error);
    }

    /// Called once after every OCR task has finished.
    fn on_ocr_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
