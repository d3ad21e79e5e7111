//! PDF pipeline: text layer and metadata first, then image OCR when the
//! document looks like a scan.

use crate::config::ConversionConfig;
use crate::error::DocConvError;
use crate::pipeline::dual::{DualChannelExtractor, Extracted, InfoMetadata};
use crate::pipeline::fallback::FormatFallbackController;
use crate::pipeline::images::{AggregatedBody, ImageOcrFanOut};
use crate::pipeline::metadata::MetadataNormalizer;
use crate::pipeline::probe::FontHeuristic;
use crate::pipeline::resource::LocalResource;
use crate::tools::Toolkit;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of the PDF pipeline.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// Text-layer body (with any OCR text appended) and metadata.
    pub extracted: Extracted,
    /// Whether the font probe classified the document as image-only.
    pub image_dominant: bool,
    /// The OCR aggregate, when the image branch ran and succeeded.
    pub images: Option<AggregatedBody>,
}

/// Text extraction plus the optional image-OCR branch for PDFs.
#[derive(Clone)]
pub struct PageDocumentPipeline {
    text: FormatFallbackController,
    heuristic: FontHeuristic,
    images: ImageOcrFanOut,
    ocr_enabled: bool,
}

impl PageDocumentPipeline {
    pub fn from_config(toolkit: &Toolkit, config: &ConversionConfig) -> Self {
        let primary = DualChannelExtractor::new(
            Arc::new(InfoMetadata::new(Arc::clone(&toolkit.pdf_info))),
            Arc::clone(&toolkit.pdf_body),
            MetadataNormalizer::PDF_INFO,
            config.temp_root(),
        );
        Self {
            // There is no alternate interpretation of a PDF.
            text: FormatFallbackController::new(primary, None),
            heuristic: FontHeuristic::new(Arc::clone(&toolkit.pdf_fonts)),
            images: ImageOcrFanOut::from_config(toolkit, config),
            ocr_enabled: config.ocr_enabled,
        }
    }

    pub async fn run(&self, resource: &mut LocalResource) -> Result<PageOutcome, DocConvError> {
        let mut extracted = self.text.run(resource).await?.extracted;

        if !self.ocr_enabled {
            return Ok(PageOutcome {
                extracted,
                image_dominant: false,
                images: None,
            });
        }

        let image_dominant = self.heuristic.image_dominant(resource.path()).await;
        if !image_dominant {
            return Ok(PageOutcome {
                extracted,
                image_dominant,
                images: None,
            });
        }

        info!("No fonts on the leading pages; running image OCR");
        let images = match self.images.run(resource.path()).await {
            Ok(aggregate) => {
                extracted.body = append_body(extracted.body, &aggregate.text);
                Some(aggregate)
            }
            Err(e) => {
                warn!("Image OCR failed, keeping the text layer only: {}", e);
                None
            }
        };

        Ok(PageOutcome {
            extracted,
            image_dominant,
            images,
        })
    }
}

/// Append `extra` to `body` with one space between them.
///
/// An empty side contributes nothing, so no stray separator is produced.
fn append_body(body: String, extra: &str) -> String {
    if extra.is_empty() {
        body
    } else if body.trim().is_empty() {
        extra.to_string()
    } else {
        format!("{body} {extra}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_joins_with_single_space() {
        assert_eq!(append_body("text layer".into(), "ocr text"), "text layer ocr text");
    }

    #[test]
    fn append_skips_empty_sides() {
        assert_eq!(append_body("text layer".into(), ""), "text layer");
        assert_eq!(append_body("\n".into(), "ocr text"), "ocr text");
        assert_eq!(append_body(String::new(), ""), "");
    }
}
