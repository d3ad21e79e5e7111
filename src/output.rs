//! Output types returned by the conversion entry points.

use crate::error::ImageError;
use crate::pipeline::metadata::MetadataRecord;
use crate::pipeline::resource::DocumentKind;
use serde::{Deserialize, Serialize};

/// The complete result of one conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Plain text of the document, with OCR text of scanned pages appended.
    pub body: String,

    /// Document properties, including the derived `ModifiedDate` and
    /// `CreatedDate` (Unix seconds) when the raw timestamps parsed.
    pub meta: MetadataRecord,

    /// How the result was produced.
    pub stats: ConversionStats,
}

/// How a conversion went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Container family the input was converted as.
    pub kind: DocumentKind,

    /// The primary attempt failed and the `.docx` extractor produced the result.
    pub fallback_used: bool,

    /// The font probe found no fonts, so image OCR was attempted.
    pub image_dominant: bool,

    /// Number of images found by the image-OCR stage.
    pub images_found: usize,

    /// Number of images whose OCR failed.
    pub images_failed: usize,

    /// Details of each failed image.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_errors: Vec<ImageError>,

    /// Wall-clock time for the whole conversion.
    pub duration_ms: u64,
}

impl ConversionStats {
    pub(crate) fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            fallback_used: false,
            image_dominant: false,
            images_found: 0,
            images_failed: 0,
            image_errors: Vec::new(),
            duration_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn serialises_kind_lowercase_and_skips_empty_errors() {
        let output = ConversionOutput {
            body: "hello".into(),
            meta: [("Title".to_string(), "Minutes".to_string())].into(),
            stats: ConversionStats::new(DocumentKind::Pdf),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["stats"]["kind"], "pdf");
        assert_eq!(json["meta"]["Title"], "Minutes");
        assert!(json["stats"].get("image_errors").is_none());
    }

    #[test]
    fn image_errors_are_serialised_when_present() {
        let mut stats = ConversionStats::new(DocumentKind::Pdf);
        stats.images_failed = 1;
        stats.image_errors.push(ImageError::Ocr {
            path: PathBuf::from("img-000.png"),
            detail: "blank".into(),
        });
        let json = serde_json::to_string(&stats).unwrap();
        let back: ConversionStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.image_errors.len(), 1);
    }
}
