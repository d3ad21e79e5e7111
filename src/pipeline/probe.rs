//! Text-layer heuristic for PDFs.
//!
//! A PDF whose leading pages reference no fonts at all is most likely a
//! scan: its pages are images and `pdftotext` finds nothing worth keeping.
//! This is a heuristic. A scan with an OCR text layer lists fonts and is
//! treated as text; a text PDF whose first pages are cover images is not
//! affected because only the font list is consulted.

use crate::error::ImageOcrError;
use crate::pipeline::dual::panic_detail;
use crate::tools::FontProbe;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// `true` when the font listing of the probed pages is empty.
pub fn is_image_dominant(fonts: &[String]) -> bool {
    fonts.is_empty()
}

/// Runs the font-listing probe against a PDF.
#[derive(Clone)]
pub struct FontHeuristic {
    fonts: Arc<dyn FontProbe>,
}

impl FontHeuristic {
    pub fn new(fonts: Arc<dyn FontProbe>) -> Self {
        Self { fonts }
    }

    /// Probe `input`, surfacing a probe failure.
    pub async fn probe(&self, input: &Path) -> Result<bool, ImageOcrError> {
        let fonts = Arc::clone(&self.fonts);
        let input = input.to_path_buf();
        let listed = tokio::task::spawn_blocking(move || fonts.list_fonts(&input))
            .await
            .map_err(|e| ImageOcrError::FontProbe(panic_detail(e)))?
            .map_err(|e| ImageOcrError::FontProbe(e.to_string()))?;
        debug!("Font probe listed {} fonts", listed.len());
        Ok(is_image_dominant(&listed))
    }

    /// Probe `input`; a failed probe counts as "has a text layer".
    pub async fn image_dominant(&self, input: &Path) -> bool {
        match self.probe(input).await {
            Ok(dominant) => dominant,
            Err(e) => {
                warn!("{}; assuming the document has a text layer", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;

    struct Fonts(Result<Vec<&'static str>, ()>);

    impl FontProbe for Fonts {
        fn list_fonts(&self, _input: &Path) -> Result<Vec<String>, ToolError> {
            match &self.0 {
                Ok(names) => Ok(names.iter().map(|n| n.to_string()).collect()),
                Err(()) => Err(ToolError::Malformed("pdffonts: broken xref".into())),
            }
        }
    }

    #[test]
    fn empty_listing_is_image_dominant() {
        assert!(is_image_dominant(&[]));
        assert!(!is_image_dominant(&["Helvetica".to_string()]));
    }

    #[tokio::test]
    async fn fonts_present_means_text() {
        let h = FontHeuristic::new(Arc::new(Fonts(Ok(vec!["ABCDEF+Times-Roman"]))));
        assert!(!h.image_dominant(Path::new("a.pdf")).await);
    }

    #[tokio::test]
    async fn no_fonts_means_scan() {
        let h = FontHeuristic::new(Arc::new(Fonts(Ok(vec![]))));
        assert!(h.image_dominant(Path::new("a.pdf")).await);
    }

    #[tokio::test]
    async fn probe_error_is_not_image_dominant() {
        let h = FontHeuristic::new(Arc::new(Fonts(Err(()))));
        assert!(matches!(
            h.probe(Path::new("a.pdf")).await,
            Err(ImageOcrError::FontProbe(_))
        ));
        assert!(!h.image_dominant(Path::new("a.pdf")).await);
    }
}
