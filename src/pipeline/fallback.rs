//! Primary attempt, then at most one retry under the alternate container
//! interpretation.

use crate::error::{DocConvError, ExtractError};
use crate::pipeline::dual::{panic_detail, DualChannelExtractor, Extracted, ExtractionOutcome};
use crate::pipeline::metadata::MetadataNormalizer;
use crate::pipeline::resource::LocalResource;
use crate::tools::AlternateExtractor;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A successful extraction and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub extracted: Extracted,
    pub fallback_used: bool,
}

enum Stage {
    Primary,
    Fallback {
        primary: ExtractError,
        alternate: Arc<dyn AlternateExtractor>,
    },
    Done(Result<Resolved, DocConvError>),
}

/// Runs the primary extractor and, on failure, the alternate one.
#[derive(Clone)]
pub struct FormatFallbackController {
    primary: DualChannelExtractor,
    alternate: Option<Arc<dyn AlternateExtractor>>,
}

impl FormatFallbackController {
    pub fn new(primary: DualChannelExtractor, alternate: Option<Arc<dyn AlternateExtractor>>) -> Self {
        Self { primary, alternate }
    }

    /// Extract from `resource`. The alternate sees the same bytes from offset 0.
    pub async fn run(&self, resource: &mut LocalResource) -> Result<Resolved, DocConvError> {
        let mut stage = Stage::Primary;
        loop {
            stage = match stage {
                Stage::Primary => match self.primary.extract(resource).await {
                    ExtractionOutcome::Success(extracted) => Stage::Done(Ok(Resolved {
                        extracted,
                        fallback_used: false,
                    })),
                    ExtractionOutcome::Failure(primary) => match &self.alternate {
                        Some(alternate) => {
                            info!("Primary extraction failed ({}); retrying as .docx", primary);
                            Stage::Fallback {
                                primary,
                                alternate: Arc::clone(alternate),
                            }
                        }
                        None => Stage::Done(Err(DocConvError::Extraction { source: primary })),
                    },
                },
                Stage::Fallback { primary, alternate } => {
                    match run_alternate(alternate, resource).await {
                        Ok(extracted) => Stage::Done(Ok(Resolved {
                            extracted,
                            fallback_used: true,
                        })),
                        Err(fallback) => {
                            warn!("Fallback extraction failed: {}", fallback);
                            Stage::Done(Err(DocConvError::FallbackFailed { primary, fallback }))
                        }
                    }
                }
                Stage::Done(result) => return result,
            };
        }
    }
}

/// Rewind `resource` and run `alternate` over it on a blocking thread.
pub(crate) async fn run_alternate(
    alternate: Arc<dyn AlternateExtractor>,
    resource: &mut LocalResource,
) -> Result<Extracted, ExtractError> {
    resource
        .rewind()
        .map_err(|e| ExtractError::Alternate(format!("rewind failed: {e}")))?;
    let mut handle = resource
        .handle()
        .map_err(|e| ExtractError::Alternate(format!("reopen failed: {e}")))?;

    let output = tokio::task::spawn_blocking(move || alternate.convert(&mut handle))
        .await
        .map_err(|e| ExtractError::Alternate(panic_detail(e)))?
        .map_err(|e| ExtractError::Alternate(e.to_string()))?;

    debug!(
        "Alternate extractor returned {} chars, {} properties",
        output.text.len(),
        output.properties.len()
    );
    Ok(Extracted {
        body: output.text,
        meta: MetadataNormalizer::OPEN_XML.normalize(output.properties),
    })
}
