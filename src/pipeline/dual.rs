//! Concurrent body + metadata extraction with a two-way join.
//!
//! Body text comes from an external converter writing to a temp file;
//! metadata comes from a [`MetadataSource`]. Both run on blocking threads at
//! the same time and the extractor waits for both, whichever finishes first.
//! A failure on either side fails the attempt. A panic on the metadata side
//! is caught at the task boundary and reported as
//! [`ExtractError::MetadataDecode`].

use crate::error::{ExtractError, ToolError};
use crate::pipeline::metadata::{MetadataNormalizer, MetadataRecord};
use crate::pipeline::resource::LocalResource;
use crate::tools::ole::is_property_set;
use crate::tools::{BodyConverter, CompoundFileReader, DocumentInfo, Properties, PropertySetDecoder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Body text and normalised metadata of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub body: String,
    pub meta: MetadataRecord,
}

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Success(Extracted),
    Failure(ExtractError),
}

impl ExtractionOutcome {
    pub fn into_result(self) -> Result<Extracted, ExtractError> {
        match self {
            Self::Success(extracted) => Ok(extracted),
            Self::Failure(err) => Err(err),
        }
    }
}

/// The metadata side of a dual-channel extraction.
pub trait MetadataSource: Send + Sync {
    fn read(&self, input: &Path) -> Result<Properties, ExtractError>;
}

/// Property sets of a compound-file container.
pub struct CompoundMetadata {
    reader: Arc<dyn CompoundFileReader>,
    decoder: Arc<dyn PropertySetDecoder>,
}

impl CompoundMetadata {
    pub fn new(reader: Arc<dyn CompoundFileReader>, decoder: Arc<dyn PropertySetDecoder>) -> Self {
        Self { reader, decoder }
    }
}

impl MetadataSource for CompoundMetadata {
    fn read(&self, input: &Path) -> Result<Properties, ExtractError> {
        let mut container = self
            .reader
            .open(input)
            .map_err(|e| ExtractError::ContainerParse(e.to_string()))?;

        let mut props = Properties::new();
        for entry in container.entries() {
            if !is_property_set(&entry) {
                continue;
            }
            let decoded = container
                .read_stream(&entry)
                .and_then(|stream| self.decoder.decode(&stream));
            match decoded {
                Ok(pairs) => props.extend(pairs),
                Err(e) => {
                    // Keep what was decoded so far; later sets are skipped.
                    warn!("Could not decode property set {}: {}", entry.path, e);
                    break;
                }
            }
        }
        debug!("Read {} properties from {}", props.len(), input.display());
        Ok(props)
    }
}

/// A document-info collaborator used as a metadata source.
pub struct InfoMetadata {
    info: Arc<dyn DocumentInfo>,
}

impl InfoMetadata {
    pub fn new(info: Arc<dyn DocumentInfo>) -> Self {
        Self { info }
    }
}

impl MetadataSource for InfoMetadata {
    fn read(&self, input: &Path) -> Result<Properties, ExtractError> {
        self.info
            .info(input)
            .map_err(|e| ExtractError::MetadataDecode(e.to_string()))
    }
}

/// Runs body and metadata extraction concurrently and joins both.
#[derive(Clone)]
pub struct DualChannelExtractor {
    metadata: Arc<dyn MetadataSource>,
    body: Arc<dyn BodyConverter>,
    normalizer: MetadataNormalizer,
    temp_root: PathBuf,
}

impl DualChannelExtractor {
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        body: Arc<dyn BodyConverter>,
        normalizer: MetadataNormalizer,
        temp_root: PathBuf,
    ) -> Self {
        Self {
            metadata,
            body,
            normalizer,
            temp_root,
        }
    }

    /// Extract body and metadata from `resource`.
    ///
    /// Both channels always run to completion before this returns.
    pub async fn extract(&self, resource: &LocalResource) -> ExtractionOutcome {
        let meta_task = {
            let source = Arc::clone(&self.metadata);
            let input = resource.path().to_path_buf();
            tokio::task::spawn_blocking(move || source.read(&input))
        };
        let body_task = {
            let body = Arc::clone(&self.body);
            let input = resource.path().to_path_buf();
            let temp_root = self.temp_root.clone();
            tokio::task::spawn_blocking(move || convert_body(body.as_ref(), &input, &temp_root))
        };

        let (meta, body) = tokio::join!(meta_task, body_task);

        let meta = meta.unwrap_or_else(|e| Err(ExtractError::MetadataDecode(panic_detail(e))));
        let body = body.unwrap_or_else(|e| {
            Err(ExtractError::BodyCommand(format!(
                "body task aborted: {}",
                panic_detail(e)
            )))
        });

        match (body, meta) {
            (Ok(body), Ok(raw)) => ExtractionOutcome::Success(Extracted {
                body,
                meta: self.normalizer.normalize(raw),
            }),
            (Err(e), _) | (_, Err(e)) => {
                debug!("Extraction attempt failed: {}", e);
                ExtractionOutcome::Failure(e)
            }
        }
    }
}

/// Run the converter into a private temp directory and read the result back.
///
/// The output path does not exist until the converter writes it. The
/// directory is removed when this returns, on every path.
fn convert_body(
    converter: &dyn BodyConverter,
    input: &Path,
    temp_root: &Path,
) -> Result<String, ExtractError> {
    let workdir = tempfile::Builder::new()
        .prefix("docconv-")
        .tempdir_in(temp_root)
        .map_err(|e| ExtractError::BodyCommand(format!("temp output directory: {e}")))?;
    let output = workdir.path().join("body.txt");

    converter
        .convert(input, &output)
        .map_err(|e| match e {
            ToolError::MissingOutput { .. } => ExtractError::BodyRead(e.to_string()),
            other => ExtractError::BodyCommand(other.to_string()),
        })?;

    std::fs::read(&output)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| ExtractError::BodyRead(format!("{}: {e}", output.display())))
}

/// Human-readable reason a blocking task did not return.
pub(crate) fn panic_detail(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
