//! Conversion entry points.
//!
//! [`Converter`] holds a validated configuration and the collaborator
//! [`Toolkit`]; the free functions build one per call from a
//! [`ConversionConfig`]. Every entry point copies the caller's stream to a
//! local temp file first, because the external tools need a path, and
//! removes that copy before returning.

use crate::config::ConversionConfig;
use crate::error::DocConvError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::dual::{CompoundMetadata, DualChannelExtractor, Extracted};
use crate::pipeline::fallback::{run_alternate, FormatFallbackController};
use crate::pipeline::metadata::MetadataNormalizer;
use crate::pipeline::page::PageDocumentPipeline;
use crate::pipeline::resource::{DocumentKind, LocalResource};
use crate::tools::Toolkit;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Prefix of the input copy while its format is still unknown.
const SNIFF_PREFIX: &str = "docconv-in-";

/// Converts documents with one configuration and one set of collaborators.
#[derive(Clone)]
pub struct Converter {
    config: ConversionConfig,
    toolkit: Toolkit,
}

impl Converter {
    /// A converter using the command-line tools named in `config.commands`.
    pub fn new(config: ConversionConfig) -> Self {
        let toolkit = Toolkit::from_config(&config);
        Self { config, toolkit }
    }

    /// A converter using the given collaborators.
    pub fn with_toolkit(config: ConversionConfig, toolkit: Toolkit) -> Self {
        Self { config, toolkit }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert `input`, detecting its format from the leading bytes.
    ///
    /// # Errors
    /// [`DocConvError::UnsupportedFormat`] when the bytes match no supported
    /// container; otherwise as for the format-specific methods.
    pub async fn convert<R: Read>(&self, input: R) -> Result<ConversionOutput, DocConvError> {
        let start = Instant::now();
        let mut resource = self.materialize(input, SNIFF_PREFIX)?;
        let head = resource
            .peek::<8>()
            .map_err(|e| DocConvError::Internal(format!("reading local copy: {e}")))?;
        let kind = DocumentKind::sniff(&head).ok_or(DocConvError::UnsupportedFormat { magic: head })?;
        debug!("Detected {:?} input", kind);
        self.run(kind, resource, start).await
    }

    /// Convert a legacy `.doc`. Falls back to the `.docx` reader when the
    /// primary tools reject the input and `docx_fallback` is enabled.
    pub async fn convert_doc<R: Read>(&self, input: R) -> Result<ConversionOutput, DocConvError> {
        self.convert_as(DocumentKind::Doc, input).await
    }

    /// Convert an Office Open XML `.docx`.
    pub async fn convert_docx<R: Read>(&self, input: R) -> Result<ConversionOutput, DocConvError> {
        self.convert_as(DocumentKind::Docx, input).await
    }

    /// Convert a PDF, running image OCR on documents without a text layer.
    pub async fn convert_pdf<R: Read>(&self, input: R) -> Result<ConversionOutput, DocConvError> {
        self.convert_as(DocumentKind::Pdf, input).await
    }

    /// Convert `input` as `kind` without looking at its bytes.
    pub async fn convert_as<R: Read>(
        &self,
        kind: DocumentKind,
        input: R,
    ) -> Result<ConversionOutput, DocConvError> {
        let start = Instant::now();
        let resource = self.materialize(input, kind.temp_prefix())?;
        self.run(kind, resource, start).await
    }

    fn materialize<R: Read>(&self, input: R, prefix: &str) -> Result<LocalResource, DocConvError> {
        LocalResource::materialize(input, &self.config.temp_root(), prefix)
    }

    async fn run(
        &self,
        kind: DocumentKind,
        mut resource: LocalResource,
        start: Instant,
    ) -> Result<ConversionOutput, DocConvError> {
        info!("Converting {:?} document", kind);
        let result = self.dispatch(kind, &mut resource).await;
        resource.dispose();

        let mut output = result?;
        output.stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Conversion complete: {} chars, {} properties, {}ms",
            output.body.len(),
            output.meta.len(),
            output.stats.duration_ms
        );
        Ok(output)
    }

    async fn dispatch(
        &self,
        kind: DocumentKind,
        resource: &mut LocalResource,
    ) -> Result<ConversionOutput, DocConvError> {
        let mut stats = ConversionStats::new(kind);
        let Extracted { body, meta } = match kind {
            DocumentKind::Doc => {
                let resolved = self.doc_controller().run(resource).await?;
                stats.fallback_used = resolved.fallback_used;
                resolved.extracted
            }
            DocumentKind::Docx => run_alternate(Arc::clone(&self.toolkit.open_xml), resource)
                .await
                .map_err(|source| DocConvError::Extraction { source })?,
            DocumentKind::Pdf => {
                let outcome = PageDocumentPipeline::from_config(&self.toolkit, &self.config)
                    .run(resource)
                    .await?;
                stats.image_dominant = outcome.image_dominant;
                if let Some(images) = outcome.images {
                    stats.images_found = images.images_found;
                    stats.images_failed = images.failures.len();
                    stats.image_errors = images.failures;
                }
                outcome.extracted
            }
        };
        Ok(ConversionOutput { body, meta, stats })
    }

    fn doc_controller(&self) -> FormatFallbackController {
        let metadata = CompoundMetadata::new(
            Arc::clone(&self.toolkit.compound),
            Arc::clone(&self.toolkit.properties),
        );
        let primary = DualChannelExtractor::new(
            Arc::new(metadata),
            Arc::clone(&self.toolkit.doc_body),
            MetadataNormalizer::COMPOUND_FILE,
            self.config.temp_root(),
        );
        let alternate = self
            .config
            .docx_fallback
            .then(|| Arc::clone(&self.toolkit.open_xml));
        FormatFallbackController::new(primary, alternate)
    }
}

/// Convert `input`, detecting its format.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docconv::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = std::fs::File::open("report.doc")?;
/// let output = convert(file, &ConversionConfig::default()).await?;
/// println!("{}", output.body);
/// if let Some(modified) = output.meta.get("ModifiedDate") {
///     eprintln!("last saved at {modified}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert<R: Read>(
    input: R,
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocConvError> {
    Converter::new(config.clone()).convert(input).await
}

/// Convert a legacy `.doc` stream.
pub async fn convert_doc<R: Read>(
    input: R,
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocConvError> {
    Converter::new(config.clone()).convert_doc(input).await
}

/// Convert a `.docx` stream.
pub async fn convert_docx<R: Read>(
    input: R,
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocConvError> {
    Converter::new(config.clone()).convert_docx(input).await
}

/// Convert a PDF stream.
pub async fn convert_pdf<R: Read>(
    input: R,
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocConvError> {
    Converter::new(config.clone()).convert_pdf(input).await
}

/// Open and convert the file at `path`, detecting its format.
pub async fn convert_path(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocConvError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| DocConvError::InputOpen {
        path: path.to_path_buf(),
        source,
    })?;
    convert(file, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync<R: Read>(
    input: R,
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocConvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocConvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Convert `input` and write the body text to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file<R: Read>(
    input: R,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, DocConvError> {
    let output = convert(input, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| DocConvError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, &output.body)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output.stats)
}
