//! Configuration types for document conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every external program the pipeline
//! shells out to is named in [`ToolCommands`], so deployments with
//! non-standard install locations only have to change configuration.

use crate::error::DocConvError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Raster image extensions produced by `pdfimages -j` that the OCR stage reads.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "tif", "tiff", "png", "pbm"];

/// Configuration for a document conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docconv::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .ocr_concurrency(4)
///     .ocr_language("deu")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Base directory for every temporary artifact (input copy, converter
    /// output, extracted images). `None` uses the OS temp directory.
    ///
    /// Tests point this at a private directory to assert nothing leaks.
    pub temp_dir: Option<PathBuf>,

    /// Run OCR on embedded images of PDFs without a text layer. Default: true.
    pub ocr_enabled: bool,

    /// Maximum number of OCR calls in flight at once. Default: 4.
    ///
    /// Every discovered image still gets its own task; this only bounds how
    /// many of them hold an OCR process at the same time.
    pub ocr_concurrency: usize,

    /// Language passed to the OCR engine. Default: "eng".
    pub ocr_language: String,

    /// File extensions (without dot, lower case) treated as OCR-able images.
    pub image_extensions: Vec<String>,

    /// Number of leading pages the font probe inspects. Default: 5.
    pub font_probe_pages: u32,

    /// Retry failed `.doc` extraction as `.docx`. Default: true.
    pub docx_fallback: bool,

    /// External program names.
    pub commands: ToolCommands,

    /// Per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            ocr_enabled: true,
            ocr_concurrency: 4,
            ocr_language: "eng".to_string(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            font_probe_pages: 5,
            docx_fallback: true,
            commands: ToolCommands::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("temp_dir", &self.temp_dir)
            .field("ocr_enabled", &self.ocr_enabled)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("ocr_language", &self.ocr_language)
            .field("image_extensions", &self.image_extensions)
            .field("font_probe_pages", &self.font_probe_pages)
            .field("docx_fallback", &self.docx_fallback)
            .field("commands", &self.commands)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The directory temporary artifacts are created in.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr_enabled = v;
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    /// Replace the image whitelist. Leading dots are stripped and names are
    /// lower-cased, so `".PNG"` and `"png"` are equivalent.
    pub fn image_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.image_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn font_probe_pages(mut self, n: u32) -> Self {
        self.config.font_probe_pages = n.max(1);
        self
    }

    pub fn docx_fallback(mut self, v: bool) -> Self {
        self.config.docx_fallback = v;
        self
    }

    pub fn commands(mut self, commands: ToolCommands) -> Self {
        self.config.commands = commands;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocConvError> {
        let c = &self.config;
        if c.ocr_concurrency == 0 {
            return Err(DocConvError::InvalidConfig(
                "OCR concurrency must be ≥ 1".into(),
            ));
        }
        if c.image_extensions.is_empty() {
            return Err(DocConvError::InvalidConfig(
                "At least one image extension is required".into(),
            ));
        }
        if let Some(ref dir) = c.temp_dir {
            if !Path::new(dir).is_dir() {
                return Err(DocConvError::InvalidConfig(format!(
                    "Temp directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        for (name, program) in c.commands.entries() {
            if program.trim().is_empty() {
                return Err(DocConvError::InvalidConfig(format!(
                    "Command for {name} must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Program names (or absolute paths) of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCommands {
    /// `.doc` → text converter, called as `wvText <input> <output>`.
    pub wv_text: String,
    /// PDF → text converter.
    pub pdftotext: String,
    /// PDF document-info dumper.
    pub pdfinfo: String,
    /// PDF embedded-image extractor.
    pub pdfimages: String,
    /// PDF font lister used by the image-heaviness probe.
    pub pdffonts: String,
    /// OCR engine.
    pub tesseract: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            wv_text: "wvText".to_string(),
            pdftotext: "pdftotext".to_string(),
            pdfinfo: "pdfinfo".to_string(),
            pdfimages: "pdfimages".to_string(),
            pdffonts: "pdffonts".to_string(),
            tesseract: "tesseract".to_string(),
        }
    }
}

impl ToolCommands {
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("wvText", self.wv_text.as_str()),
            ("pdftotext", self.pdftotext.as_str()),
            ("pdfinfo", self.pdfinfo.as_str()),
            ("pdfimages", self.pdfimages.as_str()),
            ("pdffonts", self.pdffonts.as_str()),
            ("tesseract", self.tesseract.as_str()),
        ]
    }
}
