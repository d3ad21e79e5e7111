//! External collaborators: the parsers and programs that do the real work.
//!
//! The pipeline never parses a document format or recognises an image
//! itself. It talks to these traits, each a narrow process- or
//! library-boundary contract, and maps their [`ToolError`]s into its own
//! error taxonomy. All methods are blocking; the pipeline calls them from
//! `spawn_blocking` threads.
//!
//! [`Toolkit`] bundles one implementation of every contract. The defaults
//! come from [`Toolkit::from_config`]; tests swap individual pieces with the
//! `with_*` methods.

pub mod command;
pub mod ocr;
pub mod ole;
pub mod openxml;

use crate::config::ConversionConfig;
use crate::error::ToolError;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

/// Ordered `(name, value)` pairs as reported by a collaborator.
pub type Properties = Vec<(String, String)>;

/// Text plus metadata, as returned by whole-document collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub properties: Properties,
}

/// `Read + Seek` as one object-safe trait.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// One named entry of a compound-file container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundEntry {
    /// Full path of the stream inside the container.
    pub path: String,
    /// First UTF-16 code unit of the entry name. Property-set streams start
    /// with `0x0005`.
    pub initial: u16,
}

/// An opened compound-file container.
pub trait CompoundContainer {
    /// Every stream entry, in directory order.
    fn entries(&self) -> Vec<CompoundEntry>;

    /// The full contents of one entry's stream.
    fn read_stream(&mut self, entry: &CompoundEntry) -> Result<Vec<u8>, ToolError>;
}

/// Opens compound-file (OLE2 / CFB) containers.
pub trait CompoundFileReader: Send + Sync {
    /// Fails with [`ToolError::Malformed`] if `path` is not a compound file.
    fn open(&self, path: &Path) -> Result<Box<dyn CompoundContainer>, ToolError>;
}

/// Decodes a property-set stream into named values.
pub trait PropertySetDecoder: Send + Sync {
    fn decode(&self, stream: &[u8]) -> Result<Properties, ToolError>;
}

/// Converts a document file to plain text in another file.
pub trait BodyConverter: Send + Sync {
    /// Write the plain text of `input` to `output`.
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Reads document-level metadata of a file (the PDF info dictionary).
pub trait DocumentInfo: Send + Sync {
    fn info(&self, input: &Path) -> Result<Properties, ToolError>;
}

/// Whole-document extractor for the zip-based container format.
pub trait AlternateExtractor: Send + Sync {
    fn convert(&self, input: &mut dyn ReadSeek) -> Result<ToolOutput, ToolError>;
}

/// Extracts embedded raster images of a PDF into a directory.
pub trait ImageExtractor: Send + Sync {
    fn extract(&self, input: &Path, output_dir: &Path) -> Result<(), ToolError>;
}

/// Lists the fonts used by the leading pages of a PDF.
pub trait FontProbe: Send + Sync {
    fn list_fonts(&self, input: &Path) -> Result<Vec<String>, ToolError>;
}

/// Recognises the text of one image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &mut dyn Read) -> Result<ToolOutput, ToolError>;
}

/// One implementation of every collaborator contract.
#[derive(Clone)]
pub struct Toolkit {
    pub compound: Arc<dyn CompoundFileReader>,
    pub properties: Arc<dyn PropertySetDecoder>,
    pub doc_body: Arc<dyn BodyConverter>,
    pub open_xml: Arc<dyn AlternateExtractor>,
    pub pdf_info: Arc<dyn DocumentInfo>,
    pub pdf_body: Arc<dyn BodyConverter>,
    pub pdf_images: Arc<dyn ImageExtractor>,
    pub pdf_fonts: Arc<dyn FontProbe>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl Toolkit {
    /// The default tool-backed implementations, named by `config.commands`.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let cmds = &config.commands;
        Self {
            compound: Arc::new(ole::CfbReader),
            properties: Arc::new(ole::OlePropertySetDecoder),
            doc_body: Arc::new(command::ExternalBody::wv_text(&cmds.wv_text)),
            open_xml: Arc::new(openxml::OpenXmlExtractor),
            pdf_info: Arc::new(command::PdfInfo::new(&cmds.pdfinfo)),
            pdf_body: Arc::new(command::ExternalBody::pdftotext(&cmds.pdftotext)),
            pdf_images: Arc::new(command::PdfImages::new(&cmds.pdfimages)),
            pdf_fonts: Arc::new(command::PdfFonts::new(
                &cmds.pdffonts,
                config.font_probe_pages,
            )),
            ocr: Arc::new(ocr::TesseractOcr::new(
                &cmds.tesseract,
                &config.ocr_language,
            )),
        }
    }

    pub fn with_compound(mut self, reader: Arc<dyn CompoundFileReader>) -> Self {
        self.compound = reader;
        self
    }

    pub fn with_properties(mut self, decoder: Arc<dyn PropertySetDecoder>) -> Self {
        self.properties = decoder;
        self
    }

    pub fn with_doc_body(mut self, body: Arc<dyn BodyConverter>) -> Self {
        self.doc_body = body;
        self
    }

    pub fn with_open_xml(mut self, alt: Arc<dyn AlternateExtractor>) -> Self {
        self.open_xml = alt;
        self
    }

    pub fn with_pdf_info(mut self, info: Arc<dyn DocumentInfo>) -> Self {
        self.pdf_info = info;
        self
    }

    pub fn with_pdf_body(mut self, body: Arc<dyn BodyConverter>) -> Self {
        self.pdf_body = body;
        self
    }

    pub fn with_pdf_images(mut self, images: Arc<dyn ImageExtractor>) -> Self {
        self.pdf_images = images;
        self
    }

    pub fn with_pdf_fonts(mut self, fonts: Arc<dyn FontProbe>) -> Self {
        self.pdf_fonts = fonts;
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }
}
