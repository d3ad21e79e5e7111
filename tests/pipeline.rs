//! Pipeline integration tests with in-process collaborator doubles.
//!
//! No external program is started: every collaborator in the [`Toolkit`] is
//! replaced. Each test gets a private temp base directory and checks that
//! nothing is left in it afterwards.
//!
//! Run with:
//!   cargo test --test pipeline

use edgequake_docconv::tools::{
    AlternateExtractor, BodyConverter, CompoundContainer, CompoundEntry, CompoundFileReader,
    DocumentInfo, FontProbe, ImageExtractor, OcrEngine, Properties, PropertySetDecoder, ReadSeek,
    ToolOutput,
};
use edgequake_docconv::{
    ConversionConfig, Converter, DocConvError, DocumentKind, ExtractError, ToolError, Toolkit,
};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const DOC_BYTES: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1 legacy document bytes";
const PDF_BYTES: &[u8] = b"%PDF-1.7\n pretend page content";

// ── Doubles ──────────────────────────────────────────────────────────────────

struct OneSetContainer;

impl CompoundContainer for OneSetContainer {
    fn entries(&self) -> Vec<CompoundEntry> {
        vec![
            CompoundEntry {
                path: "/WordDocument".into(),
                initial: u16::from(b'W'),
            },
            CompoundEntry {
                path: "/\u{5}SummaryInformation".into(),
                initial: 0x0005,
            },
        ]
    }

    fn read_stream(&mut self, _entry: &CompoundEntry) -> Result<Vec<u8>, ToolError> {
        Ok(b"summary".to_vec())
    }
}

struct FakeCompound;

impl CompoundFileReader for FakeCompound {
    fn open(&self, _path: &Path) -> Result<Box<dyn CompoundContainer>, ToolError> {
        Ok(Box::new(OneSetContainer))
    }
}

enum Decode {
    Summary,
    Panic,
}

struct FakeDecoder(Decode);

impl PropertySetDecoder for FakeDecoder {
    fn decode(&self, _stream: &[u8]) -> Result<Properties, ToolError> {
        match self.0 {
            Decode::Summary => Ok(vec![
                ("Title".into(), "Minutes".into()),
                ("LastSaveTime".into(), "2020-01-02 03:04:05 +0000 UTC".into()),
            ]),
            Decode::Panic => panic!("property set decoder crashed"),
        }
    }
}

/// Writes fixed text, or fails like a converter rejecting its input.
struct FakeBody(Option<&'static str>);

impl BodyConverter for FakeBody {
    fn convert(&self, _input: &Path, output: &Path) -> Result<(), ToolError> {
        match self.0 {
            Some(text) => Ok(std::fs::write(output, text)?),
            None => Err(ToolError::Failed {
                program: "converter".into(),
                status: "exit status: 1".into(),
                stderr: "unrecognised input".into(),
            }),
        }
    }
}

#[derive(Default)]
struct FakeAlternate {
    calls: AtomicUsize,
    seen: Mutex<Vec<(u64, Vec<u8>)>>,
    fail: bool,
}

impl AlternateExtractor for FakeAlternate {
    fn convert(&self, input: &mut dyn ReadSeek) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pos = input.seek(SeekFrom::Current(0))?;
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        self.seen.lock().unwrap().push((pos, bytes));
        if self.fail {
            return Err(ToolError::Malformed("not a zip archive".into()));
        }
        Ok(ToolOutput {
            text: "docx body".into(),
            properties: vec![("Created".into(), "2020-01-02T03:04:05Z".into())],
        })
    }
}

struct FakeInfo;

impl DocumentInfo for FakeInfo {
    fn info(&self, _input: &Path) -> Result<Properties, ToolError> {
        Ok(vec![
            ("Producer".into(), "scanner".into()),
            ("ModDate".into(), "2020-01-01T22:04:05-05:00".into()),
        ])
    }
}

#[derive(Default)]
struct FakeFonts {
    fonts: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FontProbe for FakeFonts {
    fn list_fonts(&self, _input: &Path) -> Result<Vec<String>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fonts.iter().map(|f| f.to_string()).collect())
    }
}

/// Writes `(file name, contents)` pairs into the image directory.
#[derive(Default)]
struct FakeImages {
    images: Vec<(String, String)>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeImages {
    fn numbered(contents: &[&str]) -> Self {
        Self {
            images: contents
                .iter()
                .enumerate()
                .map(|(i, c)| (format!("img-{i:03}.png"), c.to_string()))
                .collect(),
            ..Default::default()
        }
    }
}

impl ImageExtractor for FakeImages {
    fn extract(&self, _input: &Path, output_dir: &Path) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ToolError::Failed {
                program: "pdfimages".into(),
                status: "exit status: 1".into(),
                stderr: "Syntax Error".into(),
            });
        }
        for (name, contents) in &self.images {
            std::fs::write(output_dir.join(name), contents)?;
        }
        Ok(())
    }
}

/// Returns the image file's contents as its text.
///
/// `FAIL` fails. `SLOW:<text>` returns `<text>` after a long delay, well
/// after every other image has finished.
struct EchoOcr;

impl OcrEngine for EchoOcr {
    fn recognize(&self, image: &mut dyn Read) -> Result<ToolOutput, ToolError> {
        let mut contents = String::new();
        image.read_to_string(&mut contents)?;
        if contents == "FAIL" {
            return Err(ToolError::Malformed("unreadable image".into()));
        }
        let text = match contents.strip_prefix("SLOW:") {
            Some(rest) => {
                std::thread::sleep(Duration::from_millis(400));
                rest.to_string()
            }
            None => contents,
        };
        Ok(ToolOutput {
            text,
            properties: Vec::new(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

struct Doubles {
    decode: Decode,
    doc_body: Option<&'static str>,
    pdf_body: Option<&'static str>,
    alternate: Arc<FakeAlternate>,
    fonts: Arc<FakeFonts>,
    images: Arc<FakeImages>,
}

impl Default for Doubles {
    fn default() -> Self {
        Self {
            decode: Decode::Summary,
            doc_body: Some("Legacy body."),
            pdf_body: Some("Text layer."),
            alternate: Arc::new(FakeAlternate::default()),
            fonts: Arc::new(FakeFonts::default()),
            images: Arc::new(FakeImages::default()),
        }
    }
}

fn converter(dir: &TempDir, doubles: &Doubles, docx_fallback: bool, ocr: bool) -> Converter {
    let config = ConversionConfig::builder()
        .temp_dir(dir.path())
        .ocr_concurrency(3)
        .docx_fallback(docx_fallback)
        .ocr_enabled(ocr)
        .build()
        .unwrap();
    let decode = match doubles.decode {
        Decode::Summary => Decode::Summary,
        Decode::Panic => Decode::Panic,
    };
    let toolkit = Toolkit::from_config(&config)
        .with_compound(Arc::new(FakeCompound))
        .with_properties(Arc::new(FakeDecoder(decode)))
        .with_doc_body(Arc::new(FakeBody(doubles.doc_body)))
        .with_open_xml(doubles.alternate.clone())
        .with_pdf_info(Arc::new(FakeInfo))
        .with_pdf_body(Arc::new(FakeBody(doubles.pdf_body)))
        .with_pdf_images(doubles.images.clone())
        .with_pdf_fonts(doubles.fonts.clone())
        .with_ocr(Arc::new(EchoOcr));
    Converter::with_toolkit(config, toolkit)
}

fn assert_clean(dir: &TempDir) {
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

// ── Legacy documents ─────────────────────────────────────────────────────────

#[tokio::test]
async fn legacy_success_is_join_of_both_channels() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles::default();

    let output = converter(&dir, &doubles, true, true)
        .convert(DOC_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "Legacy body.");
    assert_eq!(output.meta["Title"], "Minutes");
    assert_eq!(output.meta["LastSaveTime"], "2020-01-02 03:04:05 +0000 UTC");
    assert_eq!(output.meta["ModifiedDate"], "1577934245");
    assert_eq!(output.stats.kind, DocumentKind::Doc);
    assert!(!output.stats.fallback_used);
    assert_eq!(doubles.alternate.calls.load(Ordering::SeqCst), 0);
    assert_clean(&dir);
}

#[tokio::test]
async fn failed_body_falls_back_once_from_the_start() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        doc_body: None,
        ..Default::default()
    };

    let output = converter(&dir, &doubles, true, true)
        .convert_doc(DOC_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "docx body");
    assert_eq!(output.meta["CreatedDate"], "1577934245");
    assert!(output.stats.fallback_used);

    let seen = doubles.alternate.seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "alternate must run exactly once");
    assert_eq!(seen[0].0, 0, "resource must be rewound before the retry");
    assert_eq!(seen[0].1, DOC_BYTES);
    drop(seen);
    assert_clean(&dir);
}

#[tokio::test]
async fn metadata_panic_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        decode: Decode::Panic,
        ..Default::default()
    };

    let output = converter(&dir, &doubles, true, true)
        .convert_doc(DOC_BYTES)
        .await
        .unwrap();

    assert!(output.stats.fallback_used);
    assert_eq!(doubles.alternate.calls.load(Ordering::SeqCst), 1);
    assert_clean(&dir);
}

#[tokio::test]
async fn both_attempts_failing_is_one_error() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        doc_body: None,
        alternate: Arc::new(FakeAlternate {
            fail: true,
            ..Default::default()
        }),
        ..Default::default()
    };

    let err = converter(&dir, &doubles, true, true)
        .convert_doc(DOC_BYTES)
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            DocConvError::FallbackFailed {
                primary: ExtractError::BodyCommand(_),
                fallback: ExtractError::Alternate(_),
            }
        ),
        "got: {err:?}"
    );
    assert_eq!(doubles.alternate.calls.load(Ordering::SeqCst), 1);
    assert_clean(&dir);
}

#[tokio::test]
async fn fallback_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        doc_body: None,
        ..Default::default()
    };

    let err = converter(&dir, &doubles, false, true)
        .convert_doc(DOC_BYTES)
        .await
        .unwrap_err();

    assert!(matches!(err, DocConvError::Extraction { .. }));
    assert_eq!(doubles.alternate.calls.load(Ordering::SeqCst), 0);
    assert_clean(&dir);
}

// ── PDFs ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fonts_present_skips_image_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        fonts: Arc::new(FakeFonts {
            fonts: vec!["Helvetica"],
            ..Default::default()
        }),
        images: Arc::new(FakeImages::numbered(&["never"])),
        ..Default::default()
    };

    let output = converter(&dir, &doubles, true, true)
        .convert(PDF_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "Text layer.");
    assert_eq!(output.meta["ModifiedDate"], "1577934245");
    assert!(!output.stats.image_dominant);
    assert_eq!(doubles.fonts.calls.load(Ordering::SeqCst), 1);
    assert_eq!(doubles.images.calls.load(Ordering::SeqCst), 0);
    assert_clean(&dir);
}

#[tokio::test]
async fn no_fonts_runs_image_ocr_and_appends() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        images: Arc::new(FakeImages::numbered(&["page-one", "page-two"])),
        ..Default::default()
    };

    let output = converter(&dir, &doubles, true, true)
        .convert_pdf(PDF_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "Text layer. page-one page-two");
    assert!(output.stats.image_dominant);
    assert_eq!(output.stats.images_found, 2);
    assert_eq!(doubles.images.calls.load(Ordering::SeqCst), 1);
    assert_clean(&dir);
}

#[tokio::test]
async fn fragment_counts_for_zero_one_and_five_images() {
    for n in [0usize, 1, 5] {
        let dir = tempfile::tempdir().unwrap();
        let contents: Vec<String> = (0..n).map(|i| format!("fragment{i}")).collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        let doubles = Doubles {
            pdf_body: Some(""),
            images: Arc::new(FakeImages::numbered(&refs)),
            ..Default::default()
        };

        let output = converter(&dir, &doubles, true, true)
            .convert_pdf(PDF_BYTES)
            .await
            .unwrap();

        let fragments = output.body.split(' ').filter(|s| !s.is_empty()).count();
        assert_eq!(fragments, n, "n = {n}, body = {:?}", output.body);
        assert_eq!(output.stats.images_found, n);
        assert_clean(&dir);
    }
}

#[tokio::test]
async fn one_failing_image_is_dropped_silently() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        pdf_body: Some(""),
        images: Arc::new(FakeImages::numbered(&["a", "b", "FAIL", "d", "e"])),
        ..Default::default()
    };

    let output = converter(&dir, &doubles, true, true)
        .convert_pdf(PDF_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "a b d e");
    assert_eq!(output.stats.images_found, 5);
    assert_eq!(output.stats.images_failed, 1);
    assert_eq!(output.stats.image_errors.len(), 1);
    assert_clean(&dir);
}

#[tokio::test]
async fn slowest_image_is_never_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        pdf_body: Some(""),
        images: Arc::new(FakeImages::numbered(&["a", "b", "SLOW:k", "d", "e"])),
        ..Default::default()
    };

    let output = converter(&dir, &doubles, true, true)
        .convert_pdf(PDF_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "a b k d e");
    assert_clean(&dir);
}

#[tokio::test]
async fn image_branch_failure_keeps_text_layer() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        images: Arc::new(FakeImages {
            fail: true,
            ..Default::default()
        }),
        ..Default::default()
    };

    let output = converter(&dir, &doubles, true, true)
        .convert_pdf(PDF_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "Text layer.");
    assert_eq!(output.meta["Producer"], "scanner");
    assert!(output.stats.image_dominant);
    assert_eq!(output.stats.images_found, 0);
    assert_clean(&dir);
}

#[tokio::test]
async fn pdf_text_failure_is_fatal_without_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles {
        pdf_body: None,
        ..Default::default()
    };

    let err = converter(&dir, &doubles, true, true)
        .convert_pdf(PDF_BYTES)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DocConvError::Extraction {
            source: ExtractError::BodyCommand(_)
        }
    ));
    assert_eq!(doubles.alternate.calls.load(Ordering::SeqCst), 0);
    assert_eq!(doubles.fonts.calls.load(Ordering::SeqCst), 0);
    assert_clean(&dir);
}

#[tokio::test]
async fn ocr_disabled_skips_probe() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles::default();

    let output = converter(&dir, &doubles, true, false)
        .convert_pdf(PDF_BYTES)
        .await
        .unwrap();

    assert_eq!(output.body, "Text layer.");
    assert_eq!(doubles.fonts.calls.load(Ordering::SeqCst), 0);
    assert_clean(&dir);
}

#[tokio::test]
async fn unknown_bytes_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let doubles = Doubles::default();

    let err = converter(&dir, &doubles, true, true)
        .convert(&b"GIF89a"[..])
        .await
        .unwrap_err();

    assert!(matches!(err, DocConvError::UnsupportedFormat { .. }));
    assert_clean(&dir);
}
