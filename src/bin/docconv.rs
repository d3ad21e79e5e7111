//! CLI binary for edgequake-docconv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docconv::{
    convert_to_file, ConversionConfig, ConversionOutput, ConversionProgressCallback, Converter,
    DocumentKind, ProgressCallback, ToolCommands,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the text layer is extracted; becomes a bar if the document
/// turns out to be a scan and its images are OCR'd.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Extracting");
        bar.set_message("running converters…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }

    /// Clear the spinner if no OCR ran.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_images_discovered(&self, total_images: usize) {
        self.activate_bar(total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("No text layer found; recognising {total_images} images…"))
        ));
    }

    fn on_image_complete(&self, image: &Path, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} {:<24} {}",
            green("✓"),
            file_name(image),
            dim(&format!("{text_len:>5} chars  ({total} total)")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, image: &Path, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<24} {}",
            red("✗"),
            file_name(image),
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_ocr_complete(&self, total_images: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_images.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} images recognised",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images recognised  ({} failed)",
                if failed == total_images { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Plain text to stdout (format detected from the file's bytes)
  docconv minutes.doc

  # Write to a file
  docconv report.pdf -o report.txt

  # From stdin, forcing the format
  cat upload.bin | docconv --kind docx -

  # Body plus a metadata header
  docconv --meta minutes.doc

  # Structured output
  docconv --json scan.pdf > scan.json

  # Scanned German PDF, 8 OCR workers
  docconv --ocr-lang deu --ocr-concurrency 8 scan.pdf

EXTERNAL TOOLS:
  wvText                              .doc body text (package: wv)
  pdftotext pdfinfo pdfimages pdffonts PDF text, metadata, images, font probe (poppler-utils)
  tesseract                           OCR of scanned PDFs (tesseract-ocr)

  .docx files and .doc metadata are read in-process.

ENVIRONMENT VARIABLES:
  DOCCONV_WVTEXT, DOCCONV_PDFTOTEXT, DOCCONV_PDFINFO,
  DOCCONV_PDFIMAGES, DOCCONV_PDFFONTS, DOCCONV_TESSERACT
                          Program name or path of each external tool
  DOCCONV_TEMP_DIR        Base directory for temporary files
  RUST_LOG                Log filter (overrides --verbose / --quiet)
"#;

/// Extract plain text and metadata from .doc, .docx and .pdf files.
#[derive(Parser, Debug)]
#[command(
    name = "docconv",
    version,
    about = "Extract plain text and metadata from .doc, .docx and .pdf files",
    long_about = "Extract plain text and document metadata from legacy Word (.doc), Office Open XML \
(.docx) and PDF files. Misnamed .docx files are handled by falling back to the zip-based reader; \
scanned PDFs are recognised image by image with tesseract.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file path, or `-` for stdin.
    input: String,

    /// Document format. `auto` detects it from the leading bytes.
    #[arg(long, env = "DOCCONV_KIND", value_enum, default_value = "auto")]
    kind: KindArg,

    /// Write the text to this file instead of stdout.
    #[arg(short, long, env = "DOCCONV_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (ConversionOutput) instead of plain text.
    #[arg(long, env = "DOCCONV_JSON")]
    json: bool,

    /// Prepend a `key: value` metadata header to the text.
    #[arg(long, env = "DOCCONV_META")]
    meta: bool,

    /// Never OCR the images of scanned PDFs.
    #[arg(long, env = "DOCCONV_NO_OCR")]
    no_ocr: bool,

    /// Tesseract language code(s), e.g. `eng` or `deu+eng`.
    #[arg(long, env = "DOCCONV_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Number of images recognised at the same time.
    #[arg(long, env = "DOCCONV_OCR_CONCURRENCY", default_value_t = 4)]
    ocr_concurrency: usize,

    /// Base directory for temporary files.
    #[arg(long, env = "DOCCONV_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Leading pages inspected by the font probe.
    #[arg(long, env = "DOCCONV_FONT_PROBE_PAGES", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..))]
    font_probe_pages: u32,

    /// Do not retry failed .doc conversions as .docx.
    #[arg(long, env = "DOCCONV_NO_FALLBACK")]
    no_fallback: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCCONV_QUIET")]
    quiet: bool,

    #[command(flatten)]
    tools: ToolArgs,
}

/// Program names of the external tools.
#[derive(clap::Args, Debug)]
struct ToolArgs {
    #[arg(long = "wvtext", env = "DOCCONV_WVTEXT", default_value = "wvText", hide = true)]
    wv_text: String,
    #[arg(long, env = "DOCCONV_PDFTOTEXT", default_value = "pdftotext", hide = true)]
    pdftotext: String,
    #[arg(long, env = "DOCCONV_PDFINFO", default_value = "pdfinfo", hide = true)]
    pdfinfo: String,
    #[arg(long, env = "DOCCONV_PDFIMAGES", default_value = "pdfimages", hide = true)]
    pdfimages: String,
    #[arg(long, env = "DOCCONV_PDFFONTS", default_value = "pdffonts", hide = true)]
    pdffonts: String,
    #[arg(long, env = "DOCCONV_TESSERACT", default_value = "tesseract", hide = true)]
    tesseract: String,
}

impl From<&ToolArgs> for ToolCommands {
    fn from(t: &ToolArgs) -> Self {
        ToolCommands {
            wv_text: t.wv_text.clone(),
            pdftotext: t.pdftotext.clone(),
            pdfinfo: t.pdfinfo.clone(),
            pdfimages: t.pdfimages.clone(),
            pdffonts: t.pdffonts.clone(),
            tesseract: t.tesseract.clone(),
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Auto,
    Doc,
    Docx,
    Pdf,
}

impl KindArg {
    fn document_kind(self) -> Option<DocumentKind> {
        match self {
            KindArg::Auto => None,
            KindArg::Doc => Some(DocumentKind::Doc),
            KindArg::Docx => Some(DocumentKind::Docx),
            KindArg::Pdf => Some(DocumentKind::Pdf),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;

    let input = open_input(&cli.input)?;

    // ── Run conversion ───────────────────────────────────────────────────
    if let (Some(output_path), false, false, KindArg::Auto) =
        (&cli.output, cli.json, cli.meta, cli.kind)
    {
        let result = convert_to_file(input, output_path, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let stats = result.context("Conversion failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}{}  {}ms  →  {}",
                green("✔"),
                format!("{:?}", stats.kind).to_lowercase(),
                if stats.fallback_used { " (as .docx)" } else { "" },
                stats.duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let converter = Converter::new(config);
    let result = match cli.kind.document_kind() {
        Some(kind) => converter.convert_as(kind, input).await,
        None => converter.convert(input).await,
    };
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result.context("Conversion failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        render_text(&output, cli.meta)
    };

    match cli.output {
        Some(ref path) => {
            std::fs::write(path, rendered.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet && !cli.json {
        let stats = &output.stats;
        eprintln!(
            "Converted {} in {}ms{}",
            format!("{:?}", stats.kind).to_lowercase(),
            stats.duration_ms,
            if stats.fallback_used { " (as .docx)" } else { "" }
        );
        if stats.images_failed > 0 {
            eprintln!("  {} of {} images failed OCR", stats.images_failed, stats.images_found);
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .ocr_enabled(!cli.no_ocr)
        .ocr_language(cli.ocr_lang.clone())
        .ocr_concurrency(cli.ocr_concurrency)
        .font_probe_pages(cli.font_probe_pages)
        .docx_fallback(!cli.no_fallback)
        .commands(ToolCommands::from(&cli.tools));

    if let Some(ref dir) = cli.temp_dir {
        builder = builder.temp_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn open_input(input: &str) -> Result<Box<dyn Read>> {
    if input == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(input).with_context(|| format!("Failed to open {input}"))?;
    Ok(Box::new(file))
}

/// Body text, optionally preceded by a `---`-delimited metadata header.
fn render_text(output: &ConversionOutput, with_meta: bool) -> String {
    if !with_meta || output.meta.is_empty() {
        return output.body.clone();
    }
    let mut text = String::from("---\n");
    for (key, value) in &output.meta {
        text.push_str(&format!("{key}: {}\n", value.replace('\n', " ")));
    }
    text.push_str("---\n\n");
    text.push_str(&output.body);
    text
}
