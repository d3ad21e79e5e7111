//! Collaborators backed by command-line programs (wv, poppler-utils).
//!
//! Every program is invoked with explicit arguments, never through a shell,
//! and its stdout is parsed here rather than with `tail | cut | sort`.

use super::{BodyConverter, DocumentInfo, FontProbe, ImageExtractor, Properties};
use crate::error::ToolError;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

/// Run `program args…`, failing on a non-zero exit status.
pub(crate) fn run(program: &str, args: &[OsString]) -> Result<Output, ToolError> {
    debug!("exec: {} {:?}", program, args);
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// A converter invoked as `program [flags…] <input> <output>`.
#[derive(Debug, Clone)]
pub struct ExternalBody {
    program: String,
    flags: Vec<String>,
}

impl ExternalBody {
    pub fn new(program: impl Into<String>, flags: &[&str]) -> Self {
        Self {
            program: program.into(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// `wvText <input.doc> <output.txt>`
    pub fn wv_text(program: &str) -> Self {
        Self::new(program, &[])
    }

    /// `pdftotext -q -nopgbrk -enc UTF-8 <input.pdf> <output.txt>`
    pub fn pdftotext(program: &str) -> Self {
        Self::new(program, &["-q", "-nopgbrk", "-enc", "UTF-8"])
    }
}

impl BodyConverter for ExternalBody {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut args: Vec<OsString> = self.flags.iter().map(OsString::from).collect();
        args.push(input.as_os_str().to_owned());
        args.push(output.as_os_str().to_owned());
        run(&self.program, &args)?;

        if !output.exists() {
            return Err(ToolError::MissingOutput {
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// `pdfinfo -isodates <input.pdf>`, parsed into `Key: value` pairs.
///
/// Without `-isodates` dates are printed in the host's local time zone and
/// locale.
#[derive(Debug, Clone)]
pub struct PdfInfo {
    program: String,
}

impl PdfInfo {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl DocumentInfo for PdfInfo {
    fn info(&self, input: &Path) -> Result<Properties, ToolError> {
        let output = run(
            &self.program,
            &[OsString::from("-isodates"), input.as_os_str().to_owned()],
        )?;
        Ok(parse_pdfinfo(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `pdfinfo` output: one `Key:   value` per line, keys may contain spaces.
pub fn parse_pdfinfo(stdout: &str) -> Properties {
    stdout
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// `pdfimages -j <input.pdf> <dir>/img`
#[derive(Debug, Clone)]
pub struct PdfImages {
    program: String,
}

impl PdfImages {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl ImageExtractor for PdfImages {
    fn extract(&self, input: &Path, output_dir: &Path) -> Result<(), ToolError> {
        let root = output_dir.join("img");
        run(
            &self.program,
            &[
                OsString::from("-j"),
                input.as_os_str().to_owned(),
                root.into_os_string(),
            ],
        )?;
        Ok(())
    }
}

/// `pdffonts -l <pages> <input.pdf>`, reduced to unique font names.
#[derive(Debug, Clone)]
pub struct PdfFonts {
    program: String,
    pages: u32,
}

impl PdfFonts {
    pub fn new(program: &str, pages: u32) -> Self {
        Self {
            program: program.to_string(),
            pages,
        }
    }
}

impl FontProbe for PdfFonts {
    fn list_fonts(&self, input: &Path) -> Result<Vec<String>, ToolError> {
        let output = run(
            &self.program,
            &[
                OsString::from("-l"),
                OsString::from(self.pages.to_string()),
                input.as_os_str().to_owned(),
            ],
        )?;
        Ok(parse_pdffonts(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `pdffonts` output: skip the two header lines, keep the first column,
/// sorted and deduplicated.
pub fn parse_pdffonts(stdout: &str) -> Vec<String> {
    let mut fonts: Vec<String> = stdout
        .lines()
        .skip(2)
        .filter_map(|line| line.split(' ').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    fonts.sort_unstable();
    fonts.dedup();
    fonts
}
