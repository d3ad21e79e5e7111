//! Tesseract OCR through its command-line interface.
//!
//! The image is streamed to `tesseract stdin stdout`, so no intermediate file
//! is needed and the caller only has to hand over a reader.

use super::{OcrEngine, ToolOutput};
use crate::error::ToolError;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// `tesseract stdin stdout -l <language>`
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(program: &str, language: &str) -> Self {
        Self {
            program: program.to_string(),
            language: language.to_string(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &mut dyn Read) -> Result<ToolOutput, ToolError> {
        let mut bytes = Vec::new();
        image.read_to_end(&mut bytes)?;
        debug!("tesseract: {} bytes, lang={}", bytes.len(), self.language);

        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Tesseract reads the whole image before writing anything, so writing
        // stdin to completion first cannot deadlock on a full stdout pipe.
        // The child is reaped even when the pipe breaks; its exit status and
        // stderr explain the break better than EPIPE does.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&bytes),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ToolError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        Ok(ToolOutput {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            properties: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_spawn_error() {
        let ocr = TesseractOcr::new("docconv-no-such-tesseract", "eng");
        let err = ocr.recognize(&mut &b"\x89PNG"[..]).unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn early_exit_reports_status_and_stderr() {
        // `sh stdin stdout …` fails to open a script named "stdin" and exits
        // without reading the image, breaking the pipe mid-write.
        let ocr = TesseractOcr::new("sh", "eng");
        let image = vec![0u8; 4 * 1024 * 1024];
        let err = ocr.recognize(&mut &image[..]).unwrap_err();
        match err {
            ToolError::Failed { program, stderr, .. } => {
                assert_eq!(program, "sh");
                assert!(!stderr.is_empty());
            }
            other => panic!("expected Failed, got: {other}"),
        }
    }
}
