use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use image::ImageFormat;
use tracing::debug;

use crate::error::OcrError;
use crate::media::Frame;

/// Turns a frame into whatever text is visible in it.
pub trait TextRecognizer {
    fn recognize(&self, frame: &Frame) -> Result<String, OcrError>;
}

/// Settings for the tesseract command-line OCR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    /// Executable name or path.
    pub program: String,
    /// Tesseract language code (`-l`), or None for the engine's default.
    pub language: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            program: "tesseract".to_string(),
            language: None,
        }
    }
}

/// OCR by piping a PNG-encoded frame through `tesseract stdin stdout`.
pub struct TesseractCli {
    config: OcrConfig,
}

impl TesseractCli {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn args(&self) -> Vec<&str> {
        let mut args = vec!["stdin", "stdout"];
        if let Some(lang) = &self.config.language {
            args.extend(["-l", lang.as_str()]);
        }
        args
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, frame: &Frame) -> Result<String, OcrError> {
        let mut png = Cursor::new(Vec::new());
        frame.image.write_to(&mut png, ImageFormat::Png)?;
        let png = png.into_inner();

        let program = &self.config.program;
        let mut child = Command::new(program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| OcrError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Tesseract reads the whole image before writing anything, so filling
        // stdin first can't deadlock against a full stdout pipe. If it exits
        // early (bad language, bad flags) the write fails with a broken pipe
        // and the exit status and stderr are the real error.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&png),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            frame_number = frame.frame_number,
            chars = text.len(),
            "ocr completed"
        );
        Ok(text)
    }
}
