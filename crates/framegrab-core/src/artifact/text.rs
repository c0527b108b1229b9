use std::io::Write;

use tracing::{debug, warn};

use super::{Artifact, ArtifactConsumer};
use crate::error::ArtifactError;
use crate::media::Frame;
use crate::ocr::TextRecognizer;

/// Number of segments kept in memory for console reporting.
pub const PREVIEW_LIMIT: usize = 10;

/// OCRs each sampled frame and streams new text segments to `sink`.
///
/// A segment equal to the previous one (ignoring case and surrounding
/// whitespace) is the same on-screen text still showing, so it is dropped.
/// Each emitted segment is written followed by a blank line.
pub struct TextExtractor<R, W> {
    recognizer: R,
    sink: W,
    last_emitted: Option<String>,
    emitted: usize,
    preview: Vec<String>,
}

impl<R: TextRecognizer, W: Write> TextExtractor<R, W> {
    pub fn new(recognizer: R, sink: W) -> Self {
        Self {
            recognizer,
            sink,
            last_emitted: None,
            emitted: 0,
            preview: Vec::new(),
        }
    }

    /// Total segments emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// The first [`PREVIEW_LIMIT`] emitted segments.
    pub fn preview(&self) -> &[String] {
        &self.preview
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    fn is_repeat(&self, text: &str) -> bool {
        self.last_emitted
            .as_deref()
            .is_some_and(|last| last.to_lowercase() == text.to_lowercase())
    }
}

impl<R: TextRecognizer, W: Write> ArtifactConsumer for TextExtractor<R, W> {
    fn consume(&mut self, ordinal: u32, frame: &Frame) -> Result<Option<Artifact>, ArtifactError> {
        let raw = self.recognizer.recognize(frame).unwrap_or_else(|e| {
            warn!(
                ordinal,
                frame_number = frame.frame_number,
                error = %e,
                "ocr failed, treating frame as blank"
            );
            String::new()
        });

        let text = raw.trim();
        if text.is_empty() {
            debug!(ordinal, "no text in frame");
            return Ok(None);
        }
        if self.is_repeat(text) {
            debug!(ordinal, "text unchanged since last segment");
            return Ok(None);
        }

        // Only text that reached the sink counts as emitted, so a failed
        // write doesn't suppress the same text on the next frame.
        write!(self.sink, "{text}\n\n")?;

        let text = text.to_string();
        self.last_emitted = Some(text.clone());
        self.emitted += 1;
        if self.preview.len() < PREVIEW_LIMIT {
            self.preview.push(text.clone());
        }
        debug!(ordinal, segment = self.emitted, "text segment emitted");
        Ok(Some(Artifact::Text { text }))
    }

    fn finish(&mut self) -> Result<(), ArtifactError> {
        self.sink.flush()?;
        Ok(())
    }
}
