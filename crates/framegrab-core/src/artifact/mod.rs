pub mod image_writer;
pub mod text;

use std::path::PathBuf;

use crate::error::ArtifactError;
use crate::media::Frame;

pub use image_writer::ImageWriter;
pub use text::TextExtractor;

/// What a consumer produced for one sampled frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Image { ordinal: u32, path: PathBuf },
    Text { text: String },
}

/// Receives sampled frames in ordinal order and turns each into zero or one artifact.
pub trait ArtifactConsumer {
    fn consume(&mut self, ordinal: u32, frame: &Frame) -> Result<Option<Artifact>, ArtifactError>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<(), ArtifactError> {
        Ok(())
    }
}
