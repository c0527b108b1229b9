use std::path::PathBuf;

use image::ImageFormat;
use tracing::debug;

use super::{Artifact, ArtifactConsumer};
use crate::error::ArtifactError;
use crate::media::Frame;

/// File name for the screenshot with the given 1-based ordinal.
pub fn screenshot_file_name(ordinal: u32) -> String {
    format!("screenshot_{ordinal:04}.png")
}

/// Writes every sampled frame as a PNG into an existing directory.
pub struct ImageWriter {
    dir: PathBuf,
}

impl ImageWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactConsumer for ImageWriter {
    fn consume(&mut self, ordinal: u32, frame: &Frame) -> Result<Option<Artifact>, ArtifactError> {
        let path = self.dir.join(screenshot_file_name(ordinal));
        frame
            .image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| ArtifactError::Write {
                path: path.clone(),
                source,
            })?;

        debug!(ordinal, frame_number = frame.frame_number, ?path, "saved screenshot");
        Ok(Some(Artifact::Image { ordinal, path }))
    }
}
