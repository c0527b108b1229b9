use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, RgbaImage};
use tracing::{debug, info};

use super::frame::Frame;
use super::MediaSource;
use crate::error::SourceError;
use crate::timeline::{Timeline, VariableRateTimeline};

/// Animated GIF decoded up front. Every frame carries its own display duration.
pub struct GifSource {
    frames: Vec<RgbaImage>,
    timeline: Timeline,
    cursor: usize,
}

impl GifSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::open(path, e))?;
        let source = Self::from_reader(BufReader::new(file))
            .map_err(|e| SourceError::open(path, e))?;
        info!(
            ?path,
            frame_count = source.frames.len(),
            duration = source.timeline.duration(),
            "animated image opened"
        );
        Ok(source)
    }

    pub fn from_reader<R: BufRead + Seek>(reader: R) -> Result<Self, SourceError> {
        let decoder = GifDecoder::new(reader)
            .map_err(|e| SourceError::InvalidTimeline(format!("undecodable GIF: {e}")))?;
        let decoded = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| SourceError::InvalidTimeline(format!("undecodable GIF frame: {e}")))?;

        let mut frames = Vec::with_capacity(decoded.len());
        let mut durations = Vec::with_capacity(decoded.len());
        for frame in decoded {
            let (numer, denom) = frame.delay().numer_denom_ms();
            durations.push(numer as f64 / denom as f64 / 1000.0);
            frames.push(frame.into_buffer());
        }

        Self::from_frames(frames, &durations)
    }

    /// Build from already-decoded frames and their durations in seconds.
    pub fn from_frames(frames: Vec<RgbaImage>, durations: &[f64]) -> Result<Self, SourceError> {
        if frames.len() != durations.len() {
            return Err(SourceError::InvalidTimeline(format!(
                "{} frames but {} durations",
                frames.len(),
                durations.len()
            )));
        }
        let timeline = VariableRateTimeline::from_durations(durations)?.into();
        Ok(Self {
            frames,
            timeline,
            cursor: 0,
        })
    }

    fn frame(&self, index: u32) -> Result<Frame, SourceError> {
        let image = self
            .frames
            .get(index as usize)
            .ok_or_else(|| SourceError::read(index, "index past the last frame"))?;
        Ok(Frame {
            image: DynamicImage::ImageRgba8(image.clone()),
            frame_number: index,
            timestamp_seconds: self.timeline.timestamp_of(index),
        })
    }
}

impl MediaSource for GifSource {
    fn frame_count(&self) -> Option<u32> {
        Some(self.frames.len() as u32)
    }

    fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn frame_at(&mut self, index: u32) -> Result<Frame, SourceError> {
        debug!(index, "seeking animated image");
        self.frame(index)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.cursor >= self.frames.len() {
            return Ok(None);
        }
        let frame = self.frame(self.cursor as u32)?;
        self.cursor += 1;
        Ok(Some(frame))
    }
}
