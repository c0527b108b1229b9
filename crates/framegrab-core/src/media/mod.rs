pub mod decoder;
pub mod frame;
pub mod gif;

use std::path::Path;

use tracing::info;

use crate::error::SourceError;
use crate::timeline::Timeline;

pub use decoder::VideoDecoder;
pub use frame::Frame;
pub use gif::GifSource;

/// An opened media container. Owned by exactly one sampling run.
pub trait MediaSource {
    /// Total frames, if the container reports it.
    fn frame_count(&self) -> Option<u32>;

    /// Timing model, derived once at open time.
    fn timeline(&self) -> &Timeline;

    /// Seek to `index` and decode that frame.
    fn frame_at(&mut self, index: u32) -> Result<Frame, SourceError>;

    /// Decode the next frame of a sequential scan, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Open `path` with the source matching its extension.
/// `.gif` is treated as an animated image; everything else goes through ffmpeg.
pub fn open_source(path: &Path) -> Result<Box<dyn MediaSource>, SourceError> {
    if !path.exists() {
        return Err(SourceError::open(path, "file does not exist"));
    }

    if is_animated_image(path) {
        info!(?path, "opening animated image");
        Ok(Box::new(GifSource::open(path)?))
    } else {
        info!(?path, "opening video");
        Ok(Box::new(VideoDecoder::open(path)?))
    }
}

fn is_animated_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gif_extension_is_case_insensitive() {
        assert!(is_animated_image(Path::new("a/b/loop.gif")));
        assert!(is_animated_image(Path::new("LOOP.GIF")));
        assert!(!is_animated_image(Path::new("clip.mp4")));
        assert!(!is_animated_image(Path::new("gif")));
    }

    #[test]
    fn missing_input_is_an_open_error() {
        let err = open_source(Path::new("/definitely/not/here.mp4"))
            .err()
            .expect("open should fail");
        assert!(matches!(err, SourceError::Open { .. }));
        assert!(err.is_fatal());
    }
}
