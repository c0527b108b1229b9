//! Frame sampling for videos and animated images.
//!
//! A [`media::MediaSource`] exposes a [`timeline::Timeline`] that maps elapsed
//! time to frame indices. A [`sampler::FrameSampler`] walks the source by time
//! interval or frame stride and hands each sampled frame to an
//! [`artifact::ArtifactConsumer`], which writes screenshots or deduplicated
//! OCR text.

pub mod artifact;
pub mod error;
pub mod media;
pub mod ocr;
pub mod pipeline;
pub mod sampler;
pub mod sampling;
pub mod timeline;
