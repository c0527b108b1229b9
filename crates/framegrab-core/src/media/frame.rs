use image::DynamicImage;

/// A single decoded frame with its position in the source.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The frame's pixel data. RGB for video, RGBA for animated images.
    pub image: DynamicImage,
    /// Frame index within the source (0-based).
    pub frame_number: u32,
    /// Elapsed seconds from the start of the source.
    pub timestamp_seconds: f64,
}
