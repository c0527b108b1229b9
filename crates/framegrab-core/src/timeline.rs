//! Mapping from elapsed time to frame index.
//!
//! Video containers expose one frame rate, so the lookup is arithmetic.
//! Animated images time every frame on its own, so the lookup is a binary
//! search over prefix sums of the per-frame durations.

use tracing::debug;

use crate::error::SourceError;

/// Uniform frame duration derived from a single fps value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRateTimeline {
    fps: f64,
    frame_count: u32,
}

impl ConstantRateTimeline {
    pub fn new(fps: f64, frame_count: u32) -> Result<Self, SourceError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(SourceError::InvalidTimeline(format!(
                "frame rate must be positive, got {fps}"
            )));
        }
        if frame_count == 0 {
            return Err(SourceError::InvalidTimeline(
                "frame count must be positive".to_string(),
            ));
        }
        Ok(Self { fps, frame_count })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    /// Floors `t * fps`, clamped so the last instant never passes the final frame.
    pub fn frame_index(&self, t: f64) -> u32 {
        let raw = (t.max(0.0) * self.fps).floor();
        let last = self.frame_count - 1;
        if raw >= last as f64 {
            last
        } else {
            raw as u32
        }
    }
}

/// Independently timed frames, looked up through cumulative start times.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRateTimeline {
    /// `cumulative_times[i]` is the start of frame `i`; the last entry is the
    /// total duration. Always `frame_count + 1` entries, starting at 0.
    cumulative_times: Vec<f64>,
}

impl VariableRateTimeline {
    /// Build from per-frame display durations in seconds.
    ///
    /// Zero-length frames are accepted; they occupy no time and are never
    /// returned by [`frame_index`](Self::frame_index) unless every frame is
    /// zero-length.
    pub fn from_durations(durations: &[f64]) -> Result<Self, SourceError> {
        if durations.is_empty() {
            return Err(SourceError::InvalidTimeline(
                "animated image has no frames".to_string(),
            ));
        }
        if u32::try_from(durations.len()).is_err() {
            return Err(SourceError::InvalidTimeline(format!(
                "too many frames: {}",
                durations.len()
            )));
        }

        let mut cumulative_times = Vec::with_capacity(durations.len() + 1);
        cumulative_times.push(0.0);
        let mut total = 0.0;
        for (i, &d) in durations.iter().enumerate() {
            if !d.is_finite() || d < 0.0 {
                return Err(SourceError::InvalidTimeline(format!(
                    "frame {i} has invalid duration {d}"
                )));
            }
            total += d;
            cumulative_times.push(total);
        }

        debug!(
            frame_count = durations.len(),
            duration = total,
            "built variable-rate timeline"
        );
        Ok(Self { cumulative_times })
    }

    pub fn cumulative_times(&self) -> &[f64] {
        &self.cumulative_times
    }

    pub fn frame_count(&self) -> u32 {
        (self.cumulative_times.len() - 1) as u32
    }

    pub fn duration(&self) -> f64 {
        self.cumulative_times[self.cumulative_times.len() - 1]
    }

    /// Index of the frame on screen at `t`: the number of cumulative entries
    /// `<= t`, minus one, clamped to `[0, frame_count - 1]`.
    pub fn frame_index(&self, t: f64) -> u32 {
        let at_or_before = self.cumulative_times.partition_point(|&c| c <= t);
        let idx = at_or_before.saturating_sub(1);
        idx.min(self.frame_count() as usize - 1) as u32
    }
}

/// Timing model of an opened source.
#[derive(Debug, Clone, PartialEq)]
pub enum Timeline {
    ConstantRate(ConstantRateTimeline),
    VariableRate(VariableRateTimeline),
}

impl Timeline {
    pub fn frame_index(&self, t: f64) -> u32 {
        match self {
            Timeline::ConstantRate(tl) => tl.frame_index(t),
            Timeline::VariableRate(tl) => tl.frame_index(t),
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Timeline::ConstantRate(tl) => tl.duration(),
            Timeline::VariableRate(tl) => tl.duration(),
        }
    }

    pub fn frame_count(&self) -> u32 {
        match self {
            Timeline::ConstantRate(tl) => tl.frame_count(),
            Timeline::VariableRate(tl) => tl.frame_count(),
        }
    }

    /// Start time of frame `index` in seconds.
    pub fn timestamp_of(&self, index: u32) -> f64 {
        match self {
            Timeline::ConstantRate(tl) => index as f64 / tl.fps(),
            Timeline::VariableRate(tl) => {
                let times = tl.cumulative_times();
                times[(index as usize).min(times.len() - 1)]
            }
        }
    }
}

impl From<ConstantRateTimeline> for Timeline {
    fn from(tl: ConstantRateTimeline) -> Self {
        Timeline::ConstantRate(tl)
    }
}

impl From<VariableRateTimeline> for Timeline {
    fn from(tl: VariableRateTimeline) -> Self {
        Timeline::VariableRate(tl)
    }
}
