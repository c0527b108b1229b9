use std::fmt;

use anyhow::{bail, Result};

/// Slack allowed when deciding whether a time point still fits in the
/// source. Absorbs the rounding of `n * step` so a point that lands on the
/// duration exactly isn't dropped.
pub const BOUNDARY_EPSILON: f64 = 1e-9;

pub const DEFAULT_STEP_SECONDS: f64 = 0.5;
pub const DEFAULT_STRIDE: u32 = 30;

/// Which frames of a source get visited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingPolicy {
    /// Every `step_seconds` of elapsed time, starting at 0. Seeks per point.
    TimeInterval { step_seconds: f64 },
    /// Every `stride`-th frame, starting at frame 0. Scans sequentially.
    FrameStride { stride: u32 },
}

impl SamplingPolicy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            SamplingPolicy::TimeInterval { step_seconds } => {
                if !step_seconds.is_finite() || step_seconds <= 0.0 {
                    bail!("interval must be a positive number of seconds, got {step_seconds}");
                }
            }
            SamplingPolicy::FrameStride { stride } => {
                if stride < 1 {
                    bail!("stride must be >= 1, got {stride}");
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SamplingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingPolicy::TimeInterval { step_seconds } => write!(f, "every {step_seconds}s"),
            SamplingPolicy::FrameStride { stride } => write!(f, "every {stride} frames"),
        }
    }
}

/// Lazy sequence `0, step, 2*step, ...` up to and including `duration`.
///
/// Each point is `n * step`, never a running sum, so error doesn't
/// accumulate over long sources.
pub fn time_points(step: f64, duration: f64) -> TimePoints {
    TimePoints {
        step,
        duration,
        next: 0,
    }
}

#[derive(Debug, Clone)]
pub struct TimePoints {
    step: f64,
    duration: f64,
    next: u64,
}

impl Iterator for TimePoints {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.step.is_nan() || self.step <= 0.0 {
            return None;
        }
        let t = self.next as f64 * self.step;
        if t > self.duration + BOUNDARY_EPSILON {
            return None;
        }
        self.next += 1;
        Some(t)
    }
}
