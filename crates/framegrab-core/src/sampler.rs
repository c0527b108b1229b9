//! Walks a media source according to a sampling policy.
//!
//! Time-interval sampling seeks straight to each computed index, since
//! successive points can be far apart or land on the same frame twice.
//! Frame-stride sampling never seeks: it decodes every frame in order and
//! keeps every `stride`-th one. The two are kept as separate paths so the
//! time-interval case never pays for a full decode.

use tracing::{debug, info, warn};

use crate::artifact::ArtifactConsumer;
use crate::media::{Frame, MediaSource};
use crate::sampling::{time_points, SamplingPolicy, TimePoints};

/// Sequential scans give up after this many read failures in a row; a pipe
/// that keeps failing won't recover.
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 8;

/// A frame chosen by the sampler, numbered in emission order from 1.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub ordinal: u32,
    pub frame: Frame,
}

/// Counters for one completed sampling run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames handed to the consumer.
    pub sampled: u32,
    /// Artifacts the consumer produced.
    pub artifacts: u32,
    /// Sampled points lost to seek/read failures.
    pub skipped_reads: u32,
    /// Artifacts that could not be written.
    pub failed_artifacts: u32,
}

enum State {
    TimeInterval(TimePoints),
    FrameStride {
        stride: u32,
        next_index: u64,
        consecutive_failures: u32,
    },
    Done,
}

/// Iterator over the sampled frames of one source, in increasing time order.
///
/// Read failures never end the iteration early; they are logged, counted in
/// [`skipped_reads`](Self::skipped_reads), and the next point is tried.
pub struct FrameSampler<'a> {
    source: &'a mut dyn MediaSource,
    state: State,
    next_ordinal: u32,
    skipped_reads: u32,
}

impl<'a> FrameSampler<'a> {
    pub fn new(source: &'a mut dyn MediaSource, policy: SamplingPolicy) -> Self {
        let state = match policy {
            SamplingPolicy::TimeInterval { step_seconds } => {
                let duration = source.timeline().duration();
                info!(step_seconds, duration, "sampling by time interval");
                State::TimeInterval(time_points(step_seconds, duration))
            }
            SamplingPolicy::FrameStride { stride } => {
                info!(stride, frame_count = ?source.frame_count(), "sampling by frame stride");
                State::FrameStride {
                    stride: stride.max(1),
                    next_index: 0,
                    consecutive_failures: 0,
                }
            }
        };

        Self {
            source,
            state,
            next_ordinal: 1,
            skipped_reads: 0,
        }
    }

    pub fn skipped_reads(&self) -> u32 {
        self.skipped_reads
    }

    /// Feed every sampled frame to `consumer`, then let it finish.
    ///
    /// Write failures are logged and counted; they never stop the run.
    pub fn run(mut self, consumer: &mut dyn ArtifactConsumer) -> RunSummary {
        let mut summary = RunSummary::default();

        while let Some(SampledFrame { ordinal, frame }) = self.next() {
            summary.sampled += 1;
            match consumer.consume(ordinal, &frame) {
                Ok(Some(_)) => summary.artifacts += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        ordinal,
                        frame_number = frame.frame_number,
                        error = %e,
                        "failed to write artifact"
                    );
                    summary.failed_artifacts += 1;
                }
            }
        }

        if let Err(e) = consumer.finish() {
            warn!(error = %e, "failed to finish artifact output");
            summary.failed_artifacts += 1;
        }

        summary.skipped_reads = self.skipped_reads;
        info!(
            sampled = summary.sampled,
            artifacts = summary.artifacts,
            skipped_reads = summary.skipped_reads,
            failed_artifacts = summary.failed_artifacts,
            "sampling complete"
        );
        summary
    }

    fn emit(&mut self, frame: Frame) -> SampledFrame {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        debug!(ordinal, frame_number = frame.frame_number, "frame sampled");
        SampledFrame { ordinal, frame }
    }

    fn next_by_time(&mut self) -> Option<Frame> {
        loop {
            let State::TimeInterval(points) = &mut self.state else {
                return None;
            };
            let Some(t) = points.next() else {
                self.state = State::Done;
                return None;
            };

            let index = self.source.timeline().frame_index(t);
            match self.source.frame_at(index) {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    warn!(t, frame_index = index, error = %e, "could not read frame, skipping");
                    self.skipped_reads += 1;
                }
            }
        }
    }

    fn next_by_stride(&mut self) -> Option<Frame> {
        loop {
            let State::FrameStride {
                stride,
                next_index,
                consecutive_failures,
            } = &mut self.state
            else {
                return None;
            };

            let index = *next_index;
            let wanted = index % *stride as u64 == 0;

            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    *next_index += 1;
                    *consecutive_failures = 0;
                    if wanted {
                        return Some(frame);
                    }
                }
                Ok(None) => {
                    debug!(frames_scanned = index, "end of stream");
                    self.state = State::Done;
                    return None;
                }
                Err(e) => {
                    *next_index += 1;
                    *consecutive_failures += 1;
                    let failures = *consecutive_failures;
                    if wanted {
                        warn!(frame_index = index, error = %e, "could not read frame, skipping");
                        self.skipped_reads += 1;
                    } else {
                        debug!(
                            frame_index = index,
                            error = %e,
                            "could not read unsampled frame"
                        );
                    }
                    if failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        warn!(failures, "source keeps failing, ending scan");
                        self.state = State::Done;
                        return None;
                    }
                }
            }
        }
    }
}

impl Iterator for FrameSampler<'_> {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        let frame = match self.state {
            State::TimeInterval(_) => self.next_by_time(),
            State::FrameStride { .. } => self.next_by_stride(),
            State::Done => None,
        }?;
        Some(self.emit(frame))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use image::{DynamicImage, RgbImage};
    use tracing_test::traced_test;

    use super::*;
    use crate::artifact::{Artifact, ImageWriter};
    use crate::error::{ArtifactError, SourceError};
    use crate::timeline::{ConstantRateTimeline, Timeline, VariableRateTimeline};

    /// In-memory source that records how it was accessed.
    struct FakeSource {
        timeline: Timeline,
        failing: HashSet<u32>,
        cursor: u32,
        seeks: Vec<u32>,
        sequential_reads: u32,
    }

    impl FakeSource {
        fn constant(fps: f64, frame_count: u32) -> Self {
            Self::with_timeline(ConstantRateTimeline::new(fps, frame_count).unwrap().into())
        }

        fn variable(durations: &[f64]) -> Self {
            Self::with_timeline(VariableRateTimeline::from_durations(durations).unwrap().into())
        }

        fn with_timeline(timeline: Timeline) -> Self {
            Self {
                timeline,
                failing: HashSet::new(),
                cursor: 0,
                seeks: Vec::new(),
                sequential_reads: 0,
            }
        }

        fn failing_at(mut self, indices: &[u32]) -> Self {
            self.failing.extend(indices);
            self
        }

        fn make_frame(&self, index: u32) -> Result<Frame, SourceError> {
            if self.failing.contains(&index) {
                return Err(SourceError::read(index, "corrupt frame"));
            }
            Ok(Frame {
                image: DynamicImage::ImageRgb8(RgbImage::new(2, 2)),
                frame_number: index,
                timestamp_seconds: self.timeline.timestamp_of(index),
            })
        }
    }

    impl MediaSource for FakeSource {
        fn frame_count(&self) -> Option<u32> {
            Some(self.timeline.frame_count())
        }

        fn timeline(&self) -> &Timeline {
            &self.timeline
        }

        fn frame_at(&mut self, index: u32) -> Result<Frame, SourceError> {
            self.seeks.push(index);
            self.make_frame(index)
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            if self.cursor >= self.timeline.frame_count() {
                return Ok(None);
            }
            let index = self.cursor;
            self.cursor += 1;
            self.sequential_reads += 1;
            self.make_frame(index).map(Some)
        }
    }

    /// Accepts every frame, failing for the given ordinals.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(u32, u32)>,
        fail_ordinals: HashSet<u32>,
        finished: bool,
    }

    impl ArtifactConsumer for Recorder {
        fn consume(
            &mut self,
            ordinal: u32,
            frame: &Frame,
        ) -> Result<Option<Artifact>, ArtifactError> {
            self.seen.push((ordinal, frame.frame_number));
            if self.fail_ordinals.contains(&ordinal) {
                return Err(ArtifactError::Io(std::io::Error::other("disk full")));
            }
            Ok(Some(Artifact::Text {
                text: frame.frame_number.to_string(),
            }))
        }

        fn finish(&mut self) -> Result<(), ArtifactError> {
            self.finished = true;
            Ok(())
        }
    }

    fn indices(sampler: FrameSampler<'_>) -> Vec<(u32, u32)> {
        sampler
            .map(|s| (s.ordinal, s.frame.frame_number))
            .collect()
    }

    #[test]
    fn time_interval_on_constant_rate_seeks_each_point() {
        // 51 frames at 30fps = 1.7s -> points 0, 0.5, 1.0, 1.5
        let mut source = FakeSource::constant(30.0, 51);
        let policy = SamplingPolicy::TimeInterval { step_seconds: 0.5 };
        let got = indices(FrameSampler::new(&mut source, policy));

        assert_eq!(got, vec![(1, 0), (2, 15), (3, 30), (4, 45)]);
        assert_eq!(source.seeks, vec![0, 15, 30, 45]);
        assert_eq!(source.sequential_reads, 0);
    }

    #[test]
    fn time_interval_on_variable_rate_uses_cumulative_lookup() {
        // frame starts: 0.0, 0.2, 1.2, 1.3; duration 1.6
        let mut source = FakeSource::variable(&[0.2, 1.0, 0.1, 0.3]);
        let policy = SamplingPolicy::TimeInterval { step_seconds: 0.5 };
        let got = indices(FrameSampler::new(&mut source, policy));

        // t = 0.0, 0.5, 1.0, 1.5
        assert_eq!(got, vec![(1, 0), (2, 1), (3, 1), (4, 3)]);
    }

    #[test]
    fn small_steps_revisit_the_same_frame() {
        let mut source = FakeSource::variable(&[1.0, 1.0]);
        let policy = SamplingPolicy::TimeInterval { step_seconds: 0.25 };
        let got = indices(FrameSampler::new(&mut source, policy));

        let frames: Vec<u32> = got.iter().map(|&(_, f)| f).collect();
        assert_eq!(frames, vec![0, 0, 0, 0, 1, 1, 1, 1, 1]);
        let ordinals: Vec<u32> = got.iter().map(|&(o, _)| o).collect();
        assert_eq!(ordinals, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn frame_stride_scans_without_seeking() {
        let mut source = FakeSource::constant(30.0, 95);
        let policy = SamplingPolicy::FrameStride { stride: 30 };
        let got = indices(FrameSampler::new(&mut source, policy));

        assert_eq!(got, vec![(1, 0), (2, 30), (3, 60), (4, 90)]);
        assert!(source.seeks.is_empty());
        assert_eq!(source.sequential_reads, 95);
    }

    #[test]
    fn stride_of_one_keeps_every_frame() {
        let mut source = FakeSource::variable(&[0.1, 0.1, 0.1]);
        let policy = SamplingPolicy::FrameStride { stride: 1 };
        let got = indices(FrameSampler::new(&mut source, policy));
        assert_eq!(got, vec![(1, 0), (2, 1), (3, 2)]);
    }

    #[test]
    #[traced_test]
    fn failed_seek_is_skipped_and_ordinals_stay_dense() {
        // 5 points at 0, 0.5, 1.0, 1.5, 2.0 over 10fps x 21 frames; frame 5 is unreadable.
        let mut source = FakeSource::constant(10.0, 21).failing_at(&[5]);
        let policy = SamplingPolicy::TimeInterval { step_seconds: 0.5 };
        let mut sampler = FrameSampler::new(&mut source, policy);
        let got: Vec<(u32, u32)> = sampler
            .by_ref()
            .map(|s| (s.ordinal, s.frame.frame_number))
            .collect();

        assert_eq!(got, vec![(1, 0), (2, 10), (3, 15), (4, 20)]);
        assert_eq!(sampler.skipped_reads(), 1);
        assert!(logs_contain("could not read frame, skipping"));
    }

    #[test]
    #[traced_test]
    fn failed_sequential_read_does_not_end_the_scan() {
        let mut source = FakeSource::constant(30.0, 10).failing_at(&[3, 4]);
        let policy = SamplingPolicy::FrameStride { stride: 3 };
        let mut sampler = FrameSampler::new(&mut source, policy);
        let got: Vec<u32> = sampler.by_ref().map(|s| s.frame.frame_number).collect();

        assert_eq!(got, vec![0, 6, 9]);
        assert_eq!(sampler.skipped_reads(), 1);
    }

    #[test]
    #[traced_test]
    fn persistent_read_failures_end_the_scan() {
        let all: Vec<u32> = (0..100).collect();
        let mut source = FakeSource::constant(30.0, 100).failing_at(&all);
        let policy = SamplingPolicy::FrameStride { stride: 1 };
        let mut sampler = FrameSampler::new(&mut source, policy);

        assert_eq!(sampler.by_ref().count(), 0);
        assert_eq!(sampler.skipped_reads(), MAX_CONSECUTIVE_READ_FAILURES);
        drop(sampler);
        assert_eq!(source.sequential_reads, MAX_CONSECUTIVE_READ_FAILURES);
    }

    #[test]
    #[traced_test]
    fn run_counts_artifacts_and_survives_write_failures() {
        let mut source = FakeSource::constant(10.0, 21).failing_at(&[5]);
        let policy = SamplingPolicy::TimeInterval { step_seconds: 0.5 };
        let mut consumer = Recorder {
            fail_ordinals: [3].into_iter().collect(),
            ..Recorder::default()
        };

        let summary = FrameSampler::new(&mut source, policy).run(&mut consumer);

        assert_eq!(
            summary,
            RunSummary {
                sampled: 4,
                artifacts: 3,
                skipped_reads: 1,
                failed_artifacts: 1,
            }
        );
        assert_eq!(consumer.seen, vec![(1, 0), (2, 10), (3, 15), (4, 20)]);
        assert!(consumer.finished);
    }

    #[test]
    fn image_run_is_repeatable() {
        let policy = SamplingPolicy::TimeInterval { step_seconds: 0.3 };
        let first = indices(FrameSampler::new(&mut FakeSource::constant(24.0, 100), policy));
        let second = indices(FrameSampler::new(&mut FakeSource::constant(24.0, 100), policy));
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn read_error_on_second_point_still_writes_four_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::constant(10.0, 21).failing_at(&[5]);
        let policy = SamplingPolicy::TimeInterval { step_seconds: 0.5 };
        let mut writer = ImageWriter::new(dir.path());

        let summary = FrameSampler::new(&mut source, policy).run(&mut writer);

        assert_eq!(summary.artifacts, 4);
        for ordinal in 1..=4 {
            let name = format!("screenshot_{ordinal:04}.png");
            assert!(dir.path().join(&name).exists(), "{name} missing");
        }
        assert!(!dir.path().join("screenshot_0005.png").exists());
    }
}
