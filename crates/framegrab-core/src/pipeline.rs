use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::artifact::{ImageWriter, TextExtractor};
use crate::media::open_source;
use crate::ocr::{OcrConfig, TesseractCli};
use crate::sampler::{FrameSampler, RunSummary};
use crate::sampling::{SamplingPolicy, DEFAULT_STEP_SECONDS, DEFAULT_STRIDE};

pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";
pub const DEFAULT_TEXT_DIR: &str = "extracted_text";

/// Where the artifacts of a run go.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    /// One PNG per sampled frame in this directory.
    Screenshots { dir: PathBuf },
    /// Deduplicated OCR text, one blank-line separated segment at a time.
    Text { file: PathBuf },
}

/// Parameters for one sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub policy: SamplingPolicy,
    pub output: OutputTarget,
    pub ocr: OcrConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::screenshots(PathBuf::from(DEFAULT_SCREENSHOT_DIR))
    }
}

impl PipelineConfig {
    /// Screenshot mode with its default policy (every 0.5s).
    pub fn screenshots(dir: PathBuf) -> Self {
        Self {
            policy: SamplingPolicy::TimeInterval {
                step_seconds: DEFAULT_STEP_SECONDS,
            },
            output: OutputTarget::Screenshots { dir },
            ocr: OcrConfig::default(),
        }
    }

    /// Text mode with its default policy (every 30th frame).
    pub fn text(file: PathBuf) -> Self {
        Self {
            policy: SamplingPolicy::FrameStride {
                stride: DEFAULT_STRIDE,
            },
            output: OutputTarget::Text { file },
            ocr: OcrConfig::default(),
        }
    }
}

/// Default text output for `input`: `extracted_text/<input stem>.txt`.
pub fn default_text_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    Path::new(DEFAULT_TEXT_DIR).join(format!("{stem}.txt"))
}

/// What a finished run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub summary: RunSummary,
    /// First few emitted text segments (text mode only).
    pub preview: Vec<String>,
    /// Total emitted text segments (text mode only).
    pub text_segments: usize,
}

/// Sample `input` and write its artifacts.
///
/// Only a source that can't be opened (or has unusable timing metadata) or
/// an output location that can't be created fails the run. Unreadable frames
/// and unwritable artifacts are logged and counted in the report.
pub fn run_pipeline(input: &Path, config: &PipelineConfig) -> Result<PipelineReport> {
    config.policy.validate()?;

    info!(?input, policy = %config.policy, output = ?config.output, "pipeline starting");

    let mut source = open_source(input).context("failed to open media source")?;

    let report = match &config.output {
        OutputTarget::Screenshots { dir } => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            info!(?dir, "screenshot directory ready");

            let mut writer = ImageWriter::new(dir);
            let summary = FrameSampler::new(source.as_mut(), config.policy).run(&mut writer);
            PipelineReport {
                summary,
                ..PipelineReport::default()
            }
        }
        OutputTarget::Text { file } => {
            if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let sink = File::create(file)
                .with_context(|| format!("failed to create {}", file.display()))?;

            let ocr = TesseractCli::new(config.ocr.clone());
            let mut extractor = TextExtractor::new(ocr, BufWriter::new(sink));
            let summary = FrameSampler::new(source.as_mut(), config.policy).run(&mut extractor);
            PipelineReport {
                summary,
                preview: extractor.preview().to_vec(),
                text_segments: extractor.emitted(),
            }
        }
    };

    info!(
        artifacts = report.summary.artifacts,
        skipped_reads = report.summary.skipped_reads,
        failed_artifacts = report.summary.failed_artifacts,
        "pipeline complete"
    );
    Ok(report)
}
