use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while opening or reading a media source.
///
/// `Open` and `InvalidTimeline` are fatal for a run. `Read` only affects
/// the frame it names; the sampler logs it and moves on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("invalid timeline: {0}")]
    InvalidTimeline(String),

    #[error("failed to read frame {index}: {reason}")]
    Read { index: u32, reason: String },
}

impl SourceError {
    pub fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SourceError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn read(index: u32, reason: impl ToString) -> Self {
        SourceError::Read {
            index,
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::Read { .. })
    }
}

/// Failure to persist a single artifact. Never fatal for the run.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write text segment")]
    Io(#[from] std::io::Error),
}

/// Failure of the external OCR capability.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to encode frame for OCR")]
    Encode(#[from] image::ImageError),

    #[error("OCR pipe error")]
    Io(#[from] std::io::Error),
}
