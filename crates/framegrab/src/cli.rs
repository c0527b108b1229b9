use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use framegrab_core::sampling::SamplingPolicy;

#[derive(Parser)]
#[command(name = "framegrab", about = "Sample frames from videos and animated GIFs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Save sampled frames as numbered PNG screenshots.
    Screenshots {
        /// Path to the input video or GIF.
        input: PathBuf,

        /// Directory to write screenshot_NNNN.png files into.
        #[arg(short, long, default_value = "screenshots")]
        output: PathBuf,

        #[command(flatten)]
        sampling: SamplingArgs,
    },

    /// Extract on-screen text with tesseract, dropping consecutive repeats.
    Text {
        /// Path to the input video or GIF.
        input: PathBuf,

        /// Text file to write (default: extracted_text/<input name>.txt).
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        sampling: SamplingArgs,

        /// Tesseract language code, e.g. "eng" or "deu+eng".
        #[arg(long)]
        lang: Option<String>,

        /// Tesseract executable to run.
        #[arg(long, default_value = "tesseract")]
        tesseract: String,
    },
}

#[derive(Args)]
#[group(multiple = false)]
pub struct SamplingArgs {
    /// Sample one frame every N seconds (seeks directly to each point).
    #[arg(long, value_name = "SECONDS")]
    pub every: Option<f64>,

    /// Sample every Nth frame (decodes the whole source in order).
    #[arg(long, value_name = "N")]
    pub stride: Option<u32>,
}

impl SamplingArgs {
    /// The chosen policy, or `default` if neither flag was given.
    pub fn policy_or(&self, default: SamplingPolicy) -> SamplingPolicy {
        match (self.every, self.stride) {
            (Some(step_seconds), _) => SamplingPolicy::TimeInterval { step_seconds },
            (None, Some(stride)) => SamplingPolicy::FrameStride { stride },
            (None, None) => default,
        }
    }
}
