mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use framegrab_core::ocr::OcrConfig;
use framegrab_core::pipeline::{self, PipelineConfig, PipelineReport};

/// With more segments than this, only the first few are echoed to the console.
const FULL_ECHO_LIMIT: usize = 10;
const SHORT_ECHO_COUNT: usize = 3;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Screenshots {
            input,
            output,
            sampling,
        } => {
            let mut config = PipelineConfig::screenshots(output.clone());
            config.policy = sampling.policy_or(config.policy);
            info!(?input, ?output, policy = %config.policy, "extracting screenshots");

            let report = pipeline::run_pipeline(&input, &config).context("pipeline failed")?;
            if report.summary.artifacts == 0 {
                warn!("no screenshots written");
            }

            println!(
                "Saved {} screenshots to {}",
                report.summary.artifacts,
                output.display()
            );
            Ok(())
        }
        cli::Command::Text {
            input,
            output,
            sampling,
            lang,
            tesseract,
        } => {
            let output = output.unwrap_or_else(|| pipeline::default_text_output(&input));
            let mut config = PipelineConfig::text(output.clone());
            config.policy = sampling.policy_or(config.policy);
            config.ocr = OcrConfig {
                program: tesseract,
                language: lang,
            };
            info!(?input, ?output, policy = %config.policy, "extracting text");

            let report = pipeline::run_pipeline(&input, &config).context("pipeline failed")?;
            print_text_report(&report, &output);
            Ok(())
        }
    }
}

fn print_text_report(report: &PipelineReport, output: &Path) {
    println!(
        "Extracted {} text segments and saved to {}",
        report.text_segments,
        output.display()
    );
    if report.text_segments == 0 {
        return;
    }

    if report.text_segments <= FULL_ECHO_LIMIT {
        println!("\nExtracted text:");
        for text in &report.preview {
            println!("---\n{text}\n---");
        }
    } else {
        println!("\nFirst {SHORT_ECHO_COUNT} extracted segments:");
        for text in report.preview.iter().take(SHORT_ECHO_COUNT) {
            println!("---\n{text}\n---");
        }
        println!(
            "\n... and {} more segments (see {} for all content)",
            report.text_segments - SHORT_ECHO_COUNT,
            output.display()
        );
    }
}
