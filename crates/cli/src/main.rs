//! Document classification CLI
//!
//! Classify a single document, evaluate a labelled batch, or compute metrics
//! from predictions made elsewhere.

mod manifest;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_classify_classification::extract_key_info;
use doc_classify_common::ClassifierConfig;
use doc_classify_evaluation::{EvaluationConfig, EvaluationEngine, EvaluationReport};
use doc_classify_orchestrator::ClassificationOrchestrator;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "doc-classify")]
#[command(about = "Classify loan application documents and evaluate classifier accuracy")]
struct Args {
    /// Use only local extraction and rule-based classification (no AWS calls)
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single document and print the result as JSON
    Classify {
        /// Path to the document (PDF, PNG, JPEG)
        file: PathBuf,

        /// Review threshold (default: CONFIDENCE_THRESHOLD or 0.8)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,

        /// Also print dates, amounts and account numbers found in the text
        #[arg(long)]
        key_info: bool,
    },

    /// Classify a labelled batch and write an evaluation report
    Evaluate {
        /// CSV with `filename,true_label` columns (label may be empty)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Directory containing the documents named in the manifest
        #[arg(short, long)]
        dir: PathBuf,

        /// Where to write the JSON report (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent documents (default: EVAL_MAX_WORKERS or CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Review threshold (default: EVAL_REVIEW_THRESHOLD or 0.8)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
    },

    /// Compute an evaluation report from precomputed predictions
    Metrics {
        /// CSV with `filename,true_label,predicted_label,confidence` columns
        #[arg(short, long)]
        predictions: PathBuf,

        /// Where to write the JSON report (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the supported document types
    Types,

    /// Check every configured extractor and classifier
    Health,
}

/// Parse a review threshold, rejecting anything outside [0, 1] (and NaN).
fn parse_threshold(value: &str) -> Result<f64, String> {
    let threshold: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid threshold '{value}': {e}"))?;
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(format!("threshold {threshold} must be between 0 and 1"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "doc_classify=info"
                    .parse()
                    .expect("directive is compile-time constant"),
            ),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClassifierConfig::from_env();
    config.offline_only |= args.offline;
    config.validate().context("Invalid classifier configuration")?;

    match args.command {
        Command::Classify {
            file,
            threshold,
            key_info,
        } => classify(&config, &file, threshold, key_info).await,
        Command::Evaluate {
            manifest,
            dir,
            output,
            workers,
            threshold,
        } => {
            let mut eval_config = EvaluationConfig::from_env();
            if let Some(workers) = workers {
                eval_config = eval_config.with_max_workers(workers);
            }
            if let Some(threshold) = threshold {
                eval_config = eval_config.with_review_threshold(threshold);
            }
            evaluate(&config, eval_config, &manifest, &dir, output.as_deref()).await
        }
        Command::Metrics {
            predictions,
            output,
        } => metrics(&predictions, output.as_deref()).await,
        Command::Types => {
            let types: Vec<String> = ClassificationOrchestrator::supported_document_types()
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "document_types": types }))?);
            Ok(())
        }
        Command::Health => {
            let orchestrator = ClassificationOrchestrator::from_config(&config).await;
            let health = orchestrator.health_check().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(())
        }
    }
}

async fn classify(
    config: &ClassifierConfig,
    file: &Path,
    threshold: Option<f64>,
    key_info: bool,
) -> Result<()> {
    let document =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let orchestrator = ClassificationOrchestrator::from_config(config).await;
    let threshold = threshold.unwrap_or(config.review_threshold);

    let classified = orchestrator
        .classify_document_with_text(&document, threshold)
        .await
        .with_context(|| format!("Failed to classify {}", file.display()))?;

    let mut output = json!({
        "filename": file.file_name().map(|n| n.to_string_lossy().into_owned()),
        "classification": classified.result,
        "confidence_explanation": classified.result.confidence_explanation(),
    });
    if key_info {
        output["key_info"] = serde_json::to_value(extract_key_info(
            &classified.text,
            classified.result.classifier_category(),
        ))?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn evaluate(
    config: &ClassifierConfig,
    eval_config: EvaluationConfig,
    manifest_path: &Path,
    dir: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let entries = manifest::load_manifest(manifest_path, dir)?;
    info!("Loaded {} entries from {}", entries.len(), manifest_path.display());

    let orchestrator = Arc::new(ClassificationOrchestrator::from_config(config).await);
    let engine = EvaluationEngine::new(orchestrator, eval_config);
    let report = engine.run_batch(entries).await.context("Evaluation run failed")?;

    write_report(&report, output)
}

async fn metrics(predictions: &Path, output: Option<&Path>) -> Result<()> {
    let items = manifest::load_predictions(predictions)?;
    let eval_config = EvaluationConfig::from_env();

    // No documents to classify, so the orchestrator is never invoked.
    let orchestrator = Arc::new(ClassificationOrchestrator::new(vec![], vec![]));
    let engine = EvaluationEngine::new(orchestrator, eval_config);
    let report = engine.evaluate_predictions(items).await?;

    write_report(&report, output)
}

fn write_report(report: &EvaluationReport, output: Option<&Path>) -> Result<()> {
    let json = report.to_json().context("Failed to serialise report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(
                "Report for run_id={} written to {} (accuracy: {})",
                report.run_id,
                path.display(),
                report
                    .overall_accuracy()
                    .map_or_else(|| "n/a".to_string(), |a| format!("{:.1}%", a * 100.0))
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threshold_accepts_unit_interval() {
        assert_eq!(parse_threshold("0"), Ok(0.0));
        assert_eq!(parse_threshold("0.8"), Ok(0.8));
        assert_eq!(parse_threshold("1"), Ok(1.0));
    }

    #[test]
    fn test_parse_threshold_rejects_out_of_range() {
        assert!(parse_threshold("2.0").is_err());
        assert!(parse_threshold("-0.1").is_err());
        assert!(parse_threshold("NaN").is_err());
        assert!(parse_threshold("high").is_err());
    }

    #[test]
    fn test_threshold_flag_validated_by_parser() {
        assert!(Args::try_parse_from(["doc-classify", "classify", "a.pdf", "--threshold", "2.0"]).is_err());
        assert!(Args::try_parse_from([
            "doc-classify", "evaluate", "-m", "m.csv", "-d", "docs", "--threshold", "0.7",
        ])
        .is_ok());
    }
}
