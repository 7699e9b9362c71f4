//! Fraud Trainer CLI Module
//!
//! Command-line interface for training, feature export and model inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::export::load_model;
use crate::pipeline;
use crate::training::CandidateFailurePolicy;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fraud-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, compare and persist transaction fraud classifiers")]
#[command(long_about = None)]
pub struct Cli {
    /// TOML configuration file (FRAUD__* environment variables override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log to the file only, not to the console
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and save the most accurate model
    Train {
        /// Input transactions (CSV with header)
        #[arg(short, long)]
        data: PathBuf,

        /// Output model file
        #[arg(short, long)]
        output: PathBuf,

        /// Share of rows held out for scoring
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Seed for the split and the seeded models
        #[arg(long)]
        seed: Option<u64>,

        /// Train candidates in parallel
        #[arg(long)]
        parallel: bool,

        /// Skip candidates that fail instead of aborting the run
        #[arg(long)]
        skip_failures: bool,
    },

    /// Derive features and save the engineered table
    Features {
        /// Input transactions (CSV with header)
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the metadata of a saved model
    Inspect {
        /// Saved model file
        #[arg(short, long)]
        model: PathBuf,

        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Configuration file and environment, then command-line flags
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;
        if self.quiet {
            config.logging.console = false;
        }
        if let Commands::Train {
            test_fraction,
            seed,
            parallel,
            skip_failures,
            ..
        } = &self.command
        {
            if let Some(fraction) = test_fraction {
                config.evaluation.test_fraction = *fraction;
            }
            if let Some(seed) = seed {
                config.evaluation.random_state = *seed;
            }
            if *parallel {
                config.evaluation.parallel = true;
            }
            if *skip_failures {
                config.evaluation.on_failure = CandidateFailurePolicy::Skip;
            }
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(config: &PipelineConfig, data_path: &Path, output: &Path) -> anyhow::Result<()> {
    section("Train");

    step_run(&format!("Evaluating {} candidates", config.evaluation.roster.len()));
    let summary = pipeline::run(config, data_path, output)?;
    step_done(&format!("{:.2}s", summary.elapsed_secs));

    for warning in &summary.validation.warnings {
        println!("  {} {}", "!".yellow(), dim(&warning.to_string()));
    }

    println!();
    println!("  {:<28} {:>10}", muted("Model"), muted("Accuracy"));
    println!("  {}", dim(&"─".repeat(40)));
    for score in &summary.scores {
        let line = format!("  {:<28} {:>10.4}", score.name, score.accuracy);
        if score.name == summary.best.name {
            println!("{}", line.white().bold());
        } else {
            println!("{}", line);
        }
    }
    for (name, error) in &summary.skipped {
        println!("  {:<28} {:>10}", name, "skipped".red());
        println!("    {}", dim(error));
    }
    println!("  {}", dim(&"─".repeat(40)));

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        summary.best.name.white().bold(),
        muted("accuracy:"),
        summary.best.accuracy
    );
    kv("Saved to", &summary.model_path.display().to_string());
    kv("Split", &format!("{} train / {} test", summary.n_train, summary.n_test));
    println!();

    Ok(())
}

pub fn cmd_features(config: &PipelineConfig, data_path: &Path, output: &Path) -> anyhow::Result<()> {
    section("Features");

    step_run("Deriving features");
    let start = Instant::now();
    let engineered = pipeline::export_features(config, data_path, output)?;
    step_done(&format!("{} rows × {} cols in {:?}", engineered.height(), engineered.width(), start.elapsed()));

    kv("Saved to", &output.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_inspect(model_path: &Path, json: bool) -> anyhow::Result<()> {
    let model = load_model(model_path)?;
    let meta = model.metadata();

    if json {
        println!("{}", serde_json::to_string_pretty(meta)?);
        return Ok(());
    }

    section("Model");

    kv("File", &model_path.display().to_string());
    kv("Name", &meta.name);
    kv("Kind", meta.kind.as_str());
    kv("Accuracy", &format!("{:.4}", meta.accuracy));
    kv("Target", &meta.target);
    kv("Features", &meta.feature_names.len().to_string());
    kv("Created", &meta.created_at.to_rfc3339());
    kv("Written by", &format!("fraud-trainer {}", meta.crate_version));

    println!();
    for name in &meta.feature_names {
        println!("    {}", dim(name));
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_flags_override_config() {
        let cli = Cli::parse_from([
            "fraud-trainer",
            "train",
            "--data",
            "transactions.csv",
            "--output",
            "model.bin",
            "--test-fraction",
            "0.3",
            "--seed",
            "7",
            "--parallel",
            "--quiet",
        ]);
        let config = cli.pipeline_config().unwrap();

        assert_eq!(config.evaluation.test_fraction, 0.3);
        assert_eq!(config.evaluation.random_state, 7);
        assert!(config.evaluation.parallel);
        assert_eq!(config.evaluation.on_failure, CandidateFailurePolicy::Abort);
        assert!(!config.logging.console);
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::parse_from(["fraud-trainer", "inspect", "--model", "model.bin"]);
        let config = cli.pipeline_config().unwrap();
        assert_eq!(config.evaluation.test_fraction, 0.2);
        assert_eq!(config.evaluation.random_state, 42);
        assert!(matches!(cli.command, Commands::Inspect { .. }));
    }

    #[test]
    fn test_output_is_required_for_train() {
        assert!(Cli::try_parse_from(["fraud-trainer", "train", "--data", "x.csv"]).is_err());
    }
}
