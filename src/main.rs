//! Fraud Trainer - Main Entry Point
//!
//! Loads configuration, sets up logging and runs the selected command.

use clap::Parser;
use colored::Colorize;
use fraud_trainer::cli::{cmd_features, cmd_inspect, cmd_train, Cli, Commands};
use fraud_trainer::{logging, FraudError};
use std::process::ExitCode;

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.pipeline_config()?;
    logging::init(&config.logging)?;

    match &cli.command {
        Commands::Train { data, output, .. } => cmd_train(&config, data, output),
        Commands::Features { data, output } => cmd_features(&config, data, output),
        Commands::Inspect { model, json } => cmd_inspect(model, *json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<FraudError>() {
                Some(fraud) => tracing::error!(stage = %fraud.stage(), "{:#}", err),
                None => tracing::error!("{:#}", err),
            }
            println!();
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
