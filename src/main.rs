//! CineScore - Main Entry Point
//!
//! Movie rating prediction: preprocessing, feature engineering, and
//! gradient boosted training behind a small CLI.

use clap::Parser;
use cinescore::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinescore=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train {
            data,
            output,
            estimators,
            learning_rate,
            max_depth,
            seed,
            no_chart,
        }) => {
            cmd_train(
                &data,
                &output,
                estimators,
                learning_rate,
                max_depth,
                seed,
                no_chart,
            )?;
        }
        Some(Commands::Predict {
            model_dir,
            data,
            output,
        }) => {
            cmd_predict(&model_dir, &data, output.as_deref())?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        None => {
            // Default run mirrors `train` with its default paths
            std::fs::create_dir_all("data")?;
            cmd_train(
                Path::new("data/movies.csv"),
                &PathBuf::from("models"),
                100,
                0.1,
                6,
                42,
                false,
            )?;
        }
    }

    Ok(())
}
