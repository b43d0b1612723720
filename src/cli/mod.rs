//! Command-line interface
//!
//! Training, prediction, and dataset inspection commands.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cleaning::DataCleaner;
use crate::loader::TableLoader;
use crate::pipeline::{PipelineConfig, RatingPipeline, TransformerState};
use crate::training::{GradientBoostingConfig, PredictorConfig, RatingPredictor};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
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
#[command(name = "cinescore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Movie rating prediction with gradient boosted trees")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a rating model from a CSV dataset
    Train {
        /// Input CSV file
        #[arg(short, long, default_value = "data/movies.csv")]
        data: PathBuf,

        /// Directory for model artifacts
        #[arg(short, long, default_value = "models")]
        output: PathBuf,

        /// Number of boosting rounds
        #[arg(long, default_value = "100")]
        estimators: usize,

        /// Learning rate
        #[arg(long, default_value = "0.1")]
        learning_rate: f64,

        /// Maximum tree depth
        #[arg(long, default_value = "6")]
        max_depth: usize,

        /// Seed for splitting and subsampling
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Skip the feature-importance chart
        #[arg(long)]
        no_chart: bool,
    },

    /// Predict ratings for new movies with a trained model
    Predict {
        /// Directory holding model.json and transformers.json
        #[arg(short, long, default_value = "models")]
        model_dir: PathBuf,

        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV for predictions
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show dataset information
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data: &Path,
    output: &Path,
    estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    seed: u64,
    no_chart: bool,
) -> anyhow::Result<()> {
    section("Train");

    let config = PipelineConfig {
        data_path: data.to_path_buf(),
        model_dir: output.to_path_buf(),
        render_chart: !no_chart,
        predictor: PredictorConfig {
            random_state: seed,
            boosting: GradientBoostingConfig {
                n_estimators: estimators,
                learning_rate,
                max_depth,
                random_state: Some(seed),
                ..Default::default()
            },
            ..Default::default()
        },
    };

    step_run("Running pipeline");
    let start = Instant::now();
    let report = RatingPipeline::new(config).run()?;
    step_done(&format!(
        "{} rows, {} features in {:?}",
        report.rows,
        report.features,
        start.elapsed()
    ));

    println!();
    println!(
        "  {:<16} {}",
        muted("MAE"),
        format!("{:.4}", report.evaluation.metrics.mae).white()
    );
    println!(
        "  {:<16} {}",
        muted("RMSE"),
        format!("{:.4}", report.evaluation.metrics.rmse).white().bold()
    );
    println!(
        "  {:<16} {}",
        muted("R²"),
        format!("{:.4}", report.evaluation.metrics.r2).white()
    );
    if let Some(cv) = &report.evaluation.cv_rmse {
        println!(
            "  {:<16} {} {}",
            muted("CV RMSE"),
            format!("{:.4}", cv.mean_score).white(),
            dim(&format!("± {:.4} over {} folds", cv.std_score, cv.n_folds))
        );
    }
    println!();
    println!("  {:<16} {}", muted("Model"), report.model_path.display());
    println!(
        "  {:<16} {}",
        muted("Transformers"),
        report.transformers_path.display()
    );
    if let Some(chart) = &report.chart_path {
        println!("  {:<16} {}", muted("Chart"), chart.display());
    }
    println!();

    Ok(())
}

pub fn cmd_predict(model_dir: &Path, data: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let predictor = RatingPredictor::load(&model_dir.join("model.json"))?;
    let state = TransformerState::load(&model_dir.join("transformers.json"))?;
    step_done("");

    step_run("Loading data");
    let raw = TableLoader::new().load(data)?;
    step_done(&format!("{} rows × {} cols", raw.height(), raw.width()));

    step_run("Transforming");
    let cleaned = DataCleaner::new().clean(&raw)?;
    let engineered = state.apply(&cleaned)?;
    let predictions = predictor.predict(&engineered)?;
    step_done(&format!("{} predictions", predictions.len()));

    let titles = match engineered.column("title") {
        Ok(col) => col.as_materialized_series().clone(),
        Err(_) => Series::new(
            "title".into(),
            (0..predictions.len())
                .map(|i| format!("row {}", i))
                .collect::<Vec<String>>(),
        ),
    };
    let mut result = DataFrame::new(vec![
        titles.into(),
        Series::new("predicted_rating".into(), predictions.to_vec()).into(),
    ])?;

    match output {
        Some(path) => {
            step_run(&format!("Saving → {}", path.display()));
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(&mut result)?;
            step_done(&format!("{} rows", result.height()));
        }
        None => {
            println!();
            println!("{}", result);
        }
    }

    println!();
    Ok(())
}

pub fn cmd_info(data: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = TableLoader::new().load(data)?;

    println!("  {:<12} {}", muted("File"), data.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!(
        "  {:<20} {:<12} {:>6} {:>8}",
        muted("Column"),
        muted("Type"),
        muted("Nulls"),
        muted("Unique")
    );
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}
