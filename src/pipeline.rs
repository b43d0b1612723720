//! End-to-end pipeline
//!
//! Wires the stages together: load, clean, impute, encode, scale,
//! engineer, train, evaluate. Fitted transformer parameters are an
//! explicit serializable object persisted next to the model, so a
//! later inference batch goes through the exact same transformation
//! without refitting.

use crate::cleaning::DataCleaner;
use crate::error::{CineScoreError, Result};
use crate::feature_engineering::FeatureEngineer;
use crate::loader::TableLoader;
use crate::preprocessing::{numeric_column_names, Imputer, StandardScaler, TargetEncoder};
use crate::training::{EvaluationReport, PredictorConfig, RatingPredictor};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Categorical columns considered for target encoding when present
pub const ENCODE_CANDIDATES: [&str; 5] = ["director", "genres", "Actor 1", "Actor 2", "Actor 3"];

/// Columns a stage consumes and the columns it adds
#[derive(Debug, Clone)]
pub struct StageContract {
    pub stage: &'static str,
    pub required: &'static [&'static str],
    pub produces: &'static [&'static str],
}

impl StageContract {
    /// Fail with the first missing column.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        for column in self.required {
            if df.column(column).is_err() {
                return Err(CineScoreError::ContractViolation {
                    stage: self.stage.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

const ENCODE_CONTRACT: StageContract = StageContract {
    stage: "encode",
    required: &["rating", "director", "genres"],
    produces: &["director_encoded", "genres_encoded"],
};
const ENGINEER_CONTRACT: StageContract = StageContract {
    stage: "engineer",
    required: &["release_date", "rating", "director_encoded", "genres_encoded"],
    produces: &[
        "director_avg_rating",
        "director_movie_count",
        "genre_avg_rating",
        "genre_movie_count",
        "genre_popularity_score",
        "release_year",
        "release_month",
        "release_day",
        "release_dayofweek",
        "release_quarter",
        "yearly_avg_rating",
    ],
};
const TRAIN_CONTRACT: StageContract = StageContract {
    stage: "train",
    required: &["rating"],
    produces: &[],
};

/// Walk the stage chain against the loaded table's columns, so a column
/// mismatch surfaces before any stage runs instead of deep inside one.
pub fn validate_chain(initial_columns: &[String]) -> Result<()> {
    let mut available: HashSet<&str> = initial_columns.iter().map(|s| s.as_str()).collect();
    for contract in [&ENCODE_CONTRACT, &ENGINEER_CONTRACT, &TRAIN_CONTRACT] {
        for column in contract.required {
            if !available.contains(column) {
                return Err(CineScoreError::ContractViolation {
                    stage: contract.stage.to_string(),
                    column: column.to_string(),
                });
            }
        }
        available.extend(contract.produces.iter().copied());
    }
    Ok(())
}

/// Fitted preprocessing parameters, persisted beside the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerState {
    pub imputer: Imputer,
    pub encoder: TargetEncoder,
    pub scaler: StandardScaler,
    pub target_column: String,
}

impl TransformerState {
    /// Reapply the fitted stages to a new table in training order.
    ///
    /// Inference batches carry no label, but the feature engineer's
    /// group aggregates read it, so an absent target column is stood
    /// in by the fitted training mean. The placeholder never reaches
    /// the model: predictions select only the fitted feature columns.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = self.imputer.transform(df)?;
        if df.column(&self.target_column).is_err() {
            let fill = self
                .imputer
                .numeric_fill(&self.target_column)
                .unwrap_or_else(|| self.encoder.global_mean());
            let placeholder = Series::new(
                self.target_column.as_str().into(),
                vec![fill; df.height()],
            );
            df.with_column(placeholder)?;
        }
        let df = self.encoder.transform(&df)?;
        let df = self.scaler.transform(&df)?;
        FeatureEngineer::new().engineer(&df)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&json)?;
        Ok(state)
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input CSV
    pub data_path: PathBuf,
    /// Directory for the model and transformer artifacts
    pub model_dir: PathBuf,
    /// Write a feature-importance chart after training
    pub render_chart: bool,
    /// Model settings
    pub predictor: PredictorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/movies.csv"),
            model_dir: PathBuf::from("models"),
            render_chart: true,
            predictor: PredictorConfig::default(),
        }
    }
}

/// Outcome of a full training run
#[derive(Debug)]
pub struct PipelineReport {
    pub rows: usize,
    pub features: usize,
    pub evaluation: EvaluationReport,
    pub model_path: PathBuf,
    pub transformers_path: PathBuf,
    pub chart_path: Option<PathBuf>,
}

/// Orchestrates a full train-and-evaluate run
#[derive(Debug, Clone)]
pub struct RatingPipeline {
    config: PipelineConfig,
    loader: TableLoader,
    cleaner: DataCleaner,
}

impl RatingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            loader: TableLoader::new(),
            cleaner: DataCleaner::new(),
        }
    }

    /// Run every stage and persist the artifacts.
    pub fn run(&self) -> Result<PipelineReport> {
        if !self.config.data_path.exists() {
            return Err(CineScoreError::MissingFile(self.config.data_path.clone()));
        }
        std::fs::create_dir_all(&self.config.model_dir)?;

        let raw = self.loader.load(&self.config.data_path)?;
        info!(rows = raw.height(), columns = raw.width(), "table loaded");

        let columns: Vec<String> = raw
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        validate_chain(&columns)?;

        let (engineered, state) = self.fit_transform(&raw)?;

        TRAIN_CONTRACT.validate(&engineered)?;
        let mut predictor = RatingPredictor::new(self.config.predictor.clone());
        let split = predictor.prepare_data(&engineered)?;
        predictor.train(&split)?;
        let evaluation = predictor.evaluate(&split)?;
        info!(
            rmse = evaluation.metrics.rmse,
            r2 = evaluation.metrics.r2,
            "model evaluated"
        );

        let model_path = self.config.model_dir.join("model.json");
        let transformers_path = self.config.model_dir.join("transformers.json");
        predictor.save(&model_path)?;
        state.save(&transformers_path)?;

        let chart_path = if self.config.render_chart {
            let path = self.config.model_dir.join("feature_importance.png");
            crate::visualization::render_importance_chart(
                &predictor.feature_importance_pairs(),
                &path,
            )?;
            Some(path)
        } else {
            None
        };

        Ok(PipelineReport {
            rows: engineered.height(),
            features: predictor.feature_names().len(),
            evaluation,
            model_path,
            transformers_path,
            chart_path,
        })
    }

    /// Fit the transformer chain on a raw table and return the
    /// engineered result with the fitted state.
    pub fn fit_transform(&self, raw: &DataFrame) -> Result<(DataFrame, TransformerState)> {
        let cleaned = self.cleaner.clean(raw)?;

        let mut imputer = Imputer::new();
        let imputed = imputer.fit_transform(&cleaned)?;

        ENCODE_CONTRACT.validate(&imputed)?;
        let mut encoder = TargetEncoder::new(&ENCODE_CANDIDATES);
        let encoded = encoder.fit_transform(&imputed, &self.config.predictor.target_column)?;

        let numeric = numeric_column_names(&encoded, &[&self.config.predictor.target_column]);
        let numeric_refs: Vec<&str> = numeric.iter().map(|s| s.as_str()).collect();
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&encoded, &numeric_refs)?;

        ENGINEER_CONTRACT.validate(&scaled)?;
        let engineered = FeatureEngineer::new().engineer(&scaled)?;
        info!(
            rows = engineered.height(),
            columns = engineered.width(),
            "features engineered"
        );

        let state = TransformerState {
            imputer,
            encoder,
            scaler,
            target_column: self.config.predictor.target_column.clone(),
        };
        Ok((engineered, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_reports_missing_column() {
        let df = df! { "rating" => &[1.0] }.unwrap();
        assert!(TRAIN_CONTRACT.validate(&df).is_ok());

        let err = ENGINEER_CONTRACT.validate(&df).unwrap_err();
        match err {
            CineScoreError::ContractViolation { stage, column } => {
                assert_eq!(stage, "engineer");
                assert_eq!(column, "release_date");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_chain_validates_before_any_stage() {
        let full: Vec<String> = ["title", "director", "genres", "release_date", "rating"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(validate_chain(&full).is_ok());

        // Dropping a raw input surfaces as the first stage that needs it.
        let no_director: Vec<String> = full
            .iter()
            .filter(|c| c.as_str() != "director")
            .cloned()
            .collect();
        match validate_chain(&no_director).unwrap_err() {
            CineScoreError::ContractViolation { stage, column } => {
                assert_eq!(stage, "encode");
                assert_eq!(column, "director");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fit_transform_produces_encoded_features() {
        let raw = df! {
            "title" => &["Inception", "Titanic", "Avatar", "Dunkirk"],
            "director" => &["Nolan", "Cameron", "Cameron", "Nolan"],
            "genres" => &["Sci-Fi", "Romance", "Sci-Fi", "War"],
            "release_date" => &["2010", "1997", "2009", "2017"],
            "rating" => &[8.8, 7.8, 7.9, 7.8],
        }
        .unwrap();

        let pipeline = RatingPipeline::new(PipelineConfig::default());
        let (engineered, _) = pipeline.fit_transform(&raw).unwrap();

        assert_eq!(engineered.height(), 4);
        assert!(engineered.column("director_encoded").is_ok());
        assert!(engineered.column("genres_encoded").is_ok());
        assert!(engineered.column("director_avg_rating").is_ok());
        assert!(engineered.column("genre_popularity_score").is_ok());
        assert!(engineered.column("yearly_avg_rating").is_ok());
        assert!(engineered.column("director").is_err());
    }

    #[test]
    fn test_transformer_state_applies_to_new_rows() {
        let raw = df! {
            "title" => &["A", "B", "C", "D", "E"],
            "director" => &["X", "X", "Y", "Y", "Z"],
            "genres" => &["Drama", "Drama", "Action", "Action", "Drama"],
            "release_date" => &["2000", "2001", "2002", "2003", "2004"],
            "rating" => &[6.0, 7.0, 8.0, 5.0, 9.0],
        }
        .unwrap();

        let pipeline = RatingPipeline::new(PipelineConfig::default());
        let (_, state) = pipeline.fit_transform(&raw).unwrap();

        let fresh = df! {
            "title" => &["F", "G"],
            "director" => &["X", "Unseen"],
            "genres" => &["Drama", "Drama"],
            "release_date" => &["2005", "2006"],
            "rating" => &[7.5, 6.5],
        }
        .unwrap();
        let cleaned = DataCleaner::new().clean(&fresh).unwrap();
        let applied = state.apply(&cleaned).unwrap();

        assert_eq!(applied.height(), 2);
        assert!(applied.column("director_encoded").is_ok());
        assert!(applied.column("release_year").is_ok());
    }

    #[test]
    fn test_transformer_state_applies_without_label_column() {
        let raw = df! {
            "title" => &["A", "B", "C", "D", "E"],
            "director" => &["X", "X", "Y", "Y", "Z"],
            "genres" => &["Drama", "Drama", "Action", "Action", "Drama"],
            "release_date" => &["2000", "2001", "2002", "2003", "2004"],
            "rating" => &[6.0, 7.0, 8.0, 5.0, 9.0],
        }
        .unwrap();

        let pipeline = RatingPipeline::new(PipelineConfig::default());
        let (_, state) = pipeline.fit_transform(&raw).unwrap();

        // An inference batch has no rating column at all.
        let unlabeled = df! {
            "title" => &["F", "G"],
            "director" => &["X", "Z"],
            "genres" => &["Drama", "Action"],
            "release_date" => &["2005", "2006"],
        }
        .unwrap();
        let cleaned = DataCleaner::new().clean(&unlabeled).unwrap();
        let applied = state.apply(&cleaned).unwrap();

        assert_eq!(applied.height(), 2);
        assert!(applied.column("director_encoded").is_ok());
        assert!(applied.column("release_year").is_ok());

        // The stand-in label is the fitted training mean.
        let rating = applied.column("rating").unwrap().f64().unwrap();
        assert!((rating.get(0).unwrap() - 7.0).abs() < 1e-10);
        assert!((rating.get(1).unwrap() - 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_missing_input_file_is_fatal() {
        let config = PipelineConfig {
            data_path: PathBuf::from("definitely/not/here.csv"),
            ..Default::default()
        };
        let pipeline = RatingPipeline::new(config);
        assert!(matches!(
            pipeline.run(),
            Err(CineScoreError::MissingFile(_))
        ));
    }
}
