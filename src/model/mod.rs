//! The pre-trained regressor, loaded once from a JSON artifact.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::*;

use crate::FeatureMatrix;

mod forest;
pub use forest::*;

mod linear;
pub use linear::*;

pub const DEFAULT_MODEL_NAME: &str = "fine_tuned_model";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode model artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid model artifact: {0}")]
    Invalid(String),
    #[error("Model expects {expected} features but was given {found} ({detail})")]
    FeatureMismatch {
        expected: usize,
        found: usize,
        detail: String,
    },
    #[error("Row {row} has {actual} values, model expects {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// A regression function over a fixed number of features.
pub trait Regressor {
    /// Check the parameters are consistent with `n_features` inputs.
    fn validate(&self, n_features: usize) -> Result<(), ModelError>;
    /// Predict one row. Only called with rows of the validated width.
    fn predict_row(&self, row: &[f64]) -> f64;
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    RandomForest(RandomForest),
    Linear(LinearModel),
}

impl Regressor for Estimator {
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        match self {
            Estimator::RandomForest(forest) => forest.validate(n_features),
            Estimator::Linear(linear) => linear.validate(n_features),
        }
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            Estimator::RandomForest(forest) => forest.predict_row(row),
            Estimator::Linear(linear) => linear.predict_row(row),
        }
    }

    fn describe(&self) -> String {
        match self {
            Estimator::RandomForest(forest) => forest.describe(),
            Estimator::Linear(linear) => linear.describe(),
        }
    }
}

/// The trained model: an estimator plus the feature names it was fitted on.
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub feature_names: Vec<String>,
    #[serde(flatten)]
    pub estimator: Estimator,
}

impl TrainedModel {
    pub fn new(
        name: impl Into<String>,
        feature_names: Vec<String>,
        estimator: Estimator,
    ) -> Result<Self, ModelError> {
        let model = Self {
            name: name.into(),
            description: None,
            feature_names,
            estimator,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.is_empty() {
            return Err(ModelError::Invalid("model has no feature names".to_string()));
        }
        self.estimator.validate(self.feature_names.len())
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&json)?;
        info!(
            "Loaded model '{}' ({}) from {}",
            model.name,
            model.estimator.describe(),
            path.display()
        );
        Ok(model)
    }

    /// Load `<dir>/<name>.json`.
    pub fn load_by_name(dir: impl AsRef<Path>, name: &str) -> Result<Self, ModelError> {
        Self::load(dir.as_ref().join(format!("{name}.json")))
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// One prediction per row, in row order. The matrix columns must be
    /// exactly the model's feature names, in the same order.
    pub fn predict(&self, rows: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        if rows.columns() != self.feature_names.as_slice() {
            let detail = self
                .feature_names
                .iter()
                .zip(rows.columns())
                .position(|(expected, found)| expected != found)
                .map(|i| {
                    format!(
                        "column {i} is '{}', expected '{}'",
                        rows.columns()[i],
                        self.feature_names[i]
                    )
                })
                .unwrap_or_else(|| "column count differs".to_string());
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_names.len(),
                found: rows.width(),
                detail,
            });
        }

        let mut predictions = Vec::with_capacity(rows.len());
        for (row, values) in rows.rows().iter().enumerate() {
            if values.len() != self.feature_names.len() {
                return Err(ModelError::RowWidth {
                    row,
                    expected: self.feature_names.len(),
                    actual: values.len(),
                });
            }
            predictions.push(self.estimator.predict_row(values));
        }
        debug!("Predicted {} rows with '{}'", predictions.len(), self.name);
        Ok(predictions)
    }
}
