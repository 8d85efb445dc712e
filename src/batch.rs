//! Runs the whole pipeline over a table of molecules.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::*;

use crate::{
    read_reference_schema_path, Config, FeatureError, FeatureSchema, FeatureSelector, Fingerprint,
    FingerprintParams, ModelError, MoleculeTable, MorganEncoder, PredictionRecord,
    PredictionTable, SessionState, SmilesError, TableError, TrainedModel,
};

/// What to do with a molecule whose SMILES cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidMoleculePolicy {
    /// Score it as an all-zero fingerprint.
    #[default]
    ZeroFill,
    /// Leave it out of the results.
    Drop,
    /// Fail the whole batch.
    Reject,
}

impl FromStr for InvalidMoleculePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero-fill" => Ok(Self::ZeroFill),
            "drop" => Ok(Self::Drop),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown invalid-molecule policy '{other}' (expected zero-fill, drop or reject)"
            )),
        }
    }
}

impl Display for InvalidMoleculePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ZeroFill => write!(f, "zero-fill"),
            Self::Drop => write!(f, "drop"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("The file must contain a column named 'SMILES'.")]
    MissingSmilesColumn,
    #[error("Row {row}: invalid molecule '{smiles}': {source}")]
    InvalidMolecule {
        row: usize,
        smiles: String,
        source: SmilesError,
    },
    #[error("No valid molecules found in the file.")]
    NoValidMolecules,
    #[error("Fingerprint columns do not match the reference feature list: {0}")]
    SchemaMismatch(#[from] FeatureError),
    #[error("Prediction failed: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Table(TableError),
    #[error("Cannot {action} while the session is {state}")]
    Session {
        action: &'static str,
        state: SessionState,
    },
}

impl From<TableError> for PipelineError {
    fn from(error: TableError) -> Self {
        match error {
            TableError::MissingColumn(_) => PipelineError::MissingSmilesColumn,
            TableError::Schema(error) => PipelineError::SchemaMismatch(error),
            other => PipelineError::Table(other),
        }
    }
}

impl PipelineError {
    /// Problems with the user's data, as opposed to a broken deployment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingSmilesColumn
                | PipelineError::InvalidMolecule { .. }
                | PipelineError::NoValidMolecules
        )
    }
}

/// The process-wide, read-only artifacts: the model, the feature selector
/// built from the reference schema, and the fingerprint encoder.
#[derive(Debug, Clone)]
pub struct Resources {
    model: TrainedModel,
    selector: FeatureSelector,
    encoder: MorganEncoder,
}

impl Resources {
    pub fn new(
        model: TrainedModel,
        schema: FeatureSchema,
        params: FingerprintParams,
    ) -> Result<Self, PipelineError> {
        let encoder = MorganEncoder::new(params);
        let selector = FeatureSelector::new(schema, encoder.width())?;
        if selector.schema().columns() != model.feature_names.as_slice() {
            return Err(ModelError::FeatureMismatch {
                expected: model.n_features(),
                found: selector.schema().len(),
                detail: "reference schema and model feature names differ".to_string(),
            }
            .into());
        }
        Ok(Self {
            model,
            selector,
            encoder,
        })
    }

    /// Load every artifact named by the configuration.
    pub fn load(config: &Config) -> Result<Self, PipelineError> {
        let schema = read_reference_schema_path(&config.artifacts.schema_path)?;
        let model =
            TrainedModel::load_by_name(&config.artifacts.models_dir, &config.artifacts.model_name)?;
        Self::new(model, schema, config.fingerprint)
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn selector(&self) -> &FeatureSelector {
        &self.selector
    }

    pub fn encoder(&self) -> &MorganEncoder {
        &self.encoder
    }
}

/// Fingerprints, selects and predicts a whole table at once.
#[derive(Debug, Clone, Copy)]
pub struct BatchPredictor<'a> {
    resources: &'a Resources,
    policy: InvalidMoleculePolicy,
}

impl<'a> BatchPredictor<'a> {
    pub fn new(resources: &'a Resources, policy: InvalidMoleculePolicy) -> Self {
        Self { resources, policy }
    }

    pub fn policy(&self) -> InvalidMoleculePolicy {
        self.policy
    }

    pub fn run(&self, molecules: &MoleculeTable) -> Result<PredictionTable, PipelineError> {
        let encoder = self.resources.encoder();
        let mut fingerprints: Vec<Fingerprint> = Vec::with_capacity(molecules.len());
        let mut kept: Vec<(usize, &str, bool)> = Vec::with_capacity(molecules.len());

        for (row, smiles) in molecules.smiles().enumerate() {
            match encoder.try_encode(smiles) {
                Ok(fingerprint) => {
                    fingerprints.push(fingerprint);
                    kept.push((row, smiles, false));
                }
                Err(source) => match self.policy {
                    InvalidMoleculePolicy::ZeroFill => {
                        debug!("Row {row}: scoring unparseable '{smiles}' as empty ({source})");
                        fingerprints.push(Fingerprint::zeros(encoder.width()));
                        kept.push((row, smiles, true));
                    }
                    InvalidMoleculePolicy::Drop => {
                        warn!("Row {row}: dropping unparseable '{smiles}' ({source})");
                    }
                    InvalidMoleculePolicy::Reject => {
                        error!("Row {row}: rejecting batch, unparseable '{smiles}' ({source})");
                        return Err(PipelineError::InvalidMolecule {
                            row,
                            smiles: smiles.to_string(),
                            source,
                        });
                    }
                },
            }
        }

        if fingerprints.is_empty() {
            warn!("No valid molecules among {} rows", molecules.len());
            return Err(PipelineError::NoValidMolecules);
        }

        let features = self.resources.selector().select_all(&fingerprints)?;
        let predictions = self.resources.model().predict(&features)?;

        let records: Vec<PredictionRecord> = kept
            .into_iter()
            .zip(predictions)
            .map(|((row, smiles, zero_filled), prediction)| PredictionRecord {
                row,
                smiles: smiles.to_string(),
                prediction,
                zero_filled,
            })
            .collect();

        let zero_filled = records.iter().filter(|r| r.zero_filled).count();
        if zero_filled > 0 {
            warn!("{zero_filled} unparseable molecules were scored as empty fingerprints");
        }
        info!("Predicted bioactivity for {} of {} molecules", records.len(), molecules.len());
        Ok(PredictionTable::new(records))
    }
}
