//! One user's submission: load data, run the batch, keep the results.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Read;
use std::path::Path;

use tracing::*;

use crate::{
    example_molecules, BatchPredictor, InvalidMoleculePolicy, MoleculeTable, PipelineError,
    PredictionTable, Resources,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DataLoaded,
    Processing,
    Succeeded,
    Failed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::DataLoaded => write!(f, "loaded"),
            SessionState::Processing => write!(f, "processing"),
            SessionState::Succeeded => write!(f, "done"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Tracks `Idle → DataLoaded → Processing → {Succeeded, Failed}`.
/// Loading new data from any state starts over at `DataLoaded`.
#[derive(Debug)]
pub struct Session<'a> {
    resources: &'a Resources,
    policy: InvalidMoleculePolicy,
    state: SessionState,
    molecules: Option<MoleculeTable>,
    results: Option<PredictionTable>,
    last_error: Option<String>,
}

impl<'a> Session<'a> {
    pub fn new(resources: &'a Resources, policy: InvalidMoleculePolicy) -> Self {
        Self {
            resources,
            policy,
            state: SessionState::Idle,
            molecules: None,
            results: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn molecules(&self) -> Option<&MoleculeTable> {
        self.molecules.as_ref()
    }

    pub fn results(&self) -> Option<&PredictionTable> {
        self.results.as_ref()
    }

    /// The user-facing message of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn loaded(&mut self, molecules: MoleculeTable) -> &MoleculeTable {
        debug!("Session {} -> {}", self.state, SessionState::DataLoaded);
        self.state = SessionState::DataLoaded;
        self.results = None;
        self.last_error = None;
        self.molecules.insert(molecules)
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        warn!("Session {} -> {}: {error}", self.state, SessionState::Failed);
        self.state = SessionState::Failed;
        self.results = None;
        self.last_error = Some(error.to_string());
        error
    }

    /// Use the bundled example molecules.
    pub fn load_example(&mut self) -> &MoleculeTable {
        info!("Using the example dataset");
        self.loaded(example_molecules().clone())
    }

    /// Load an uploaded CSV. A file without a `SMILES` column leaves the
    /// session `Failed` with nothing to process.
    pub fn load_csv(&mut self, reader: impl Read) -> Result<&MoleculeTable, PipelineError> {
        match MoleculeTable::from_reader(reader) {
            Ok(molecules) => Ok(self.loaded(molecules)),
            Err(error) => {
                self.molecules = None;
                Err(self.fail(error.into()))
            }
        }
    }

    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<&MoleculeTable, PipelineError> {
        match MoleculeTable::from_path(path) {
            Ok(molecules) => Ok(self.loaded(molecules)),
            Err(error) => {
                self.molecules = None;
                Err(self.fail(error.into()))
            }
        }
    }

    /// Process the loaded molecules. Only valid right after a load:
    /// `Succeeded` and `Failed` are final until new data arrives.
    pub fn run(&mut self) -> Result<&PredictionTable, PipelineError> {
        let molecules = match (self.state, self.molecules.as_ref()) {
            (SessionState::DataLoaded, Some(molecules)) => molecules,
            (state, _) => {
                return Err(PipelineError::Session {
                    action: "run predictions",
                    state,
                })
            }
        };

        debug!("Session {} -> {}", self.state, SessionState::Processing);
        self.state = SessionState::Processing;
        match BatchPredictor::new(self.resources, self.policy).run(molecules) {
            Ok(table) => {
                debug!("Session {} -> {}", self.state, SessionState::Succeeded);
                self.state = SessionState::Succeeded;
                self.last_error = None;
                Ok(self.results.insert(table))
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Back to `Idle`, forgetting data and results.
    pub fn reset(&mut self) {
        debug!("Session {} -> {}", self.state, SessionState::Idle);
        self.state = SessionState::Idle;
        self.molecules = None;
        self.results = None;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::tests::bundled_resources;
    use crate::{Config, EXAMPLE_SMILES, PREDICTION_COLUMN, SMILES_COLUMN};

    #[test]
    fn test_example_end_to_end() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        assert_eq!(session.state(), SessionState::Idle);

        assert_eq!(session.load_example().len(), 5);
        assert_eq!(session.state(), SessionState::DataLoaded);

        let results = session.run().unwrap();
        assert_eq!(results.len(), 5);
        let smiles: Vec<&str> = results.records().iter().map(|r| r.smiles.as_str()).collect();
        assert_eq!(smiles, EXAMPLE_SMILES.to_vec());
        assert!(results.predictions().iter().all(|p| p.is_finite()));
        assert_eq!(session.state(), SessionState::Succeeded);

        let csv = session.results().unwrap().to_csv_string().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(format!("{SMILES_COLUMN},{PREDICTION_COLUMN}").as_str()));
        assert_eq!(lines.count(), 5);
    }

    #[test]
    fn test_predictions_are_deterministic() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        session.load_example();
        let a = session.run().unwrap().predictions();
        session.load_example();
        let b = session.run().unwrap().predictions();
        assert_eq!(a, b);
    }

    #[test]
    fn test_finished_session_needs_new_data() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        session.load_example();
        session.run().unwrap();

        let err = session.run().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Session { state: SessionState::Succeeded, .. }
        ));
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(session.results().map(|r| r.len()), Some(5));

        let mut failed = Session::new(&resources, InvalidMoleculePolicy::Reject);
        failed.load_csv("SMILES\nxyz\n".as_bytes()).unwrap();
        assert!(failed.run().is_err());
        assert!(matches!(
            failed.run(),
            Err(PipelineError::Session { state: SessionState::Failed, .. })
        ));
    }

    #[test]
    fn test_uploaded_csv_keeps_other_columns() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        let csv = "name,SMILES\nethanol,CCO\nbroken,C1CC\ncaffeine,Cn1cnc2c1c(=O)n(C)c(=O)n2C\n";
        let loaded = session.load_csv(csv.as_bytes()).unwrap();
        assert_eq!(loaded.headers(), &["name", "SMILES"]);
        assert_eq!(loaded.rows()[2][0], "caffeine");

        let results = session.run().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.records()[1].zero_filled);
        assert!(!results.records()[2].zero_filled);
    }

    #[test]
    fn test_missing_column_fails_without_processing() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        session.load_example();
        let err = session.load_csv("smiles\nCCO\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSmilesColumn));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.molecules().is_none());
        assert_eq!(
            session.last_error(),
            Some("The file must contain a column named 'SMILES'.")
        );
        assert!(matches!(session.run(), Err(PipelineError::Session { .. })));
    }

    #[test]
    fn test_run_requires_data() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        let err = session.run().unwrap_err();
        assert!(matches!(err, PipelineError::Session { state: SessionState::Idle, .. }));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_no_valid_molecules_fails() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::Drop);
        session.load_csv("SMILES\nxyz\n((\n".as_bytes()).unwrap();
        let err = session.run().unwrap_err();
        assert!(matches!(err, PipelineError::NoValidMolecules));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.results().is_none());

        // New data restarts the flow.
        session.load_example();
        assert_eq!(session.state(), SessionState::DataLoaded);
        assert!(session.last_error().is_none());
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Succeeded);
    }

    #[test]
    fn test_reset() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        session.load_example();
        session.run().unwrap();
        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.molecules().is_none());
        assert!(session.results().is_none());
    }

    #[test]
    fn test_resources_from_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir(&models).unwrap();
        std::fs::write(
            models.join("fine_tuned_model.json"),
            include_str!("../models/fine_tuned_model.json"),
        )
        .unwrap();
        let schema = dir.path().join("reduced_fingerprints.csv");
        std::fs::write(&schema, include_str!("../datasets/reduced_fingerprints.csv")).unwrap();

        let mut config = Config::default();
        config.artifacts.models_dir = models;
        config.artifacts.schema_path = schema;
        let resources = Resources::load(&config).unwrap();
        assert_eq!(resources.selector().schema().len(), resources.model().n_features());

        let input = dir.path().join("input.csv");
        std::fs::write(&input, "SMILES\nCCO\nCC(C)O\n").unwrap();
        let output = dir.path().join("predicoes.csv");
        let mut session = Session::new(&resources, config.pipeline.on_invalid_molecule);
        session.load_path(&input).unwrap();
        session.run().unwrap().write_to_path(&output).unwrap();
        let reloaded = MoleculeTable::from_path(&output).unwrap();
        assert_eq!(reloaded.smiles().collect::<Vec<_>>(), vec!["CCO", "CC(C)O"]);

        config.artifacts.model_name = "missing".to_string();
        assert!(matches!(Resources::load(&config), Err(PipelineError::Model(_))));
    }

    #[test]
    fn test_missing_input_file() {
        let resources = bundled_resources();
        let mut session = Session::new(&resources, InvalidMoleculePolicy::ZeroFill);
        let err = session.load_path("/nonexistent/input.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Table(_)));
        assert!(!err.is_validation());
        assert_eq!(session.state(), SessionState::Failed);
    }
}
