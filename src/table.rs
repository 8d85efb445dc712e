use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer};
use lazy_static::lazy_static;
use thiserror::Error;
use tracing::*;

use crate::{FeatureError, FeatureSchema};

pub const SMILES_COLUMN: &str = "SMILES";
pub const PREDICTION_COLUMN: &str = "Predição_Bioatividade";
pub const DEFAULT_OUTPUT_FILE: &str = "predicoes.csv";

/// Ethanol, butane, acetic acid, triethylamine, isopropanol.
pub const EXAMPLE_SMILES: [&str; 5] = ["CCO", "CCCC", "CC(=O)O", "CCN(CC)CC", "CC(C)O"];

lazy_static! {
    static ref EXAMPLE_MOLECULES: MoleculeTable = MoleculeTable::from_smiles(EXAMPLE_SMILES);
}

/// The bundled example data set, built once per process.
pub fn example_molecules() -> &'static MoleculeTable {
    &EXAMPLE_MOLECULES
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("The file must contain a column named '{0}'.")]
    MissingColumn(String),
    #[error("Invalid reference schema: {0}")]
    Schema(#[from] FeatureError),
}

fn open(path: &Path) -> Result<File, TableError> {
    File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Uploaded molecules: the `SMILES` column plus any other columns, untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoleculeTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    smiles_column: usize,
}

impl MoleculeTable {
    /// A single-column table.
    pub fn from_smiles<S: AsRef<str>>(smiles: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: vec![SMILES_COLUMN.to_string()],
            rows: smiles
                .into_iter()
                .map(|s| vec![s.as_ref().to_string()])
                .collect(),
            smiles_column: 0,
        }
    }

    /// Read a CSV with a header row. The `SMILES` column name is case-sensitive.
    pub fn from_reader(reader: impl Read) -> Result<Self, TableError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let smiles_column = headers
            .iter()
            .position(|h| h == SMILES_COLUMN)
            .ok_or_else(|| TableError::MissingColumn(SMILES_COLUMN.to_string()))?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record: StringRecord = result?;
            rows.push(record.iter().map(|field| field.to_string()).collect());
        }
        info!("Read {} molecules with columns {:?}", rows.len(), headers);
        Ok(Self {
            headers,
            rows,
            smiles_column,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        Self::from_reader(open(path.as_ref())?)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn smiles_at(&self, row: usize) -> &str {
        &self.rows[row][self.smiles_column]
    }

    pub fn smiles(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[self.smiles_column].as_str())
    }

    /// The first `n` rows, same columns.
    pub fn head(&self, n: usize) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
            smiles_column: self.smiles_column,
        }
    }
}

/// Read the reduced feature schema from a training table's header.
/// Data rows, if any, are not read.
pub fn read_reference_schema(reader: impl Read) -> Result<FeatureSchema, TableError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let schema = FeatureSchema::from_reference_columns(columns)?;
    if let Some(label) = schema.label() {
        debug!("Reference schema has {} features, label column '{label}'", schema.len());
    }
    Ok(schema)
}

pub fn read_reference_schema_path(path: impl AsRef<Path>) -> Result<FeatureSchema, TableError> {
    let path = path.as_ref();
    let schema = read_reference_schema(open(path)?)?;
    info!("Loaded {} feature columns from {}", schema.len(), path.display());
    Ok(schema)
}

/// One processed molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// Row number in the uploaded table.
    pub row: usize,
    pub smiles: String,
    pub prediction: f64,
    /// Whether the molecule failed to parse and was scored as an all-zero fingerprint.
    pub zero_filled: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionTable {
    records: Vec<PredictionRecord>,
}

impl PredictionTable {
    pub fn new(records: Vec<PredictionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn predictions(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.prediction).collect()
    }

    /// Write the two-column export: `SMILES`, `Predição_Bioatividade`.
    pub fn write_csv(&self, writer: impl Write) -> Result<(), TableError> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record([SMILES_COLUMN, PREDICTION_COLUMN])?;
        for record in &self.records {
            let prediction = record.prediction.to_string();
            wtr.write_record([record.smiles.as_str(), prediction.as_str()])?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, TableError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        // The csv writer only emits the UTF-8 strings it was given.
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_csv(file)?;
        info!("Predictions written to {}", path.display());
        Ok(())
    }
}
