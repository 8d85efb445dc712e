use std::collections::HashMap;

use thiserror::Error;
use tracing::*;

use crate::Fingerprint;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("Feature columns {missing:?} do not exist in the {width}-column fingerprint")]
    SchemaMismatch { missing: Vec<String>, width: usize },
    #[error("Fingerprint has {actual} columns, the feature selector expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("Reference schema has no feature columns")]
    EmptySchema,
}

/// Label of fingerprint column `index`, as used by the reference schema.
pub fn column_label(index: usize) -> String {
    index.to_string()
}

/// The ordered feature columns the model was trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
    label: Option<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            label: None,
        }
    }

    /// Build from a training table's header: every column but the last,
    /// which holds the training label.
    pub fn from_reference_columns(mut columns: Vec<String>) -> Result<Self, FeatureError> {
        let label = columns.pop();
        if columns.is_empty() {
            return Err(FeatureError::EmptySchema);
        }
        Ok(Self { columns, label })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Row-major matrix of selected features, with column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. The caller guarantees it is as wide as the column list.
    pub fn push_row(&mut self, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Maps the schema's column identifiers to fingerprint positions once,
/// so selection is plain indexing afterwards.
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    schema: FeatureSchema,
    indices: Vec<usize>,
    width: usize,
}

impl FeatureSelector {
    pub fn new(schema: FeatureSchema, width: usize) -> Result<Self, FeatureError> {
        let positions: HashMap<String, usize> =
            (0..width).map(|index| (column_label(index), index)).collect();

        let mut indices = Vec::with_capacity(schema.len());
        let mut missing = Vec::new();
        for column in schema.columns() {
            match positions.get(column) {
                Some(&index) => indices.push(index),
                None => missing.push(column.clone()),
            }
        }
        if !missing.is_empty() {
            error!("Reference schema names columns outside the fingerprint: {missing:?}");
            return Err(FeatureError::SchemaMismatch { missing, width });
        }

        debug!("Feature selector keeps {} of {width} columns", indices.len());
        Ok(Self {
            schema,
            indices,
            width,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Restrict a fingerprint to the schema's columns, in schema order.
    pub fn select(&self, fingerprint: &Fingerprint) -> Result<Vec<f64>, FeatureError> {
        if fingerprint.len() != self.width {
            return Err(FeatureError::WidthMismatch {
                expected: self.width,
                actual: fingerprint.len(),
            });
        }
        let bits = fingerprint.as_slice();
        Ok(self.indices.iter().map(|&index| bits[index] as f64).collect())
    }

    pub fn select_all<'a>(
        &self,
        fingerprints: impl IntoIterator<Item = &'a Fingerprint>,
    ) -> Result<FeatureMatrix, FeatureError> {
        let mut matrix = FeatureMatrix::new(self.schema.columns().to_vec());
        for fingerprint in fingerprints {
            matrix.push_row(self.select(fingerprint)?);
        }
        Ok(matrix)
    }
}

/// One-off selection by column identifiers, for callers without a prepared selector.
pub fn select(fingerprint: &Fingerprint, keep: &[String]) -> Result<Vec<f64>, FeatureError> {
    FeatureSelector::new(FeatureSchema::new(keep.to_vec()), fingerprint.len())?.select(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;

    fn labels(indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| column_label(i)).collect()
    }

    #[test]
    fn test_reference_columns_drop_label() {
        let schema = FeatureSchema::from_reference_columns(vec![
            "3".to_string(),
            "17".to_string(),
            "pIC50".to_string(),
        ])
        .unwrap();
        assert_eq!(schema.columns(), &["3".to_string(), "17".to_string()]);
        assert_eq!(schema.label(), Some("pIC50"));

        assert_eq!(
            FeatureSchema::from_reference_columns(vec!["pIC50".to_string()]),
            Err(FeatureError::EmptySchema)
        );
    }

    #[test]
    fn test_select_keeps_order_and_length() {
        let fingerprint = encode("CCN(CC)CC");
        let keep = labels(&[1000, 2, 512, 2, 0]);
        let selected = select(&fingerprint, &keep).unwrap();
        assert_eq!(selected.len(), keep.len());
        for (value, index) in selected.iter().zip([1000, 2, 512, 2, 0]) {
            assert_eq!(*value, fingerprint.get(index).unwrap() as f64);
        }
        assert!(select(&fingerprint, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_column_fails_loudly() {
        let fingerprint = encode("CCO");
        let err = select(&fingerprint, &labels(&[1, 1024])).unwrap_err();
        assert_eq!(
            err,
            FeatureError::SchemaMismatch {
                missing: vec!["1024".to_string()],
                width: 1024
            }
        );
        assert!(select(&fingerprint, &["pIC50".to_string()]).is_err());
        // Labels are exact strings, "007" is not column 7.
        assert!(select(&fingerprint, &["007".to_string()]).is_err());
    }

    #[test]
    fn test_width_mismatch() {
        let selector = FeatureSelector::new(FeatureSchema::new(labels(&[0, 1])), 1024).unwrap();
        let narrow = crate::Fingerprint::zeros(8);
        assert_eq!(
            selector.select(&narrow),
            Err(FeatureError::WidthMismatch {
                expected: 1024,
                actual: 8
            })
        );
    }

    #[test]
    fn test_select_all() {
        let selector = FeatureSelector::new(FeatureSchema::new(labels(&[5, 9, 33])), 1024).unwrap();
        let fingerprints = vec![encode("CCO"), encode("CCCC")];
        let matrix = selector.select_all(&fingerprints).unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.width(), 3);
        assert_eq!(matrix.columns(), selector.schema().columns());
        assert_eq!(selector.indices(), &[5, 9, 33]);
    }
}
