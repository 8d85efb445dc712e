//! Plain-text rendering of tables and the prediction histogram.

use std::fmt::Write as _;

use crate::{MoleculeTable, PredictionTable, PREDICTION_COLUMN, SMILES_COLUMN};

fn render_rows(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };
    line(headers);
    line(&widths.iter().map(|&w| "-".repeat(w)).collect::<Vec<_>>());
    for row in rows {
        line(row);
    }
    out
}

/// The first `rows` rows of an uploaded table, all columns.
pub fn render_preview(table: &MoleculeTable, rows: usize) -> String {
    render_rows(table.headers(), table.head(rows).rows())
}

/// The results table: SMILES and predicted pIC50.
pub fn render_predictions(table: &PredictionTable) -> String {
    let headers = vec![SMILES_COLUMN.to_string(), PREDICTION_COLUMN.to_string()];
    let rows: Vec<Vec<String>> = table
        .records()
        .iter()
        .map(|record| vec![record.smiles.clone(), format!("{:.4}", record.prediction)])
        .collect();
    render_rows(&headers, &rows)
}

/// Equal-width bins over the range of the values.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    min: f64,
    max: f64,
    counts: Vec<usize>,
}

impl Histogram {
    /// `None` when there are no finite values or no bins.
    pub fn new(values: &[f64], bins: usize) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() || bins == 0 {
            return None;
        }
        let mut min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let mut max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min == max {
            min -= 0.5;
            max += 0.5;
        }

        let width = (max - min) / bins as f64;
        let mut counts = vec![0; bins];
        for value in finite {
            let bin = (((value - min) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Some(Self { min, max, counts })
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `bins + 1` bin boundaries from min to max.
    pub fn edges(&self) -> Vec<f64> {
        let width = (self.max - self.min) / self.bins() as f64;
        (0..=self.bins())
            .map(|i| self.min + width * i as f64)
            .collect()
    }

    /// One line per bin, bars scaled so the fullest bin is `bar_width` long.
    pub fn render(&self, bar_width: usize) -> String {
        let peak = self.counts.iter().copied().max().unwrap_or(0).max(1);
        let edges = self.edges();
        let mut out = String::new();
        for (i, &count) in self.counts.iter().enumerate() {
            let bar = "#".repeat(count * bar_width / peak);
            let _ = writeln!(
                out,
                "{:>7.3} - {:>7.3} | {bar:<bar_width$} {count}",
                edges[i],
                edges[i + 1]
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PredictionRecord;

    #[test]
    fn test_histogram_counts_sum_to_rows() {
        let values = [4.2, 4.3, 5.0, 5.1, 5.9, 6.8, 6.8];
        let histogram = Histogram::new(&values, 4).unwrap();
        assert_eq!(histogram.bins(), 4);
        assert_eq!(histogram.total(), values.len());
        assert_eq!(histogram.counts(), &[2, 2, 1, 2]);

        let edges = histogram.edges();
        assert_eq!(edges.len(), 5);
        assert_eq!(edges[0], 4.2);
        assert!((edges[4] - 6.8).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_edge_cases() {
        assert!(Histogram::new(&[], 10).is_none());
        assert!(Histogram::new(&[1.0], 0).is_none());
        assert!(Histogram::new(&[f64::NAN], 3).is_none());

        let single = Histogram::new(&[5.0, 5.0, 5.0], 3).unwrap();
        assert_eq!(single.total(), 3);
        assert_eq!(single.counts(), &[0, 3, 0]);
    }

    #[test]
    fn test_histogram_render() {
        let histogram = Histogram::new(&[1.0, 2.0, 2.0], 2).unwrap();
        let text = histogram.render(10);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("#####"));
        assert!(lines[0].ends_with(" 1"));
        assert!(lines[1].contains("##########"));
        assert!(lines[1].ends_with(" 2"));
    }

    #[test]
    fn test_preview_is_truncated() {
        let table = MoleculeTable::from_reader(
            "SMILES,name\nCCO,ethanol\nCCCC,butane\nCC(=O)O,acetic acid\n".as_bytes(),
        )
        .unwrap();
        let preview = render_preview(&table, 2);
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "SMILES  name");
        assert_eq!(lines[1], "------  -------");
        assert_eq!(lines[2], "CCO     ethanol");
        assert!(!preview.contains("acetic"));
    }

    #[test]
    fn test_render_predictions() {
        let table = PredictionTable::new(vec![PredictionRecord {
            row: 0,
            smiles: "CCO".to_string(),
            prediction: 5.123456,
            zero_filled: false,
        }]);
        let text = render_predictions(&table);
        assert!(text.starts_with("SMILES  Predição_Bioatividade"));
        assert!(text.lines().nth(2).unwrap().ends_with("5.1235"));
    }
}
