use serde::{Deserialize, Serialize};

use super::{ModelError, Regressor};

/// `intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl Regressor for LinearModel {
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.coefficients.len() != n_features {
            return Err(ModelError::Invalid(format!(
                "linear model has {} coefficients for {n_features} features",
                self.coefficients.len()
            )));
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(weight, value)| weight * value)
                .sum::<f64>()
    }

    fn describe(&self) -> String {
        format!("linear model over {} features", self.coefficients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_prediction() {
        let model = LinearModel {
            intercept: 5.0,
            coefficients: vec![0.5, -1.0],
        };
        model.validate(2).unwrap();
        assert!(model.validate(3).is_err());
        assert_eq!(model.predict_row(&[0.0, 0.0]), 5.0);
        assert_eq!(model.predict_row(&[1.0, 1.0]), 4.5);
    }
}
