use serde::{Deserialize, Serialize};

use super::{ModelError, Regressor};

/// One node of a regression tree. Splits send `x[feature] <= threshold` left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A regression tree stored as a flat node array rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn validate(&self, tree: usize, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid(format!("tree {tree} has no nodes")));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= n_features {
                    return Err(ModelError::Invalid(format!(
                        "tree {tree} node {index} splits on feature {feature}, model has {n_features}"
                    )));
                }
                // Children always come later in the array, which also rules out cycles.
                for child in [left, right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(ModelError::Invalid(format!(
                            "tree {tree} node {index} points at invalid child {child}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Averages the predictions of its trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<RegressionTree>,
}

impl Regressor for RandomForest {
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("random forest has no trees".to_string()));
        }
        for (tree, estimator) in self.trees.iter().enumerate() {
            estimator.validate(tree, n_features)?;
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    fn describe(&self) -> String {
        format!("random forest with {} trees", self.trees.len())
    }
}
