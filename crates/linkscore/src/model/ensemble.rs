//! Tree ensemble and its aggregation rule.

use serde::{Deserialize, Serialize};

use super::tree::DecisionTree;
use crate::features::FeatureVector;

/// How per-tree leaf probabilities combine into one probability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Average leaf probability.
    #[default]
    Mean,
    /// Fraction of trees whose leaf probability exceeds 0.5.
    MajorityVote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    trees: Vec<DecisionTree>,
    aggregation: Aggregation,
}

impl TreeEnsemble {
    pub fn new(trees: Vec<DecisionTree>, aggregation: Aggregation) -> Self {
        TreeEnsemble { trees, aggregation }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Positive-class probability in `[0, 1]`, or `None` with no trees.
    pub fn predict_probability(&self, features: &[f64]) -> Option<f64> {
        if self.trees.is_empty() {
            return None;
        }
        let n = self.trees.len() as f64;
        let leaves = self.trees.iter().map(|t| t.predict_probability(features));
        let p = match self.aggregation {
            Aggregation::Mean => leaves.sum::<f64>() / n,
            Aggregation::MajorityVote => leaves.filter(|p| *p > 0.5).count() as f64 / n,
        };
        Some(p)
    }

    /// Usability score `100 * (1 - p)`, or `None` with no trees.
    pub fn predict(&self, features: &FeatureVector) -> Option<f64> {
        self.predict_probability(features.as_slice())
            .map(|p| 100.0 * (1.0 - p))
    }
}
