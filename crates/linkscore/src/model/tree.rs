//! Binary decision tree over the standardised feature vector.

use crate::error::TreeError;
use crate::features::FEATURE_VECTOR_LEN;

/// Node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Probability of the positive (link unusable) class.
    Leaf { probability: f64 },
    /// Go `left` when `features[feature] <= threshold`, otherwise `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Validates indices, features, thresholds and probabilities, and that
    /// every node is reachable from the root at most once. The latter makes
    /// traversal terminate.
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, TreeError> {
        if nodes.is_empty() {
            return Err(TreeError::Empty);
        }
        for (i, node) in nodes.iter().enumerate() {
            match *node {
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(&probability) {
                        return Err(TreeError::ProbabilityOutOfRange {
                            node: i,
                            probability,
                        });
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_VECTOR_LEN {
                        return Err(TreeError::FeatureOutOfRange {
                            node: i,
                            feature: feature as i64,
                            limit: FEATURE_VECTOR_LEN,
                        });
                    }
                    if !threshold.is_finite() {
                        return Err(TreeError::NonFiniteThreshold { node: i });
                    }
                    for child in [left, right] {
                        if child >= nodes.len() {
                            return Err(TreeError::MissingChild {
                                node: i,
                                child: child as i64,
                            });
                        }
                    }
                }
            }
        }

        let mut seen = vec![false; nodes.len()];
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut seen[i], true) {
                return Err(TreeError::Cycle { node: i });
            }
            if let TreeNode::Split { left, right, .. } = nodes[i] {
                stack.push(right);
                stack.push(left);
            }
        }

        Ok(DecisionTree { nodes })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Leaf probability for `features`. A feature missing from the slice
    /// compares as `NaN` and therefore goes right.
    pub fn predict_probability(&self, features: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                TreeNode::Leaf { probability } => return probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = features.get(feature).copied().unwrap_or(f64::NAN);
                    i = if v <= threshold { left } else { right };
                }
            }
        }
    }
}
