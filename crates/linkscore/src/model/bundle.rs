//! JSON model bundle: the wire form of an ensemble plus its normalization
//! statistics.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use super::ensemble::{Aggregation, TreeEnsemble};
use super::tree::{DecisionTree, TreeNode};
use crate::error::{ModelError, TreeError};
use crate::features::NormalizationTable;

/// "No child" / "no feature" sentinel in the wire form.
pub const NONEXISTENT_NODE: i64 = -1;

/// One node as exported by the training pipeline. A node whose left child
/// is [`NONEXISTENT_NODE`] is a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawNode {
    pub split_feature: i64,
    pub split_threshold: f64,
    pub left_child: i64,
    pub right_child: i64,
    pub positive_probability: f64,
}

impl Default for RawNode {
    fn default() -> Self {
        RawNode {
            split_feature: NONEXISTENT_NODE,
            split_threshold: 0.0,
            left_child: NONEXISTENT_NODE,
            right_child: NONEXISTENT_NODE,
            positive_probability: 0.0,
        }
    }
}

impl RawNode {
    pub fn leaf(probability: f64) -> Self {
        RawNode {
            positive_probability: probability,
            ..Default::default()
        }
    }

    pub fn split(feature: i64, threshold: f64, left: i64, right: i64) -> Self {
        RawNode {
            split_feature: feature,
            split_threshold: threshold,
            left_child: left,
            right_child: right,
            positive_probability: 0.0,
        }
    }

    fn to_node(&self, index: usize) -> Result<TreeNode, TreeError> {
        if self.left_child == NONEXISTENT_NODE {
            return Ok(TreeNode::Leaf {
                probability: self.positive_probability,
            });
        }
        let child = |c: i64| {
            usize::try_from(c).map_err(|_| TreeError::MissingChild {
                node: index,
                child: c,
            })
        };
        let feature =
            usize::try_from(self.split_feature).map_err(|_| TreeError::FeatureOutOfRange {
                node: index,
                feature: self.split_feature,
                limit: crate::features::FEATURE_VECTOR_LEN,
            })?;
        Ok(TreeNode::Split {
            feature,
            threshold: self.split_threshold,
            left: child(self.left_child)?,
            right: child(self.right_child)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTree {
    pub nodes: Vec<RawNode>,
}

impl RawTree {
    pub fn to_tree(&self) -> Result<DecisionTree, TreeError> {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| n.to_node(i))
            .collect::<Result<Vec<_>, _>>()?;
        DecisionTree::new(nodes)
    }
}

/// Everything needed to run one classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub decision_trees: Vec<RawTree>,
    #[serde(default)]
    pub aggregation: Aggregation,
    pub feature_norm_means: Vec<f64>,
    pub feature_norm_stds: Vec<f64>,
}

impl ModelBundle {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading model bundle {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("parsing model bundle {}", path.display()))
    }

    /// Validate and convert into runtime structures.
    pub fn build(&self) -> Result<(TreeEnsemble, NormalizationTable), ModelError> {
        let norm = NormalizationTable::new(
            self.feature_norm_means.clone(),
            self.feature_norm_stds.clone(),
        )?;
        let trees = self
            .decision_trees
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                raw.to_tree()
                    .map_err(|source| ModelError::InvalidTree { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((TreeEnsemble::new(trees, self.aggregation), norm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_json(trees: &str) -> String {
        let means = vec!["0.0"; 45].join(",");
        let stds = vec!["1.0"; 45].join(",");
        format!(
            r#"{{"decision_trees": {trees}, "aggregation": "majority_vote",
                "feature_norm_means": [{means}], "feature_norm_stds": [{stds}]}}"#
        )
    }

    #[test]
    fn parses_sentinel_wire_form() {
        let json = bundle_json(
            r#"[{"nodes": [
                {"split_feature": 2, "split_threshold": -0.5, "left_child": 1, "right_child": 2},
                {"left_child": -1, "positive_probability": 0.8},
                {"positive_probability": 0.1}
            ]}]"#,
        );
        let bundle = ModelBundle::from_json_str(&json).unwrap();
        assert_eq!(bundle.aggregation, Aggregation::MajorityVote);

        let (ensemble, norm) = bundle.build().unwrap();
        assert_eq!(ensemble.len(), 1);
        assert_eq!(norm.means().len(), 45);

        let mut x = [0.0; 45];
        x[2] = -1.0;
        assert_eq!(ensemble.predict_probability(&x), Some(1.0));
        x[2] = 0.0;
        assert_eq!(ensemble.predict_probability(&x), Some(0.0));
    }

    #[test]
    fn aggregation_defaults_to_mean() {
        let json = format!(
            r#"{{"decision_trees": [], "feature_norm_means": [{}], "feature_norm_stds": [{}]}}"#,
            vec!["0"; 45].join(","),
            vec!["1"; 45].join(",")
        );
        let bundle = ModelBundle::from_json_str(&json).unwrap();
        assert_eq!(bundle.aggregation, Aggregation::Mean);
    }

    #[test]
    fn negative_child_is_rejected() {
        let json = bundle_json(
            r#"[{"nodes": [{"split_feature": 0, "left_child": 1, "right_child": -1},
                          {"positive_probability": 0.5}]}]"#,
        );
        let err = ModelBundle::from_json_str(&json).unwrap().build().unwrap_err();
        match err {
            ModelError::InvalidTree { index, source } => {
                assert_eq!(index, 0);
                assert_eq!(source, TreeError::MissingChild { node: 0, child: -1 });
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn negative_feature_is_rejected() {
        let tree = RawTree {
            nodes: vec![RawNode::split(-3, 0.0, 1, 2), RawNode::leaf(0.1), RawNode::leaf(0.9)],
        };
        assert!(matches!(
            tree.to_tree(),
            Err(TreeError::FeatureOutOfRange { feature: -3, .. })
        ));
    }

    #[test]
    fn bad_normalization_is_rejected() {
        let bundle = ModelBundle {
            decision_trees: Vec::new(),
            aggregation: Aggregation::Mean,
            feature_norm_means: vec![0.0; 15],
            feature_norm_stds: vec![1.0; 45],
        };
        assert!(matches!(
            bundle.build(),
            Err(ModelError::NormalizationLength { actual: 15, .. })
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            ModelBundle::from_json_str("{\"decision_trees\": 3}"),
            Err(ModelError::Json(_))
        ));
    }

    #[test]
    fn missing_file_has_context() {
        let err = ModelBundle::from_json_file("/nonexistent/linkscore/model.json").unwrap_err();
        assert!(format!("{err:#}").contains("reading model bundle"));
    }
}
