//! # Usability Classifier
//!
//! Decision trees, the ensemble that combines them, and loading of trained
//! model bundles.
//!
//! The ensemble outputs the probability that the link is about to become
//! unusable. Scorers turn that into a score with `100 * (1 - p)`.

pub mod bundle;
pub mod ensemble;
pub mod tree;

use std::fmt;
use std::sync::Arc;

pub use bundle::{ModelBundle, RawNode, RawTree};
pub use ensemble::{Aggregation, TreeEnsemble};
pub use tree::{DecisionTree, TreeNode};

use crate::features::NormalizationTable;

/// Classifier family a bundle was trained as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    LogisticRegression,
    RandomForest,
    Other(u32),
}

impl From<u32> for ModelId {
    fn from(id: u32) -> Self {
        match id {
            1 => ModelId::LogisticRegression,
            7 => ModelId::RandomForest,
            other => ModelId::Other(other),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelId::LogisticRegression => write!(f, "logistic-regression(1)"),
            ModelId::RandomForest => write!(f, "random-forest(7)"),
            ModelId::Other(id) => write!(f, "unknown({id})"),
        }
    }
}

/// A validated classifier ready to share between scorers.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub id: ModelId,
    pub ensemble: Arc<TreeEnsemble>,
    pub normalization: Arc<NormalizationTable>,
}

impl LoadedModel {
    pub fn new(ensemble: TreeEnsemble, normalization: NormalizationTable) -> Self {
        LoadedModel {
            id: ModelId::RandomForest,
            ensemble: Arc::new(ensemble),
            normalization: Arc::new(normalization),
        }
    }
}

/// Build the classifier for `model_id` from `bundle`.
///
/// Only random forests are supported. Anything else, or a bundle that fails
/// validation, is logged and yields `None`.
pub fn load_classifier(model_id: impl Into<ModelId>, bundle: &ModelBundle) -> Option<LoadedModel> {
    let id = model_id.into();
    match id {
        ModelId::RandomForest => match bundle.build() {
            Ok((ensemble, normalization)) => {
                tracing::debug!(
                    model = %id,
                    trees = ensemble.len(),
                    aggregation = ?ensemble.aggregation(),
                    "classifier loaded"
                );
                Some(LoadedModel {
                    id,
                    ensemble: Arc::new(ensemble),
                    normalization: Arc::new(normalization),
                })
            }
            Err(e) => {
                tracing::error!(model = %id, error = %e, "invalid model bundle");
                None
            }
        },
        ModelId::LogisticRegression | ModelId::Other(_) => {
            tracing::error!(model = %id, "unsupported classifier");
            None
        }
    }
}
