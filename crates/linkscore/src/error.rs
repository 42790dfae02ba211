//! Construction-time errors.
//!
//! Scoring itself never fails: bad input degrades to the unclassified score.
//! These errors surface only while loading models and configuration.

use thiserror::Error;

// ── Model ───────────────────────────────────────────────────────────

/// A single decision tree failed structural validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("tree has no nodes")]
    Empty,
    #[error("node {node} references missing child {child}")]
    MissingChild { node: usize, child: i64 },
    #[error("node {node} splits on feature {feature}, only {limit} features exist")]
    FeatureOutOfRange {
        node: usize,
        feature: i64,
        limit: usize,
    },
    #[error("node {node} has non-finite split threshold")]
    NonFiniteThreshold { node: usize },
    #[error("leaf {node} has probability {probability} outside [0, 1]")]
    ProbabilityOutOfRange { node: usize, probability: f64 },
    #[error("node {node} is reachable twice (cycle or shared subtree)")]
    Cycle { node: usize },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("normalization table needs {expected} entries, got {actual}")]
    NormalizationLength { expected: usize, actual: usize },
    #[error("normalization mean for feature {index} is not finite")]
    NonFiniteMean { index: usize },
    #[error("normalization std for feature {index} must be finite and non-zero, got {value}")]
    InvalidStd { index: usize, value: f64 },
    #[error("invalid tree {index}: {source}")]
    InvalidTree {
        index: usize,
        #[source]
        source: TreeError,
    },
    #[error("invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
