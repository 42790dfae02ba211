//! # Feature Extraction
//!
//! Summarises a [`SampleWindow`] into the 45-value vector the tree ensemble
//! consumes: the last sample, the window mean and the window standard
//! deviation of each of the 15 per-sample features, standardised against the
//! global training statistics in a [`NormalizationTable`].

use std::sync::Arc;

use crate::derived::{Feature, NUM_FEATURES};
use crate::error::ModelError;
use crate::window::SampleWindow;

/// `[last, mean, std]` per feature.
pub const FEATURE_VECTOR_LEN: usize = 3 * NUM_FEATURES;

/// Global training statistics, one (mean, std) pair per vector slot.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationTable {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl NormalizationTable {
    /// Both arrays must hold [`FEATURE_VECTOR_LEN`] finite values and every
    /// std must be non-zero.
    pub fn new(means: Vec<f64>, stds: Vec<f64>) -> Result<Self, ModelError> {
        for actual in [means.len(), stds.len()] {
            if actual != FEATURE_VECTOR_LEN {
                return Err(ModelError::NormalizationLength {
                    expected: FEATURE_VECTOR_LEN,
                    actual,
                });
            }
        }
        if let Some(index) = means.iter().position(|m| !m.is_finite()) {
            return Err(ModelError::NonFiniteMean { index });
        }
        if let Some((index, &value)) = stds
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_finite() || **s == 0.0)
        {
            return Err(ModelError::InvalidStd { index, value });
        }
        Ok(NormalizationTable { means, stds })
    }

    /// Zero means, unit stds: extraction output equals the raw summary.
    pub fn identity() -> Self {
        NormalizationTable {
            means: vec![0.0; FEATURE_VECTOR_LEN],
            stds: vec![1.0; FEATURE_VECTOR_LEN],
        }
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    /// Global mean of a per-sample feature (the "last" block).
    pub fn feature_mean(&self, feature: Feature) -> f64 {
        self.means[feature.index()]
    }

    fn standardize(&self, slot: usize, value: f64) -> f64 {
        (value - self.means[slot]) / self.stds[slot]
    }
}

/// Standardised classifier input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_VECTOR_LEN]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn last(&self) -> &[f64] {
        &self.0[..NUM_FEATURES]
    }

    pub fn mean(&self) -> &[f64] {
        &self.0[NUM_FEATURES..2 * NUM_FEATURES]
    }

    pub fn std(&self) -> &[f64] {
        &self.0[2 * NUM_FEATURES..]
    }
}

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    norm: Arc<NormalizationTable>,
}

impl FeatureExtractor {
    pub fn new(norm: Arc<NormalizationTable>) -> Self {
        FeatureExtractor { norm }
    }

    pub fn normalization(&self) -> &Arc<NormalizationTable> {
        &self.norm
    }

    /// Per-feature raw values, one row per window entry, oldest first.
    pub fn extract_rows(window: &SampleWindow) -> Vec<[f64; NUM_FEATURES]> {
        window.iter().map(|d| d.features()).collect()
    }

    /// `None` for an empty window. Never produces `NaN`.
    pub fn extract(&self, window: &SampleWindow) -> Option<FeatureVector> {
        let mut rows = Self::extract_rows(window);
        if rows.is_empty() {
            return None;
        }
        let n = rows.len() as f64;

        let mut means = [0.0; NUM_FEATURES];
        for (i, mean) in means.iter_mut().enumerate() {
            let (sum, count) = rows
                .iter()
                .map(|r| r[i])
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            *mean = if count == 0 {
                self.norm.feature_mean(Feature::ALL[i])
            } else {
                sum / count as f64
            };
        }

        // Impute
        for row in rows.iter_mut() {
            for (v, mean) in row.iter_mut().zip(means) {
                if v.is_nan() {
                    *v = mean;
                }
            }
        }

        let mut stds = [0.0; NUM_FEATURES];
        for (i, std) in stds.iter_mut().enumerate() {
            let var = rows.iter().map(|r| (r[i] - means[i]).powi(2)).sum::<f64>() / n;
            *std = var.sqrt();
        }

        let last = rows[rows.len() - 1];
        let mut out = [0.0; FEATURE_VECTOR_LEN];
        for i in 0..NUM_FEATURES {
            out[i] = last[i];
            out[NUM_FEATURES + i] = means[i];
            out[2 * NUM_FEATURES + i] = stds[i];
        }
        for (slot, v) in out.iter_mut().enumerate() {
            *v = self.norm.standardize(slot, *v);
        }
        Some(FeatureVector(out))
    }
}
