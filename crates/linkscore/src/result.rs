//! Scorer output and the common scorer interface.

use serde::Serialize;

use crate::config::{ScorerConfig, ScorerKind};
use crate::ml::MlScorer;
use crate::model::{ModelBundle, load_classifier};
use crate::sample::TelemetrySample;
use crate::velocity::VelocityScorer;

/// What the scorer recommends after one telemetry sample. The caller owns
/// the actuators; nothing here is acted upon by the scorer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    /// Raw score, `-1` when unclassified.
    pub score: i32,
    /// Score after scaling and hysteresis, `-1` when unclassified.
    pub adjusted_score: i32,
    pub is_link_usable: bool,
    pub should_trigger_scan: bool,
    /// Probe next-hop reachability.
    pub should_check_reachability: bool,
    pub should_block_access_point: bool,
}

/// Scores one connection from a stream of telemetry samples.
///
/// Calls for a connection must be serialized; implementations own all
/// mutable state.
pub trait ConnectedScorer: Send {
    fn generate_score_result(
        &mut self,
        sample: &TelemetrySample,
        now_ms: u64,
        is_primary: bool,
    ) -> ScoreResult;

    /// Forget all per-connection history.
    fn reset(&mut self);

    fn name(&self) -> &'static str;
}

impl ConnectedScorer for MlScorer {
    fn generate_score_result(
        &mut self,
        sample: &TelemetrySample,
        now_ms: u64,
        is_primary: bool,
    ) -> ScoreResult {
        MlScorer::generate_score_result(self, sample, now_ms, is_primary)
    }

    fn reset(&mut self) {
        MlScorer::reset(self)
    }

    fn name(&self) -> &'static str {
        "ml"
    }
}

impl ConnectedScorer for VelocityScorer {
    fn generate_score_result(
        &mut self,
        sample: &TelemetrySample,
        now_ms: u64,
        is_primary: bool,
    ) -> ScoreResult {
        VelocityScorer::generate_score_result(self, sample, now_ms, is_primary)
    }

    fn reset(&mut self) {
        VelocityScorer::reset(self)
    }

    fn name(&self) -> &'static str {
        "velocity"
    }
}

/// The scorer chosen for a connection, fixed at construction.
#[derive(Debug, Clone)]
pub enum Scorer {
    Ml(Box<MlScorer>),
    Velocity(VelocityScorer),
}

impl Scorer {
    /// Build the scorer `cfg.kind` asks for. An ML selection whose model is
    /// missing or fails to load falls back to the velocity scorer.
    pub fn from_config(cfg: &ScorerConfig, bundle: Option<&ModelBundle>) -> Self {
        match cfg.kind {
            ScorerKind::Velocity => Scorer::Velocity(VelocityScorer::new(cfg.velocity.clone())),
            ScorerKind::Ml => {
                let model = bundle.and_then(|b| load_classifier(cfg.model_id, b));
                match model {
                    Some(model) => Scorer::Ml(Box::new(MlScorer::new(cfg, Some(model)))),
                    None => {
                        tracing::warn!(
                            model_id = cfg.model_id,
                            bundle_present = bundle.is_some(),
                            "classifier unavailable, falling back to velocity scorer"
                        );
                        Scorer::Velocity(VelocityScorer::new(cfg.velocity.clone()))
                    }
                }
            }
        }
    }

    pub fn kind(&self) -> ScorerKind {
        match self {
            Scorer::Ml(_) => ScorerKind::Ml,
            Scorer::Velocity(_) => ScorerKind::Velocity,
        }
    }
}

impl ConnectedScorer for Scorer {
    fn generate_score_result(
        &mut self,
        sample: &TelemetrySample,
        now_ms: u64,
        is_primary: bool,
    ) -> ScoreResult {
        match self {
            Scorer::Ml(s) => s.generate_score_result(sample, now_ms, is_primary),
            Scorer::Velocity(s) => s.generate_score_result(sample, now_ms, is_primary),
        }
    }

    fn reset(&mut self) {
        match self {
            Scorer::Ml(s) => s.reset(),
            Scorer::Velocity(s) => s.reset(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Scorer::Ml(s) => ConnectedScorer::name(s.as_ref()),
            Scorer::Velocity(s) => ConnectedScorer::name(s),
        }
    }
}
