//! # Model-Driven Scorer
//!
//! Runs the full pipeline for one connection:
//!
//! ```text
//! sample ─► window gate ─► DerivedSample ─► FeatureExtractor ─► TreeEnsemble
//!                                                                  │
//!             ScoreResult ◄─ HysteresisController ◄─ bad-link override
//! ```
//!
//! Only primary connections are scored. A secondary connection reports the
//! unclassified score and leaves the window untouched.

use std::sync::Arc;

use crate::UNCLASSIFIED_SCORE;
use crate::config::{DerivationConfig, LinkQualityConfig, ScorerConfig};
use crate::derived::DerivedSample;
use crate::features::{FeatureExtractor, NormalizationTable};
use crate::hysteresis::{HysteresisController, ScoringState};
use crate::model::LoadedModel;
use crate::result::ScoreResult;
use crate::sample::{LinkIdentity, TelemetrySample};
use crate::window::{Continuity, SampleWindow};

#[derive(Debug, Clone)]
pub struct MlScorer {
    model: Option<LoadedModel>,
    extractor: FeatureExtractor,
    window: SampleWindow,
    hysteresis: HysteresisController,
    derivation: DerivationConfig,
    link_quality: LinkQualityConfig,
    last_identity: Option<LinkIdentity>,
}

impl MlScorer {
    /// Without a model every sample is unclassified.
    pub fn new(cfg: &ScorerConfig, model: Option<LoadedModel>) -> Self {
        let norm = model
            .as_ref()
            .map(|m| Arc::clone(&m.normalization))
            .unwrap_or_else(|| Arc::new(NormalizationTable::identity()));
        MlScorer {
            model,
            extractor: FeatureExtractor::new(norm),
            window: SampleWindow::new(cfg.window.max_gap_ms()),
            hysteresis: HysteresisController::new(cfg.hysteresis.clone()),
            derivation: cfg.derivation.clone(),
            link_quality: cfg.link_quality.clone(),
            last_identity: None,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn state(&self) -> &ScoringState {
        self.hysteresis.state()
    }

    /// Whether this interval alone proves the link bad: very low rssi, or
    /// weak rssi with a burst of tx failures dwarfing the successes.
    fn is_link_quality_bad(&self, derived: &DerivedSample, rssi: i32) -> bool {
        let q = &self.link_quality;
        if rssi <= q.low_rssi_dbm {
            return true;
        }
        derived.tx_bad_diff * q.tx_success_to_bad_ratio >= derived.tx_success_diff
            && rssi <= self.hysteresis.config().breach_rssi_dbm
            && derived.tx_bad_diff >= q.tx_bad_threshold
    }

    /// Update the window with `sample` and return the raw model score, or
    /// [`UNCLASSIFIED_SCORE`].
    pub fn score(&mut self, sample: &TelemetrySample, is_same_identity: bool) -> f64 {
        let continuity = self.window.continuity(sample);
        let gap_too_large = continuity == Continuity::Stale;
        if !is_same_identity || continuity != Continuity::Continuous {
            if !self.window.is_empty() {
                tracing::debug!(
                    link = %sample.identity,
                    ?continuity,
                    is_same_identity,
                    dropped = self.window.len(),
                    "clearing sample window"
                );
            }
            self.window.clear();
        }

        let norm = self.extractor.normalization();
        let derived = match self.window.last() {
            Some(prev) => DerivedSample::from_interval(sample, prev.sample(), norm, &self.derivation),
            None => DerivedSample::without_history(sample, norm),
        };
        let bad = sample
            .rssi()
            .is_some_and(|rssi| self.is_link_quality_bad(&derived, rssi));
        self.window.push(derived);

        if !self.window.is_ready() {
            return UNCLASSIFIED_SCORE;
        }
        let Some(model) = &self.model else {
            return UNCLASSIFIED_SCORE;
        };
        let Some(raw) = self
            .extractor
            .extract(&self.window)
            .and_then(|fv| model.ensemble.predict(&fv))
        else {
            return UNCLASSIFIED_SCORE;
        };

        if !gap_too_large && bad {
            let clamped = self.hysteresis.config().threshold - 1.0;
            tracing::debug!(
                link = %sample.identity,
                raw,
                clamped,
                rssi = sample.rssi_dbm,
                "link already bad, overriding model score"
            );
            return clamped;
        }
        raw
    }

    /// Scale `raw` through the hysteresis controller with the configured
    /// threshold and margin.
    pub fn adjust(&mut self, raw: f64, is_same_identity: bool, rssi: Option<i32>, now_ms: u64) -> f64 {
        let cfg = self.hysteresis.config();
        let (threshold, margin) = (cfg.threshold, cfg.threshold_hysteresis);
        self.hysteresis
            .adjust(raw, is_same_identity, rssi, threshold, margin, now_ms)
    }

    /// Weak signal combined with a slow link, worth a reachability probe
    /// even when the model is not worried.
    fn is_weak_and_slow(&self, sample: &TelemetrySample) -> bool {
        let Some(rssi) = sample.rssi() else {
            return false;
        };
        let q = &self.link_quality;
        let h = self.hysteresis.config();
        let slow = |limit: i32| {
            [sample.tx_link_speed_mbps, sample.rx_link_speed_mbps]
                .iter()
                .any(|&s| s > 0 && s <= limit)
        };
        (rssi <= h.no_hysteresis_rssi_dbm && slow(q.link_speed_low_mbps))
            || (rssi < h.breach_rssi_dbm && slow(q.link_speed_very_low_mbps))
    }

    pub fn generate_score_result(
        &mut self,
        sample: &TelemetrySample,
        now_ms: u64,
        is_primary: bool,
    ) -> ScoreResult {
        let is_same_identity = self
            .last_identity
            .as_ref()
            .is_none_or(|last| *last == sample.identity);
        self.last_identity = Some(sample.identity.clone());

        let raw = if is_primary {
            self.score(sample, is_same_identity)
        } else {
            UNCLASSIFIED_SCORE
        };

        let mut adjusted = UNCLASSIFIED_SCORE;
        let mut should_check_reachability = false;
        if raw != UNCLASSIFIED_SCORE {
            adjusted = self.adjust(raw, is_same_identity, sample.rssi(), now_ms);
            should_check_reachability = raw < self.hysteresis.config().transition_score
                || self.is_weak_and_slow(sample);
        }

        ScoreResult {
            score: raw as i32,
            adjusted_score: adjusted as i32,
            is_link_usable: self.hysteresis.recommend_default_network(),
            should_trigger_scan: self.hysteresis.should_trigger_scan(),
            should_check_reachability,
            should_block_access_point: self.hysteresis.should_block_access_point(),
        }
    }

    /// Forget the connection: window, decision state and last identity.
    pub fn reset(&mut self) {
        self.window.clear();
        self.hysteresis.reset();
        self.last_identity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Aggregation, DecisionTree, TreeEnsemble, TreeNode};
    use crate::sample::{Bssid, LinkCounters};

    /// One-leaf ensemble: always predicts `p`.
    fn constant_model(p: f64) -> LoadedModel {
        let tree = DecisionTree::new(vec![TreeNode::Leaf { probability: p }]).unwrap();
        LoadedModel::new(
            TreeEnsemble::new(vec![tree], Aggregation::Mean),
            NormalizationTable::identity(),
        )
    }

    fn sample(t: u64, rssi: i32, bssid: u8) -> TelemetrySample {
        TelemetrySample {
            timestamp_ms: t,
            identity: LinkIdentity::new(Bssid([0, 0, 0, 0, 0, bssid]), 5180),
            rssi_dbm: rssi,
            tx_link_speed_mbps: 120,
            rx_link_speed_mbps: 120,
            counters: LinkCounters {
                tx_success: t / 100,
                rx_success: t / 100,
                ..Default::default()
            },
        }
    }

    fn scorer(p: f64) -> MlScorer {
        MlScorer::new(&ScorerConfig::default(), Some(constant_model(p)))
    }

    // ─── Window handling ────────────────────────────────────────────────

    #[test]
    fn window_caps_at_five() {
        let mut s = scorer(0.5);
        for i in 0..8 {
            s.score(&sample(i * 3_000, -60, 1), true);
        }
        assert_eq!(s.window().len(), 5);
    }

    #[test]
    fn identity_change_clears_window() {
        let mut s = scorer(0.5);
        for i in 0..4 {
            s.score(&sample(i * 3_000, -60, 1), true);
        }
        s.score(&sample(12_000, -60, 2), false);
        assert_eq!(s.window().len(), 1);
    }

    #[test]
    fn stale_gap_clears_window() {
        let mut s = scorer(0.5);
        for i in 0..4 {
            s.score(&sample(i * 3_000, -60, 1), true);
        }
        s.score(&sample(9_000 + 6_001, -60, 1), true);
        assert_eq!(s.window().len(), 1);
    }

    // ─── Raw scores ─────────────────────────────────────────────────────

    #[test]
    fn score_is_inverse_probability() {
        let mut s = scorer(0.25);
        assert_eq!(s.score(&sample(0, -60, 1), true), 75.0);
    }

    #[test]
    fn no_model_is_unclassified() {
        let mut s = MlScorer::new(&ScorerConfig::default(), None);
        assert_eq!(s.score(&sample(0, -60, 1), true), UNCLASSIFIED_SCORE);
        assert_eq!(s.window().len(), 1);
        let r = s.generate_score_result(&sample(3_000, -60, 1), 3_000, true);
        assert_eq!(r.score, -1);
        assert_eq!(r.adjusted_score, -1);
        assert!(r.is_link_usable);
        assert!(!r.should_check_reachability);
    }

    #[test]
    fn very_low_rssi_overrides_score() {
        let mut s = scorer(0.0);
        s.score(&sample(0, -60, 1), true);
        assert_eq!(s.score(&sample(3_000, -86, 1), true), 9.0);
    }

    #[test]
    fn tx_failures_override_score() {
        let mut s = scorer(0.0);
        let mut a = sample(0, -70, 1);
        s.score(&a, true);
        a.timestamp_ms = 3_000;
        a.counters.tx_success += 100;
        a.counters.tx_bad += 1_000;
        assert_eq!(s.score(&a, true), 9.0);
    }

    #[test]
    fn override_skipped_after_gap() {
        let mut s = scorer(0.0);
        s.score(&sample(0, -60, 1), true);
        assert_eq!(s.score(&sample(10_000, -90, 1), true), 100.0);
    }

    #[test]
    fn invalid_rssi_does_not_override() {
        let mut s = scorer(0.0);
        s.score(&sample(0, -60, 1), true);
        let r = s.score(&sample(3_000, crate::sample::INVALID_RSSI_DBM, 1), true);
        assert_eq!(r, 100.0);
    }

    // ─── Score results ──────────────────────────────────────────────────

    #[test]
    fn secondary_link_is_not_scored() {
        let mut s = scorer(0.5);
        let r = s.generate_score_result(&sample(0, -60, 1), 0, false);
        assert_eq!(r.score, -1);
        assert_eq!(r.adjusted_score, -1);
        assert!(r.is_link_usable);
        assert!(s.window().is_empty());
    }

    #[test]
    fn healthy_link_result() {
        let mut s = scorer(0.1);
        let r = s.generate_score_result(&sample(0, -60, 1), 0, true);
        assert_eq!(r.score, 90);
        assert_eq!(r.adjusted_score, 100);
        assert!(r.is_link_usable);
        assert!(!r.should_check_reachability);
        assert!(!r.should_block_access_point);
    }

    #[test]
    fn low_raw_score_requests_probe() {
        let mut s = scorer(0.95);
        let r = s.generate_score_result(&sample(0, -60, 1), 0, true);
        assert_eq!(r.score, 5);
        assert!(r.should_check_reachability);
        assert!(r.should_trigger_scan);
    }

    #[test]
    fn weak_slow_link_requests_probe() {
        let mut s = scorer(0.1);
        let mut a = sample(0, -82, 1);
        a.tx_link_speed_mbps = 12;
        assert!(s.generate_score_result(&a, 0, true).should_check_reachability);

        let mut s = scorer(0.1);
        let mut b = sample(0, -70, 1);
        b.rx_link_speed_mbps = 6;
        assert!(s.generate_score_result(&b, 0, true).should_check_reachability);

        let mut s = scorer(0.1);
        let mut c = sample(0, -70, 1);
        c.rx_link_speed_mbps = 12;
        assert!(!s.generate_score_result(&c, 0, true).should_check_reachability);
    }

    #[test]
    fn roam_keeps_link_usable() {
        let mut s = scorer(0.95);
        s.generate_score_result(&sample(0, -75, 1), 0, true);
        let r = s.generate_score_result(&sample(3_000, -75, 2), 3_000, true);
        assert_eq!(r.adjusted_score, 100);
        assert!(r.is_link_usable);
    }

    #[test]
    fn reset_forgets_connection() {
        let mut s = scorer(0.5);
        for i in 0..3 {
            s.generate_score_result(&sample(i * 3_000, -60, 1), i * 3_000, true);
        }
        s.reset();
        assert!(s.window().is_empty());
        assert_eq!(s.state(), &ScoringState::default());
    }
}
