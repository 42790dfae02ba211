//! # Hysteresis Decision Controller
//!
//! Maps the classifier's raw score onto the reporting scale and decides,
//! with hysteresis, whether to keep recommending the link, request a scan or
//! block the access point.
//!
//! A *breach* is a crossing of the transition score: downward only counts
//! while rssi is below the breach level. After a breach the usable
//! recommendation may only change once the debounce time has passed, unless
//! the score was already sliding (previous score below max-health) or the
//! signal is below the no-hysteresis floor.

use crate::UNCLASSIFIED_SCORE;
use crate::config::HysteresisConfig;

/// Decision state carried between samples of one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringState {
    pub prev_score: f64,
    pub prev_raw_score: f64,
    /// Time of the most recent breach, if any since reset.
    pub last_breach_ms: Option<u64>,
    /// Set by a downward breach from just above the transition score.
    pub trending_downward: bool,
    pub recommend_default_network: bool,
    pub block_current_ap: bool,
    /// Raw score just fell below the scan threshold.
    pub scan_threshold_breach: bool,
}

impl ScoringState {
    /// Fresh connection: full score, link recommended.
    pub fn new(max_score: f64) -> Self {
        ScoringState {
            prev_score: max_score,
            prev_raw_score: max_score,
            last_breach_ms: None,
            trending_downward: false,
            recommend_default_network: true,
            block_current_ap: false,
            scan_threshold_breach: false,
        }
    }
}

impl Default for ScoringState {
    fn default() -> Self {
        ScoringState::new(HysteresisConfig::default().max_score)
    }
}

#[derive(Debug, Clone)]
pub struct HysteresisController {
    cfg: HysteresisConfig,
    state: ScoringState,
}

impl HysteresisController {
    pub fn new(cfg: HysteresisConfig) -> Self {
        let state = ScoringState::new(cfg.max_score);
        HysteresisController { cfg, state }
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.cfg
    }

    pub fn state(&self) -> &ScoringState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = ScoringState::new(self.cfg.max_score);
    }

    pub fn recommend_default_network(&self) -> bool {
        self.state.recommend_default_network
    }

    pub fn should_block_access_point(&self) -> bool {
        self.state.block_current_ap
    }

    pub fn should_trigger_scan(&self) -> bool {
        self.state.scan_threshold_breach
    }

    fn scale(&self, raw: f64, threshold: f64) -> f64 {
        (self.cfg.transition_score / threshold * raw).min(self.cfg.max_score)
    }

    /// Scale `raw` and update the decision flags. Returns the adjusted score.
    ///
    /// `threshold` is the raw score that maps onto the transition score;
    /// `margin` is added to it while the previous score was below transition.
    /// Without a valid `rssi` only an upward breach is recorded; the
    /// downward breach, debounce and block rules are skipped.
    pub fn adjust(
        &mut self,
        raw: f64,
        is_same_identity: bool,
        rssi: Option<i32>,
        threshold: f64,
        margin: f64,
        now_ms: u64,
    ) -> f64 {
        let mut raw = raw;
        if !is_same_identity {
            self.reset();
            raw = self.cfg.max_score;
        }
        let transition = self.cfg.transition_score;
        let prev = self.state.prev_score;

        let mut threshold = threshold;
        if prev != UNCLASSIFIED_SCORE && prev < transition {
            threshold += margin;
        }
        let mut score = self.scale(raw, threshold);

        let scan = self.cfg.scan_triggering_threshold;
        self.state.scan_threshold_breach =
            (0.0..scan).contains(&raw) && self.state.prev_raw_score >= scan;

        // Stay a notch off the transition score.
        if score.trunc() == transition.trunc() {
            score = if prev > transition {
                score + 1.0
            } else {
                score - 1.0
            };
        }

        // An upward breach restarts the debounce whether or not rssi is known.
        if (0.0..transition).contains(&prev) && score >= transition {
            tracing::debug!(score, prev, rssi, direction = "up", "transition score breached");
            self.state.last_breach_ms = Some(now_ms);
        }

        match rssi {
            Some(rssi) => self.update_decisions(score, prev, rssi, now_ms),
            None => self.state.block_current_ap = false,
        }

        self.state.prev_score = score;
        self.state.prev_raw_score = raw;
        score
    }

    fn update_decisions(&mut self, score: f64, prev: f64, rssi: i32, now_ms: u64) {
        let cfg = &self.cfg;
        let transition = cfg.transition_score;
        let weak = rssi < cfg.breach_rssi_dbm;

        let breach_low = weak && (0.0..transition).contains(&score) && prev >= transition;
        if breach_low {
            self.state.trending_downward = prev < cfg.max_health_score;
            tracing::debug!(
                score,
                prev,
                rssi,
                trending_downward = self.state.trending_downward,
                direction = "down",
                "transition score breached"
            );
            self.state.last_breach_ms = Some(now_ms);
        }

        let since_breach = self
            .state
            .last_breach_ms
            .map(|t| now_ms.saturating_sub(t));
        let debounce_ms = cfg.debounce.as_millis() as u64;

        if let Some(elapsed) = since_breach {
            let was = self.state.recommend_default_network;
            let urgent = elapsed > debounce_ms
                || self.state.trending_downward
                || rssi <= cfg.no_hysteresis_rssi_dbm;
            if urgent && weak && score < transition {
                self.state.recommend_default_network = false;
            }
            if elapsed > debounce_ms && score > transition {
                self.state.recommend_default_network = true;
            }
            if was != self.state.recommend_default_network {
                tracing::debug!(
                    recommend = self.state.recommend_default_network,
                    score,
                    rssi,
                    elapsed_ms = elapsed,
                    "default network recommendation changed"
                );
            }
        }

        let block_wait_ms = cfg.block_wait.as_millis() as u64;
        self.state.block_current_ap = score < transition
            && weak
            && since_breach.is_some_and(|elapsed| elapsed > block_wait_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSSI: Option<i32> = Some(-70);

    fn controller() -> HysteresisController {
        HysteresisController::new(HysteresisConfig::default())
    }

    /// Threshold 50 with no margin makes the scaling the identity.
    fn feed(c: &mut HysteresisController, raw: f64, rssi: Option<i32>, now: u64) -> f64 {
        c.adjust(raw, true, rssi, 50.0, 0.0, now)
    }

    // ─── Scaling ────────────────────────────────────────────────────────

    #[test]
    fn scales_threshold_onto_transition() {
        let mut c = controller();
        // Default threshold 10: raw 8 → 40.
        let s = c.adjust(8.0, true, RSSI, 10.0, 70.0, 0);
        assert_eq!(s, 40.0);
        // Previous score below transition: threshold becomes 80, raw 40 → 25.
        let s = c.adjust(40.0, true, RSSI, 10.0, 70.0, 1);
        assert_eq!(s, 25.0);
    }

    #[test]
    fn scaled_score_is_capped() {
        let mut c = controller();
        assert_eq!(c.adjust(90.0, true, RSSI, 10.0, 70.0, 0), 100.0);
    }

    #[test]
    fn boundary_nudge_sequence() {
        let mut c = controller();
        let input = [60.0, 49.0, 49.0, 50.0, 60.0, 50.0, 49.0, 60.0, 50.0, 50.0, 49.0, 60.0, 50.0, 52.0];
        let expected = [60.0, 49.0, 49.0, 49.0, 60.0, 51.0, 49.0, 60.0, 51.0, 51.0, 49.0, 60.0, 51.0, 52.0];
        for (i, (raw, want)) in input.iter().zip(expected).enumerate() {
            assert_eq!(feed(&mut c, *raw, RSSI, i as u64), want, "step {i}");
        }
    }

    #[test]
    fn fractional_boundary_is_nudged() {
        let mut c = controller();
        feed(&mut c, 60.0, RSSI, 0);
        assert_eq!(feed(&mut c, 50.5, RSSI, 1), 51.5);
    }

    // ─── Scan trigger ───────────────────────────────────────────────────

    #[test]
    fn scan_triggers_on_falling_edge_only() {
        let mut c = controller();
        c.adjust(9.0, true, RSSI, 10.0, 70.0, 0);
        assert!(c.should_trigger_scan());
        c.adjust(5.0, true, RSSI, 10.0, 70.0, 1);
        assert!(!c.should_trigger_scan());
        c.adjust(12.0, true, RSSI, 10.0, 70.0, 2);
        assert!(!c.should_trigger_scan());
        c.adjust(0.0, true, RSSI, 10.0, 70.0, 3);
        assert!(c.should_trigger_scan());
    }

    // ─── Recommendation debounce ────────────────────────────────────────

    #[test]
    fn breach_waits_for_debounce() {
        let mut c = controller();
        feed(&mut c, 60.0, RSSI, 1);
        feed(&mut c, 49.0, RSSI, 2);
        assert!(c.recommend_default_network());
        feed(&mut c, 49.0, RSSI, 3);
        assert!(c.recommend_default_network());
        feed(&mut c, 49.0, RSSI, 2 + 5_000);
        assert!(c.recommend_default_network());
        feed(&mut c, 49.0, RSSI, 3 + 5_000);
        assert!(!c.recommend_default_network());
    }

    #[test]
    fn trending_down_skips_debounce() {
        let mut c = controller();
        feed(&mut c, 60.0, RSSI, 1);
        feed(&mut c, 53.0, RSSI, 2);
        feed(&mut c, 49.0, RSSI, 3);
        assert!(c.state().trending_downward);
        assert!(!c.recommend_default_network());
    }

    #[test]
    fn very_low_rssi_skips_debounce() {
        let mut c = controller();
        feed(&mut c, 60.0, Some(-85), 1);
        feed(&mut c, 49.0, Some(-85), 2);
        assert!(!c.recommend_default_network());
    }

    #[test]
    fn strong_signal_keeps_recommendation() {
        let mut c = controller();
        feed(&mut c, 60.0, Some(-60), 1);
        feed(&mut c, 40.0, Some(-60), 2);
        feed(&mut c, 40.0, Some(-60), 10_000);
        assert!(c.recommend_default_network());
        assert!(c.state().last_breach_ms.is_none());
    }

    #[test]
    fn recovers_after_debounce() {
        let mut c = controller();
        feed(&mut c, 60.0, Some(-85), 0);
        feed(&mut c, 40.0, Some(-85), 1_000);
        assert!(!c.recommend_default_network());
        feed(&mut c, 60.0, Some(-70), 2_000);
        assert!(!c.recommend_default_network());
        feed(&mut c, 60.0, Some(-70), 7_001);
        assert!(c.recommend_default_network());
    }

    #[test]
    fn upward_breach_without_rssi_restarts_debounce() {
        let mut c = controller();
        feed(&mut c, 60.0, Some(-85), 0);
        feed(&mut c, 40.0, Some(-85), 1_000);
        assert!(!c.recommend_default_network());

        feed(&mut c, 60.0, None, 2_000);
        assert_eq!(c.state().last_breach_ms, Some(2_000));

        // Debounce counts from the rssi-less recovery, not the drop.
        feed(&mut c, 60.0, Some(-70), 6_500);
        assert!(!c.recommend_default_network());
        feed(&mut c, 60.0, Some(-70), 7_001);
        assert!(c.recommend_default_network());
    }

    #[test]
    fn identity_change_resets() {
        let mut c = controller();
        feed(&mut c, 60.0, Some(-85), 1);
        feed(&mut c, 49.0, Some(-85), 2);
        assert!(!c.recommend_default_network());

        let s = c.adjust(10.0, false, Some(-85), 50.0, 0.0, 3);
        assert_eq!(s, 100.0);
        assert!(c.recommend_default_network());
        assert_eq!(c.state().last_breach_ms, None);
        assert!(!c.state().trending_downward);
    }

    #[test]
    fn missing_rssi_leaves_recommendation() {
        let mut c = controller();
        feed(&mut c, 60.0, RSSI, 1);
        feed(&mut c, 30.0, None, 2);
        assert!(c.recommend_default_network());
        assert_eq!(c.state().last_breach_ms, None);
        assert_eq!(c.state().prev_score, 30.0);
    }

    // ─── Blocking ───────────────────────────────────────────────────────

    #[test]
    fn blocks_after_wait() {
        let mut c = controller();
        feed(&mut c, 60.0, RSSI, 0);
        feed(&mut c, 40.0, RSSI, 1_000);
        assert!(!c.should_block_access_point());
        feed(&mut c, 40.0, RSSI, 30_000);
        assert!(!c.should_block_access_point());
        feed(&mut c, 40.0, RSSI, 30_001);
        assert!(c.should_block_access_point());
        feed(&mut c, 40.0, Some(-60), 31_000);
        assert!(!c.should_block_access_point());
    }
}
