//! Boundary adjustments and reachability-probe scheduling for the heuristic
//! scorer.

use std::time::Duration;

/// Link observations the adjuster needs besides the score itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustInput {
    /// Previously reported adjusted score.
    pub prev_score: i32,
    pub tx_success_pps: f64,
    pub rx_success_pps: f64,
    pub filtered_rssi: f64,
    pub rssi: Option<i32>,
    /// Entry rssi for the current band.
    pub entry_rssi_dbm: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdjusterConfig {
    /// Tx and rx rates that prove a busy link is still usable.
    pub busy_link_pps: f64,
    pub keep_below_transition: Duration,
    /// 0 disables probes; higher values probe more eagerly after a low
    /// score.
    pub nud_knob: u8,
    pub nud_time_constant: Duration,
    /// Scores below this count as "was low" when the last probe happened.
    pub nominal_transition_score: i32,
}

#[derive(Debug, Clone)]
pub struct ScoreAdjuster {
    cfg: AdjusterConfig,
    last_downward_breach_ms: Option<u64>,
    last_probe: Option<(u64, i32)>,
}

impl ScoreAdjuster {
    pub fn new(cfg: AdjusterConfig) -> Self {
        ScoreAdjuster {
            cfg,
            last_downward_breach_ms: None,
            last_probe: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_downward_breach_ms = None;
        self.last_probe = None;
    }

    pub fn last_downward_breach_ms(&self) -> Option<u64> {
        self.last_downward_breach_ms
    }

    /// Time and score of the last requested probe.
    pub fn last_probe(&self) -> Option<(u64, i32)> {
        self.last_probe
    }

    /// Apply the boundary rules to `score`:
    ///
    /// - a drop to or below `transition` on a link still moving traffic in
    ///   both directions is held at `transition + 1`;
    /// - likewise while filtered or raw rssi is at or above the entry level;
    /// - a rise back over `transition` within the keep-below time of the last
    ///   downward breach is held at the previous score.
    pub fn adjust(&self, input: &AdjustInput, now_ms: u64, transition: i32, score: i32) -> i32 {
        let prev = input.prev_score;
        let mut adjusted = score;

        if prev > transition
            && adjusted <= transition
            && input.tx_success_pps >= self.cfg.busy_link_pps
            && input.rx_success_pps >= self.cfg.busy_link_pps
        {
            adjusted = transition + 1;
        }

        if prev > transition && adjusted <= transition {
            let entry = f64::from(input.entry_rssi_dbm);
            let raw_above = input.rssi.is_some_and(|r| r >= input.entry_rssi_dbm);
            if input.filtered_rssi >= entry || raw_above {
                adjusted = transition + 1;
            }
        }

        if prev < transition && adjusted >= transition {
            let keep_ms = self.cfg.keep_below_transition.as_millis() as u64;
            let held = self
                .last_downward_breach_ms
                .is_some_and(|t| now_ms.saturating_sub(t) < keep_ms);
            if held {
                adjusted = prev;
            }
        }
        adjusted
    }

    /// Remember a downward crossing of `transition`.
    pub fn record_breach(&mut self, prev: i32, adjusted: i32, transition: i32, now_ms: u64) {
        if prev >= transition && adjusted < transition {
            self.last_downward_breach_ms = Some(now_ms);
        }
    }

    /// The score a link must fall below to warrant a probe.
    ///
    /// Right after a low-score probe the bar starts `11 - knob` below that
    /// score and relaxes exponentially back to `transition`.
    pub fn nud_bar(
        &self,
        last_probe: Option<(u64, i32)>,
        now_ms: u64,
        transition: i32,
    ) -> f64 {
        let Some((probe_ms, probe_score)) = last_probe else {
            return f64::from(transition);
        };
        let tau = self.cfg.nud_time_constant.as_millis() as f64;
        let quotient = now_ms.saturating_sub(probe_ms) as f64 / tau;
        let delta_level = 11.0 - f64::from(self.cfg.nud_knob);
        if probe_score < self.cfg.nominal_transition_score && quotient < 5.0 {
            let a = (-quotient).exp();
            a * (f64::from(probe_score) - delta_level) + (1.0 - a) * f64::from(transition)
        } else {
            f64::from(transition)
        }
    }

    /// Whether to ask for a reachability probe. A positive answer records
    /// the probe time and score.
    pub fn should_check_nud(&mut self, now_ms: u64, transition: i32, score: i32) -> bool {
        if self.cfg.nud_knob == 0 {
            return false;
        }
        let bar = self.nud_bar(self.last_probe, now_ms, transition);
        if f64::from(score) >= bar {
            return false;
        }
        tracing::debug!(score, bar, "requesting reachability probe");
        self.last_probe = Some((now_ms, score));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjuster(knob: u8) -> ScoreAdjuster {
        ScoreAdjuster::new(AdjusterConfig {
            busy_link_pps: 2.0,
            keep_below_transition: Duration::from_millis(9_000),
            nud_knob: knob,
            nud_time_constant: Duration::from_millis(30_000),
            nominal_transition_score: 50,
        })
    }

    fn input(prev: i32) -> AdjustInput {
        AdjustInput {
            prev_score: prev,
            tx_success_pps: 0.0,
            rx_success_pps: 0.0,
            filtered_rssi: -85.0,
            rssi: Some(-85),
            entry_rssi_dbm: -80,
        }
    }

    // ─── Boundary rules ─────────────────────────────────────────────────

    #[test]
    fn busy_link_stays_above_transition() {
        let a = adjuster(8);
        let mut i = input(55);
        assert_eq!(a.adjust(&i, 0, 50, 45), 45);
        i.tx_success_pps = 2.0;
        i.rx_success_pps = 3.0;
        assert_eq!(a.adjust(&i, 0, 50, 45), 51);
    }

    #[test]
    fn entry_rssi_stays_above_transition() {
        let a = adjuster(8);
        let mut i = input(55);
        i.filtered_rssi = -80.0;
        assert_eq!(a.adjust(&i, 0, 50, 48), 51);
        i.filtered_rssi = -81.0;
        i.rssi = Some(-79);
        assert_eq!(a.adjust(&i, 0, 50, 48), 51);
        i.rssi = None;
        assert_eq!(a.adjust(&i, 0, 50, 48), 48);
    }

    #[test]
    fn recovery_is_held_after_breach() {
        let mut a = adjuster(8);
        a.record_breach(60, 45, 50, 1_000);
        assert_eq!(a.last_downward_breach_ms(), Some(1_000));

        let i = input(45);
        assert_eq!(a.adjust(&i, 9_999, 50, 55), 45);
        assert_eq!(a.adjust(&i, 10_000, 50, 55), 55);
    }

    #[test]
    fn recovery_without_breach_is_free() {
        let a = adjuster(8);
        assert_eq!(a.adjust(&input(45), 0, 50, 55), 55);
    }

    // ─── NUD ────────────────────────────────────────────────────────────

    #[test]
    fn knob_zero_never_probes() {
        let mut a = adjuster(0);
        assert!(!a.should_check_nud(0, 50, 10));
    }

    #[test]
    fn first_probe_uses_transition() {
        let mut a = adjuster(8);
        assert!(!a.should_check_nud(0, 50, 50));
        assert!(a.should_check_nud(0, 50, 49));
        assert_eq!(a.last_probe(), Some((0, 49)));
    }

    #[test]
    fn bar_decays_back_to_transition() {
        let a = adjuster(8);
        let probe = Some((0, 40));
        // Right after: 40 - (11 - 8)
        assert!((a.nud_bar(probe, 0, 50) - 37.0).abs() < 1e-12);
        let later = a.nud_bar(probe, 30_000, 50);
        let expected = (-1.0f64).exp() * 37.0 + (1.0 - (-1.0f64).exp()) * 50.0;
        assert!((later - expected).abs() < 1e-9);
        assert_eq!(a.nud_bar(probe, 150_000, 50), 50.0);
        assert_eq!(a.nud_bar(Some((0, 55)), 0, 50), 50.0);
    }

    #[test]
    fn repeated_probe_needs_lower_score() {
        let mut a = adjuster(8);
        assert!(a.should_check_nud(0, 50, 40));
        assert!(!a.should_check_nud(3_000, 50, 40));
        assert!(a.should_check_nud(6_000, 50, 30));
    }
}
