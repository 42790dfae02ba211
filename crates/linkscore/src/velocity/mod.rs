//! # Velocity Scorer
//!
//! Heuristic scorer that needs no trained model. Rssi is tracked by a
//! Kalman filter; the score is how far the worse of the filtered rssi and
//! its short-horizon forecast sits above the band's exit threshold.
//!
//! The exit threshold adapts downwards while a weak link keeps moving
//! traffic successfully, so a link that works at low signal is not
//! penalised for it.

pub mod adjuster;
pub mod kalman;
pub mod rates;

pub use adjuster::{AdjustInput, AdjusterConfig, ScoreAdjuster};
pub use kalman::{KalmanConfig, KalmanFilter};
pub use rates::{PacketRateTracker, PacketRates};

use crate::UNCLASSIFIED_SCORE;
use crate::config::{RssiThresholds, VelocityConfig};
use crate::result::ScoreResult;
use crate::sample::{LinkIdentity, TelemetrySample};

/// Round half up, so `-0.5` rounds to `0`.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

#[derive(Debug, Clone)]
pub struct VelocityScorer {
    cfg: VelocityConfig,
    filter: KalmanFilter,
    rates: PacketRateTracker,
    adjuster: ScoreAdjuster,
    /// Timestamp of the last filtered sample; `None` forces a re-init.
    last_millis: Option<u64>,
    identity: Option<LinkIdentity>,
    /// Accumulated exit-threshold adjustment (dB, ≤ 0).
    threshold_adjustment: f64,
    prev_score: i32,
}

impl VelocityScorer {
    pub fn new(cfg: VelocityConfig) -> Self {
        let filter = KalmanFilter::new(&KalmanConfig {
            measurement_std: cfg.rssi_std_db,
            accel_std: cfg.accel_std,
        });
        let rates = PacketRateTracker::new(cfg.rate_time_constant.as_millis() as f64);
        let adjuster = ScoreAdjuster::new(AdjusterConfig {
            busy_link_pps: cfg.busy_link_pps,
            keep_below_transition: cfg.keep_below_transition,
            nud_knob: cfg.nud_knob,
            nud_time_constant: cfg.nud_time_constant,
            nominal_transition_score: cfg.transition_score,
        });
        let prev_score = cfg.max_score;
        VelocityScorer {
            cfg,
            filter,
            rates,
            adjuster,
            last_millis: None,
            identity: None,
            threshold_adjustment: 0.0,
            prev_score,
        }
    }

    pub fn filter(&self) -> &KalmanFilter {
        &self.filter
    }

    pub fn rates(&self) -> &PacketRates {
        self.rates.rates()
    }

    pub fn threshold_adjustment(&self) -> f64 {
        self.threshold_adjustment
    }

    pub fn prev_score(&self) -> i32 {
        self.prev_score
    }

    fn band_thresholds(&self) -> RssiThresholds {
        let band = self.identity.as_ref().and_then(LinkIdentity::band);
        self.cfg.rssi.for_band(band)
    }

    /// Exit rssi plus the rounded adaptation.
    pub fn adjusted_rssi_threshold(&self) -> f64 {
        f64::from(self.band_thresholds().exit_dbm) + round_half_up(self.threshold_adjustment)
    }

    fn transition_for(&self, is_primary: bool) -> i32 {
        if is_primary {
            self.cfg.transition_score
        } else {
            self.cfg.secondary_transition_score
        }
    }

    /// Feed the filter and packet rates, then adapt the exit threshold.
    fn update(&mut self, sample: &TelemetrySample) {
        if self.identity.as_ref() != Some(&sample.identity) {
            if self.identity.is_some() {
                tracing::debug!(
                    from = ?self.identity.as_ref().map(ToString::to_string),
                    to = %sample.identity,
                    "link identity changed, restarting rssi filter"
                );
            }
            self.identity = Some(sample.identity.clone());
            self.last_millis = None;
        }
        self.rates.update(sample);

        let Some(rssi) = sample.rssi() else {
            return;
        };
        let now = sample.timestamp_ms;
        match self.last_millis {
            Some(last) if self.filter.is_initialized() && now >= last => {
                let dt = (now - last) as f64 / 1_000.0;
                self.filter.update(f64::from(rssi), dt);
            }
            _ => self.filter.init(f64::from(rssi)),
        }
        self.last_millis = Some(now);

        self.adapt_threshold();
    }

    fn adapt_threshold(&mut self) {
        if self.threshold_adjustment < -self.cfg.max_threshold_adjustment_db {
            return;
        }
        if self.filter.value() >= self.adjusted_rssi_threshold() + 2.0 {
            return;
        }
        if self.filter.velocity().abs() >= 0.2 {
            return;
        }
        let rates = *self.rates.rates();
        if rates.tx_success_pps < self.cfg.min_pps_for_success
            || rates.rx_success_pps < self.cfg.min_pps_for_success
        {
            return;
        }
        if rates.tx_success_probability().is_some_and(|p| p > 0.2) {
            self.threshold_adjustment -= self.cfg.threshold_step_db;
        }
    }

    /// Unadjusted score from the current filter state.
    fn generate_score(&self) -> i32 {
        let filtered = self.filter.value();
        let forecast = self
            .filter
            .predict_ahead(self.cfg.horizon.as_secs_f64());
        let worst = forecast.min(filtered);
        let score = worst.round() - self.adjusted_rssi_threshold()
            + f64::from(self.cfg.transition_score);
        score.clamp(0.0, f64::from(self.cfg.max_score)) as i32
    }

    pub fn generate_score_result(
        &mut self,
        sample: &TelemetrySample,
        now_ms: u64,
        is_primary: bool,
    ) -> ScoreResult {
        self.update(sample);
        let transition = self.transition_for(is_primary);

        // No rssi seen yet on this scorer: nothing to score from.
        if !self.filter.is_initialized() {
            tracing::trace!(link = %sample.identity, "no valid rssi yet, unclassified");
            return ScoreResult {
                score: UNCLASSIFIED_SCORE as i32,
                adjusted_score: self.prev_score,
                is_link_usable: self.prev_score >= transition,
                should_trigger_scan: self.prev_score < self.cfg.low_score_scan_threshold,
                should_check_reachability: false,
                should_block_access_point: false,
            };
        }
        let score = self.generate_score();

        let entry = self.band_thresholds().entry_dbm;
        let input = AdjustInput {
            prev_score: self.prev_score,
            tx_success_pps: self.rates.rates().tx_success_pps,
            rx_success_pps: self.rates.rates().rx_success_pps,
            filtered_rssi: self.filter.value(),
            rssi: sample.rssi(),
            entry_rssi_dbm: entry,
        };
        let adjusted = self.adjuster.adjust(&input, now_ms, transition, score);
        self.adjuster
            .record_breach(self.prev_score, adjusted, transition, now_ms);
        let should_check_reachability = self.adjuster.should_check_nud(now_ms, transition, adjusted);

        tracing::trace!(
            link = %sample.identity,
            filtered_rssi = self.filter.value(),
            velocity = self.filter.velocity(),
            threshold = self.adjusted_rssi_threshold(),
            score,
            adjusted,
            "velocity score"
        );
        self.prev_score = adjusted;

        ScoreResult {
            score,
            adjusted_score: adjusted,
            is_link_usable: adjusted >= transition,
            should_trigger_scan: adjusted < self.cfg.low_score_scan_threshold,
            should_check_reachability,
            should_block_access_point: false,
        }
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.rates.reset();
        self.adjuster.reset();
        self.last_millis = None;
        self.identity = None;
        self.threshold_adjustment = 0.0;
        self.prev_score = self.cfg.max_score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Bssid, LinkCounters};

    fn link(freq: u32) -> LinkIdentity {
        LinkIdentity::new(Bssid([2, 0, 0, 0, 0, 1]), freq)
    }

    fn sample(t: u64, rssi: i32, packets: u64, freq: u32) -> TelemetrySample {
        TelemetrySample {
            timestamp_ms: t,
            identity: link(freq),
            rssi_dbm: rssi,
            counters: LinkCounters {
                tx_success: packets,
                rx_success: packets,
                tx_bad: packets / 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn round_half_up_matches_expectations() {
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(-1.5), -1.0);
        assert_eq!(round_half_up(-4.5), -4.0);
        assert_eq!(round_half_up(-4.6), -5.0);
        assert_eq!(round_half_up(0.5), 1.0);
    }

    #[test]
    fn idle_weak_link_is_unusable() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        let mut last = None;
        for i in 0..10u64 {
            let t = i * 3_001;
            let r = s.generate_score_result(&sample(t, -84, 0, 2412), t, true);
            assert_eq!(r.score, 49);
            last = Some(r);
        }
        let r = last.unwrap();
        assert_eq!(r.adjusted_score, 49);
        assert!(!r.is_link_usable);
        assert!(r.should_trigger_scan);
        assert!(!r.should_block_access_point);
        assert_eq!(s.threshold_adjustment(), 0.0);
    }

    #[test]
    fn busy_weak_link_earns_lower_threshold() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        let mut last = None;
        for i in 0..10u64 {
            let t = i * 3_001;
            last = Some(s.generate_score_result(&sample(t, -85, i * 10, 2412), t, true));
        }
        let r = last.unwrap();
        assert_eq!(s.adjusted_rssi_threshold(), -87.0);
        assert_eq!(r.score, 52);
        assert_eq!(r.adjusted_score, 52);
        assert!(r.is_link_usable);
    }

    #[test]
    fn first_low_score_requests_probe() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        let r = s.generate_score_result(&sample(0, -84, 0, 2412), 0, true);
        assert!(r.should_check_reachability);
        let r = s.generate_score_result(&sample(3_000, -84, 0, 2412), 3_000, true);
        assert!(!r.should_check_reachability);
    }

    #[test]
    fn secondary_link_uses_higher_transition() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        // 5 GHz exit -80: rssi -78 scores 52.
        let r = s.generate_score_result(&sample(0, -78, 0, 5180), 0, false);
        assert_eq!(r.score, 52);
        assert!(!r.is_link_usable);

        s.reset();
        let r = s.generate_score_result(&sample(0, -78, 0, 5180), 0, true);
        assert!(r.is_link_usable);
    }

    #[test]
    fn strong_signal_is_capped() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        let r = s.generate_score_result(&sample(0, -40, 0, 5955), 0, true);
        assert_eq!(r.score, 60);
        assert!(!r.should_trigger_scan);
        assert!(!r.should_check_reachability);
    }

    #[test]
    fn frequency_change_restarts_filter_keeps_adjustment() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        for i in 0..6u64 {
            let t = i * 3_001;
            s.generate_score_result(&sample(t, -85, i * 10, 2412), t, true);
        }
        let adjustment = s.threshold_adjustment();
        assert!(adjustment < 0.0);

        let t = 6 * 3_001;
        s.generate_score_result(&sample(t, -60, 60, 5180), t, true);
        assert_eq!(s.filter().value(), -60.0);
        assert_eq!(s.threshold_adjustment(), adjustment);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        for i in 0..6u64 {
            let t = i * 3_001;
            s.generate_score_result(&sample(t, -85, i * 10, 2412), t, true);
        }
        s.reset();
        assert_eq!(s.threshold_adjustment(), 0.0);
        assert_eq!(s.prev_score(), 60);
        assert!(!s.filter().is_initialized());
    }

    #[test]
    fn first_sample_without_rssi_is_unclassified() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        let r = s.generate_score_result(&sample(0, crate::sample::INVALID_RSSI_DBM, 0, 2412), 0, true);
        assert_eq!(r.score, -1);
        assert_eq!(r.adjusted_score, 60);
        assert!(r.is_link_usable);
        assert!(!r.should_trigger_scan);
        assert!(!r.should_check_reachability);
        assert_eq!(s.prev_score(), 60);
        assert!(!s.filter().is_initialized());

        // 2.4 GHz exit -83: rssi -84 scores 49 once a reading arrives.
        let r = s.generate_score_result(&sample(3_000, -84, 0, 2412), 3_000, true);
        assert_eq!(r.score, 49);
        assert!(r.should_check_reachability);
    }

    #[test]
    fn invalid_rssi_keeps_filter() {
        let mut s = VelocityScorer::new(VelocityConfig::default());
        s.generate_score_result(&sample(0, -70, 0, 5180), 0, true);
        s.generate_score_result(&sample(3_000, crate::sample::INVALID_RSSI_DBM, 0, 5180), 3_000, true);
        assert_eq!(s.filter().value(), -70.0);
    }
}
