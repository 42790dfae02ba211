//! # Derived Samples
//!
//! Turns a cumulative [`TelemetrySample`] into per-interval deltas and the
//! derived rates the classifier was trained on. Anything that cannot be
//! computed meaningfully for an interval is `NaN` ("undefined"); the feature
//! extractor imputes those later.

use crate::config::DerivationConfig;
use crate::features::NormalizationTable;
use crate::sample::TelemetrySample;

/// Number of per-sample model features.
pub const NUM_FEATURES: usize = 15;

/// Model feature, in training order (alphabetical by training name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    EstTxTput,
    LinkSpeedMbps,
    Rssi,
    CcaBusyRatio,
    RadioOnFreqTimeDiff,
    RadioOnTimePerAttempt,
    RadioRxTimePerRxSuccess,
    RadioTxTimePerTxAttempt,
    RoamScanTimeDiff,
    RxSuccessDiff,
    ScanTimeDiff,
    TxAttempts,
    TxBadDiff,
    TxRetriesPerAttempt,
    TxSuccessPerAttempt,
}

impl Feature {
    pub const ALL: [Feature; NUM_FEATURES] = [
        Feature::EstTxTput,
        Feature::LinkSpeedMbps,
        Feature::Rssi,
        Feature::CcaBusyRatio,
        Feature::RadioOnFreqTimeDiff,
        Feature::RadioOnTimePerAttempt,
        Feature::RadioRxTimePerRxSuccess,
        Feature::RadioTxTimePerTxAttempt,
        Feature::RoamScanTimeDiff,
        Feature::RxSuccessDiff,
        Feature::ScanTimeDiff,
        Feature::TxAttempts,
        Feature::TxBadDiff,
        Feature::TxRetriesPerAttempt,
        Feature::TxSuccessPerAttempt,
    ];

    /// Position in a per-sample feature row.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used by the training pipeline.
    pub fn name(self) -> &'static str {
        match self {
            Feature::EstTxTput => "est_tx_tput",
            Feature::LinkSpeedMbps => "link_speed_mbps",
            Feature::Rssi => "rssi",
            Feature::CcaBusyRatio => "cca_busy_ratio",
            Feature::RadioOnFreqTimeDiff => "radio_on_freq_time_diff",
            Feature::RadioOnTimePerAttempt => "radio_on_time_per_attempt",
            Feature::RadioRxTimePerRxSuccess => "radio_rx_time_per_rx_success",
            Feature::RadioTxTimePerTxAttempt => "radio_tx_time_per_tx_attempt",
            Feature::RoamScanTimeDiff => "roam_scan_time_diff",
            Feature::RxSuccessDiff => "rx_success_diff",
            Feature::ScanTimeDiff => "scan_time_diff",
            Feature::TxAttempts => "tx_attempts",
            Feature::TxBadDiff => "tx_bad_diff",
            Feature::TxRetriesPerAttempt => "tx_retries_per_attempt",
            Feature::TxSuccessPerAttempt => "tx_success_per_attempt",
        }
    }
}

/// Telemetry sample plus its interval deltas and derived rates.
///
/// All values are `f64`; `NaN` marks an undefined value.
#[derive(Debug, Clone)]
pub struct DerivedSample {
    sample: TelemetrySample,

    // ── Interval deltas ──
    pub tx_success_diff: f64,
    pub tx_retries_diff: f64,
    pub tx_bad_diff: f64,
    pub rx_success_diff: f64,
    pub beacon_rx_diff: f64,
    pub radio_on_time_diff: f64,
    pub radio_tx_time_diff: f64,
    pub radio_rx_time_diff: f64,
    pub scan_time_diff: f64,
    pub roam_scan_time_diff: f64,
    pub radio_on_freq_time_diff: f64,
    pub cca_busy_time_diff: f64,

    // ── Derived rates ──
    pub tx_attempts: f64,
    pub tx_success_per_attempt: f64,
    pub tx_retries_per_attempt: f64,
    pub radio_tx_time_per_tx_attempt: f64,
    pub radio_rx_time_per_rx_success: f64,
    pub radio_on_time_per_attempt: f64,
    pub cca_busy_ratio: f64,
    pub link_speed_mbps: f64,
    pub rx_link_speed_mbps: f64,
    pub rssi: f64,
    pub est_tx_tput: f64,
    pub est_rx_tput: f64,
}

/// Counter delta, `NaN` when the counter went backwards (driver reset).
fn delta(current: u64, previous: u64) -> f64 {
    if current >= previous {
        (current - previous) as f64
    } else {
        f64::NAN
    }
}

/// `num / den`, undefined when either side is zero or undefined.
fn ratio_nonzero(num: f64, den: f64) -> f64 {
    if num.is_nan() || den.is_nan() || num == 0.0 || den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

impl DerivedSample {
    fn zeroed(sample: &TelemetrySample) -> Self {
        DerivedSample {
            sample: sample.clone(),
            tx_success_diff: 0.0,
            tx_retries_diff: 0.0,
            tx_bad_diff: 0.0,
            rx_success_diff: 0.0,
            beacon_rx_diff: 0.0,
            radio_on_time_diff: 0.0,
            radio_tx_time_diff: 0.0,
            radio_rx_time_diff: 0.0,
            scan_time_diff: 0.0,
            roam_scan_time_diff: 0.0,
            radio_on_freq_time_diff: 0.0,
            cca_busy_time_diff: 0.0,
            tx_attempts: 0.0,
            tx_success_per_attempt: 0.0,
            tx_retries_per_attempt: 0.0,
            radio_tx_time_per_tx_attempt: 0.0,
            radio_rx_time_per_rx_success: 0.0,
            radio_on_time_per_attempt: 0.0,
            cca_busy_ratio: 0.0,
            link_speed_mbps: 0.0,
            rx_link_speed_mbps: 0.0,
            rssi: 0.0,
            est_tx_tput: 0.0,
            est_rx_tput: 0.0,
        }
    }

    /// First sample of a window: no prior data, so every model feature takes
    /// its global mean and the remaining deltas are zero.
    pub fn without_history(sample: &TelemetrySample, norm: &NormalizationTable) -> Self {
        let mut d = Self::zeroed(sample);
        for feature in Feature::ALL {
            *d.feature_mut(feature) = norm.feature_mean(feature);
        }
        d
    }

    /// Derive the interval `previous → sample`.
    pub fn from_interval(
        sample: &TelemetrySample,
        previous: &TelemetrySample,
        norm: &NormalizationTable,
        cfg: &DerivationConfig,
    ) -> Self {
        let cur = &sample.counters;
        let prev = &previous.counters;
        let mut d = Self::zeroed(sample);

        d.tx_success_diff = delta(cur.tx_success, prev.tx_success);
        d.tx_retries_diff = delta(cur.tx_retries, prev.tx_retries);
        d.tx_bad_diff = delta(cur.tx_bad, prev.tx_bad);
        d.rx_success_diff = delta(cur.rx_success, prev.rx_success);
        d.beacon_rx_diff = delta(cur.beacon_rx, prev.beacon_rx);
        d.radio_on_time_diff = delta(cur.radio_on_time_ms, prev.radio_on_time_ms);
        d.radio_tx_time_diff = delta(cur.radio_tx_time_ms, prev.radio_tx_time_ms);
        d.radio_rx_time_diff = delta(cur.radio_rx_time_ms, prev.radio_rx_time_ms);
        d.scan_time_diff = delta(cur.scan_time_ms, prev.scan_time_ms);
        d.roam_scan_time_diff = delta(cur.roam_scan_time_ms, prev.roam_scan_time_ms);
        d.radio_on_freq_time_diff = delta(cur.radio_on_freq_time_ms, prev.radio_on_freq_time_ms);
        d.cca_busy_time_diff = delta(cur.cca_busy_freq_time_ms, prev.cca_busy_freq_time_ms);

        let very_high = d.tx_success_diff >= cfg.success_pkt_count_very_high_threshold
            || d.rx_success_diff >= cfg.success_pkt_count_very_high_threshold;

        // Tx normalization
        d.tx_attempts = d.tx_success_diff + d.tx_retries_diff;
        let too_few_tx = d.tx_attempts == 0.0
            || (d.tx_attempts <= cfg.tx_pkt_count_threshold && d.tx_success_diff == 0.0);
        if d.tx_attempts.is_nan() || too_few_tx || very_high {
            d.tx_success_per_attempt = f64::NAN;
            d.tx_retries_per_attempt = f64::NAN;
            // Stays zero rather than missing.
            d.radio_tx_time_per_tx_attempt = 0.0;
        } else {
            d.tx_success_per_attempt = d.tx_success_diff / d.tx_attempts;
            d.tx_retries_per_attempt = d.tx_retries_diff / d.tx_attempts;
            d.radio_tx_time_per_tx_attempt = d.radio_tx_time_diff / d.tx_attempts;
        }

        // Link speeds
        d.link_speed_mbps = if sample.tx_link_speed_mbps < 0
            || d.tx_attempts <= cfg.tx_pkt_count_threshold
            || very_high
        {
            f64::NAN
        } else {
            f64::from(sample.tx_link_speed_mbps)
        };
        d.rx_link_speed_mbps = if sample.rx_link_speed_mbps < 0
            || d.rx_success_diff <= cfg.rx_pkt_count_threshold
            || very_high
        {
            f64::NAN
        } else {
            f64::from(sample.rx_link_speed_mbps)
        };
        d.rssi = f64::from(sample.rssi_dbm);

        // Rx normalization
        d.radio_rx_time_per_rx_success = ratio_nonzero(d.radio_rx_time_diff, d.rx_success_diff);

        // Radio on time, excluding scans, per packet in either direction
        let attempts = d.tx_success_diff + d.rx_success_diff + d.tx_retries_diff;
        d.radio_on_time_per_attempt = if attempts == 0.0 {
            f64::NAN
        } else {
            (d.radio_on_time_diff - d.scan_time_diff) / attempts
        };

        d.cca_busy_ratio = if cfg.default_mean_cca_busy_ratio {
            norm.feature_mean(Feature::CcaBusyRatio)
        } else {
            d.measured_cca_busy_ratio(cfg)
        };

        d.est_tx_tput =
            d.link_speed_mbps * (1.0 - d.tx_retries_per_attempt) * (1.0 - d.cca_busy_ratio);
        d.est_rx_tput = d.rx_link_speed_mbps * (1.0 - d.cca_busy_ratio);

        d
    }

    fn measured_cca_busy_ratio(&self, cfg: &DerivationConfig) -> f64 {
        let on_freq = self.radio_on_freq_time_diff;
        if self.cca_busy_time_diff.is_nan()
            || on_freq.is_nan()
            || self.radio_rx_time_diff.is_nan()
            || on_freq <= cfg.min_cca_duration_ms
        {
            return f64::NAN;
        }
        let busy = if cfg.subtract_rx_time_from_cca_busy_time {
            self.cca_busy_time_diff - self.radio_rx_time_diff
        } else {
            self.cca_busy_time_diff
        };
        let ratio = busy / on_freq;
        if (0.0..=1.0).contains(&ratio) {
            ratio
        } else {
            f64::NAN
        }
    }

    /// The telemetry snapshot this was derived from.
    pub fn sample(&self) -> &TelemetrySample {
        &self.sample
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.sample.timestamp_ms
    }

    pub fn feature(&self, feature: Feature) -> f64 {
        match feature {
            Feature::EstTxTput => self.est_tx_tput,
            Feature::LinkSpeedMbps => self.link_speed_mbps,
            Feature::Rssi => self.rssi,
            Feature::CcaBusyRatio => self.cca_busy_ratio,
            Feature::RadioOnFreqTimeDiff => self.radio_on_freq_time_diff,
            Feature::RadioOnTimePerAttempt => self.radio_on_time_per_attempt,
            Feature::RadioRxTimePerRxSuccess => self.radio_rx_time_per_rx_success,
            Feature::RadioTxTimePerTxAttempt => self.radio_tx_time_per_tx_attempt,
            Feature::RoamScanTimeDiff => self.roam_scan_time_diff,
            Feature::RxSuccessDiff => self.rx_success_diff,
            Feature::ScanTimeDiff => self.scan_time_diff,
            Feature::TxAttempts => self.tx_attempts,
            Feature::TxBadDiff => self.tx_bad_diff,
            Feature::TxRetriesPerAttempt => self.tx_retries_per_attempt,
            Feature::TxSuccessPerAttempt => self.tx_success_per_attempt,
        }
    }

    fn feature_mut(&mut self, feature: Feature) -> &mut f64 {
        match feature {
            Feature::EstTxTput => &mut self.est_tx_tput,
            Feature::LinkSpeedMbps => &mut self.link_speed_mbps,
            Feature::Rssi => &mut self.rssi,
            Feature::CcaBusyRatio => &mut self.cca_busy_ratio,
            Feature::RadioOnFreqTimeDiff => &mut self.radio_on_freq_time_diff,
            Feature::RadioOnTimePerAttempt => &mut self.radio_on_time_per_attempt,
            Feature::RadioRxTimePerRxSuccess => &mut self.radio_rx_time_per_rx_success,
            Feature::RadioTxTimePerTxAttempt => &mut self.radio_tx_time_per_tx_attempt,
            Feature::RoamScanTimeDiff => &mut self.roam_scan_time_diff,
            Feature::RxSuccessDiff => &mut self.rx_success_diff,
            Feature::ScanTimeDiff => &mut self.scan_time_diff,
            Feature::TxAttempts => &mut self.tx_attempts,
            Feature::TxBadDiff => &mut self.tx_bad_diff,
            Feature::TxRetriesPerAttempt => &mut self.tx_retries_per_attempt,
            Feature::TxSuccessPerAttempt => &mut self.tx_success_per_attempt,
        }
    }

    /// The 15 model features in training order.
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        Feature::ALL.map(|f| self.feature(f))
    }
}
