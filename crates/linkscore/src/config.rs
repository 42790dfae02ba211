//! # Scorer Configuration
//!
//! Every threshold the scorers use. Loaded from TOML through an all-optional
//! `*Input` layer which [`ScorerConfigInput::resolve`] fills from defaults and
//! validates. An empty document yields [`ScorerConfig::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sample::Band;

pub const CONFIG_VERSION: u32 = 1;

/// Model id of the random-forest usability classifier.
pub const RANDOM_FOREST_MODEL_ID: u32 = 7;

/// Which scorer drives decisions for a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Windowed features + tree ensemble.
    #[default]
    Ml,
    /// Kalman-filtered rssi trend with packet-rate heuristics.
    Velocity,
}

// ─── Resolved config ────────────────────────────────────────────────────────

/// Telemetry cadence, used to decide when the window has gone stale.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Nominal interval between polls.
    pub polling_interval: Duration,
    /// Delay between triggering a poll and receiving its stats.
    pub polling_delay: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            polling_interval: Duration::from_millis(3_000),
            polling_delay: Duration::from_millis(3_000),
        }
    }
}

impl WindowConfig {
    /// Largest gap between consecutive samples that keeps the window intact.
    pub fn max_gap_ms(&self) -> u64 {
        (self.polling_interval + self.polling_delay).as_millis() as u64
    }
}

/// Packet-count gates for derived rates.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationConfig {
    /// Tx attempts at or below this (with no success) are too few to trust.
    pub tx_pkt_count_threshold: f64,
    /// Rx successes at or below this leave the rx link speed undefined.
    pub rx_pkt_count_threshold: f64,
    /// Tx or rx successes at or above this saturate the per-attempt ratios.
    pub success_pkt_count_very_high_threshold: f64,
    /// Minimum radio-on-frequency time for a CCA ratio to be computed.
    pub min_cca_duration_ms: f64,
    /// Use the global CCA mean instead of the measured busy ratio.
    pub default_mean_cca_busy_ratio: bool,
    /// Exclude own rx time from the CCA busy time.
    pub subtract_rx_time_from_cca_busy_time: bool,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        DerivationConfig {
            tx_pkt_count_threshold: 3.0,
            rx_pkt_count_threshold: 3.0,
            success_pkt_count_very_high_threshold: 45.0,
            min_cca_duration_ms: 50.0,
            default_mean_cca_busy_ratio: true,
            subtract_rx_time_from_cca_busy_time: false,
        }
    }
}

/// Thresholds for declaring a link provably bad, and for requesting a
/// reachability probe on weak, slow links.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkQualityConfig {
    /// Rssi at or below which the link is bad regardless of traffic.
    pub low_rssi_dbm: i32,
    /// Minimum tx failures in one interval for a traffic-based verdict.
    pub tx_bad_threshold: f64,
    /// Link is bad when `tx_bad * ratio >= tx_success`.
    pub tx_success_to_bad_ratio: f64,
    pub link_speed_low_mbps: i32,
    pub link_speed_very_low_mbps: i32,
}

impl Default for LinkQualityConfig {
    fn default() -> Self {
        LinkQualityConfig {
            low_rssi_dbm: -86,
            tx_bad_threshold: 1_000.0,
            tx_success_to_bad_ratio: 6.0,
            link_speed_low_mbps: 18,
            link_speed_very_low_mbps: 6,
        }
    }
}

/// Hysteresis decision thresholds for the model-driven scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct HysteresisConfig {
    /// Score separating usable from unusable.
    pub transition_score: f64,
    /// Upper edge of the "healthy but sliding" band used for trend detection.
    pub max_health_score: f64,
    /// Ceiling for scaled scores.
    pub max_score: f64,
    /// Raw-score threshold mapped onto `transition_score`.
    pub threshold: f64,
    /// Added to `threshold` while the link is flagged degraded.
    pub threshold_hysteresis: f64,
    /// Raw score below which a background scan is requested (falling edge).
    pub scan_triggering_threshold: f64,
    /// Rssi below which breaches count and blocking is allowed.
    pub breach_rssi_dbm: i32,
    /// Rssi at or below which the debounce window is skipped.
    pub no_hysteresis_rssi_dbm: i32,
    /// Debounce before the usable recommendation may change.
    pub debounce: Duration,
    /// Minimum time since the last breach before blocking the access point.
    pub block_wait: Duration,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        HysteresisConfig {
            transition_score: 50.0,
            max_health_score: 60.0,
            max_score: 100.0,
            threshold: 10.0,
            threshold_hysteresis: 70.0,
            scan_triggering_threshold: 10.0,
            breach_rssi_dbm: -67,
            no_hysteresis_rssi_dbm: -81,
            debounce: Duration::from_millis(5_000),
            block_wait: Duration::from_millis(29_000),
        }
    }
}

/// Exit/entry rssi pair for one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RssiThresholds {
    /// Rssi at which the link should be left.
    pub exit_dbm: i32,
    /// Rssi at which the link is considered good enough to join.
    pub entry_dbm: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRssiThresholds {
    pub two_ghz: RssiThresholds,
    pub five_ghz: RssiThresholds,
    pub six_ghz: RssiThresholds,
}

impl Default for BandRssiThresholds {
    fn default() -> Self {
        BandRssiThresholds {
            two_ghz: RssiThresholds {
                exit_dbm: -83,
                entry_dbm: -80,
            },
            five_ghz: RssiThresholds {
                exit_dbm: -80,
                entry_dbm: -77,
            },
            six_ghz: RssiThresholds {
                exit_dbm: -77,
                entry_dbm: -74,
            },
        }
    }
}

impl BandRssiThresholds {
    /// Thresholds for `band`. Unknown bands use the 5 GHz pair.
    pub fn for_band(&self, band: Option<Band>) -> RssiThresholds {
        match band {
            Some(Band::TwoGhz) => self.two_ghz,
            Some(Band::SixGhz) => self.six_ghz,
            Some(Band::FiveGhz) | None => self.five_ghz,
        }
    }
}

/// Heuristic (velocity-based) scorer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityConfig {
    pub rssi: BandRssiThresholds,
    /// Score at the exit rssi on a primary link.
    pub transition_score: i32,
    /// Transition score used on secondary links.
    pub secondary_transition_score: i32,
    /// Ceiling for reported scores.
    pub max_score: i32,
    /// How far ahead the rssi trend is extrapolated.
    pub horizon: Duration,
    /// Standard deviation of a single rssi reading (dB).
    pub rssi_std_db: f64,
    /// Standard deviation of modelled rssi acceleration (dB/s²).
    pub accel_std: f64,
    /// Time constant of the packet-rate low-pass filter.
    pub rate_time_constant: Duration,
    /// Tx and rx success rate needed before the threshold may adapt.
    pub min_pps_for_success: f64,
    /// Per-sample threshold adaptation step (dB).
    pub threshold_step_db: f64,
    /// Largest downward threshold adaptation (dB).
    pub max_threshold_adjustment_db: f64,
    /// Tx and rx rates that prove a busy link is still usable.
    pub busy_link_pps: f64,
    /// Hold time below transition after a downward breach.
    pub keep_below_transition: Duration,
    /// Reachability probe aggressiveness, 0 (off) to 10.
    pub nud_knob: u8,
    /// Decay constant for the post-probe bar.
    pub nud_time_constant: Duration,
    /// Adjusted score below which a scan is requested.
    pub low_score_scan_threshold: i32,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        VelocityConfig {
            rssi: BandRssiThresholds::default(),
            transition_score: 50,
            secondary_transition_score: 55,
            max_score: 60,
            horizon: Duration::from_secs(15),
            rssi_std_db: 2.0,
            accel_std: 0.02,
            rate_time_constant: Duration::from_millis(3_000),
            min_pps_for_success: 2.0,
            threshold_step_db: 0.5,
            max_threshold_adjustment_db: 7.0,
            busy_link_pps: 2.0,
            keep_below_transition: Duration::from_millis(9_000),
            nud_knob: 8,
            nud_time_constant: Duration::from_millis(30_000),
            low_score_scan_threshold: 55,
        }
    }
}

/// Complete scorer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    pub version: u32,
    pub kind: ScorerKind,
    pub model_id: u32,
    pub window: WindowConfig,
    pub derivation: DerivationConfig,
    pub link_quality: LinkQualityConfig,
    pub hysteresis: HysteresisConfig,
    pub velocity: VelocityConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig {
            version: CONFIG_VERSION,
            kind: ScorerKind::default(),
            model_id: RANDOM_FOREST_MODEL_ID,
            window: WindowConfig::default(),
            derivation: DerivationConfig::default(),
            link_quality: LinkQualityConfig::default(),
            hysteresis: HysteresisConfig::default(),
            velocity: VelocityConfig::default(),
        }
    }
}

impl ScorerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(ScorerConfig::default());
        }
        let parsed: ScorerConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    /// Read and resolve a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scorer config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("resolving scorer config {}", path.display()))
    }
}

// ─── TOML input layer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScorerConfigInput {
    pub version: u32,
    pub kind: Option<ScorerKind>,
    pub model_id: Option<u32>,
    pub window: WindowConfigInput,
    pub derivation: DerivationConfigInput,
    pub link_quality: LinkQualityConfigInput,
    pub hysteresis: HysteresisConfigInput,
    pub velocity: VelocityConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WindowConfigInput {
    pub polling_interval_ms: Option<u64>,
    pub polling_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DerivationConfigInput {
    pub tx_pkt_count_threshold: Option<f64>,
    pub rx_pkt_count_threshold: Option<f64>,
    pub success_pkt_count_very_high_threshold: Option<f64>,
    pub min_cca_duration_ms: Option<f64>,
    pub default_mean_cca_busy_ratio: Option<bool>,
    pub subtract_rx_time_from_cca_busy_time: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkQualityConfigInput {
    pub low_rssi_dbm: Option<i32>,
    pub tx_bad_threshold: Option<f64>,
    pub tx_success_to_bad_ratio: Option<f64>,
    pub link_speed_low_mbps: Option<i32>,
    pub link_speed_very_low_mbps: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HysteresisConfigInput {
    pub transition_score: Option<f64>,
    pub max_health_score: Option<f64>,
    pub max_score: Option<f64>,
    pub threshold: Option<f64>,
    pub threshold_hysteresis: Option<f64>,
    pub scan_triggering_threshold: Option<f64>,
    pub breach_rssi_dbm: Option<i32>,
    pub no_hysteresis_rssi_dbm: Option<i32>,
    pub debounce_ms: Option<u64>,
    pub block_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RssiThresholdsInput {
    pub exit_dbm: Option<i32>,
    pub entry_dbm: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VelocityConfigInput {
    pub two_ghz: RssiThresholdsInput,
    pub five_ghz: RssiThresholdsInput,
    pub six_ghz: RssiThresholdsInput,
    pub transition_score: Option<i32>,
    pub secondary_transition_score: Option<i32>,
    pub max_score: Option<i32>,
    pub horizon_secs: Option<f64>,
    pub rssi_std_db: Option<f64>,
    pub accel_std: Option<f64>,
    pub rate_time_constant_ms: Option<u64>,
    pub min_pps_for_success: Option<f64>,
    pub busy_link_pps: Option<f64>,
    pub keep_below_transition_ms: Option<u64>,
    pub nud_knob: Option<u8>,
    pub low_score_scan_threshold: Option<i32>,
}

impl RssiThresholdsInput {
    fn resolve(self, default: RssiThresholds) -> RssiThresholds {
        RssiThresholds {
            exit_dbm: self.exit_dbm.unwrap_or(default.exit_dbm),
            entry_dbm: self.entry_dbm.unwrap_or(default.entry_dbm),
        }
    }
}

impl ScorerConfigInput {
    pub fn resolve(self) -> Result<ScorerConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let w = WindowConfig::default();
        let window = WindowConfig {
            polling_interval: self
                .window
                .polling_interval_ms
                .map_or(w.polling_interval, Duration::from_millis),
            polling_delay: self
                .window
                .polling_delay_ms
                .map_or(w.polling_delay, Duration::from_millis),
        };
        if window.polling_interval.is_zero() {
            return Err(ConfigError::invalid(
                "window.polling_interval_ms",
                "must be positive",
            ));
        }

        let d = DerivationConfig::default();
        let i = self.derivation;
        let derivation = DerivationConfig {
            tx_pkt_count_threshold: i.tx_pkt_count_threshold.unwrap_or(d.tx_pkt_count_threshold),
            rx_pkt_count_threshold: i.rx_pkt_count_threshold.unwrap_or(d.rx_pkt_count_threshold),
            success_pkt_count_very_high_threshold: i
                .success_pkt_count_very_high_threshold
                .unwrap_or(d.success_pkt_count_very_high_threshold),
            min_cca_duration_ms: i.min_cca_duration_ms.unwrap_or(d.min_cca_duration_ms),
            default_mean_cca_busy_ratio: i
                .default_mean_cca_busy_ratio
                .unwrap_or(d.default_mean_cca_busy_ratio),
            subtract_rx_time_from_cca_busy_time: i
                .subtract_rx_time_from_cca_busy_time
                .unwrap_or(d.subtract_rx_time_from_cca_busy_time),
        };

        let q = LinkQualityConfig::default();
        let i = self.link_quality;
        let link_quality = LinkQualityConfig {
            low_rssi_dbm: i.low_rssi_dbm.unwrap_or(q.low_rssi_dbm),
            tx_bad_threshold: i.tx_bad_threshold.unwrap_or(q.tx_bad_threshold),
            tx_success_to_bad_ratio: i
                .tx_success_to_bad_ratio
                .unwrap_or(q.tx_success_to_bad_ratio),
            link_speed_low_mbps: i.link_speed_low_mbps.unwrap_or(q.link_speed_low_mbps),
            link_speed_very_low_mbps: i
                .link_speed_very_low_mbps
                .unwrap_or(q.link_speed_very_low_mbps),
        };

        let h = HysteresisConfig::default();
        let i = self.hysteresis;
        let hysteresis = HysteresisConfig {
            transition_score: i.transition_score.unwrap_or(h.transition_score),
            max_health_score: i.max_health_score.unwrap_or(h.max_health_score),
            max_score: i.max_score.unwrap_or(h.max_score),
            threshold: i.threshold.unwrap_or(h.threshold),
            threshold_hysteresis: i.threshold_hysteresis.unwrap_or(h.threshold_hysteresis),
            scan_triggering_threshold: i
                .scan_triggering_threshold
                .unwrap_or(h.scan_triggering_threshold),
            breach_rssi_dbm: i.breach_rssi_dbm.unwrap_or(h.breach_rssi_dbm),
            no_hysteresis_rssi_dbm: i.no_hysteresis_rssi_dbm.unwrap_or(h.no_hysteresis_rssi_dbm),
            debounce: i.debounce_ms.map_or(h.debounce, Duration::from_millis),
            block_wait: i.block_wait_ms.map_or(h.block_wait, Duration::from_millis),
        };
        if !(hysteresis.threshold > 0.0) {
            return Err(ConfigError::invalid("hysteresis.threshold", "must be positive"));
        }
        if hysteresis.threshold_hysteresis < 0.0 {
            return Err(ConfigError::invalid(
                "hysteresis.threshold_hysteresis",
                "must not be negative",
            ));
        }
        if hysteresis.max_score < hysteresis.transition_score {
            return Err(ConfigError::invalid(
                "hysteresis.max_score",
                "must be at least transition_score",
            ));
        }

        let v = VelocityConfig::default();
        let i = self.velocity;
        let velocity = VelocityConfig {
            rssi: BandRssiThresholds {
                two_ghz: i.two_ghz.resolve(v.rssi.two_ghz),
                five_ghz: i.five_ghz.resolve(v.rssi.five_ghz),
                six_ghz: i.six_ghz.resolve(v.rssi.six_ghz),
            },
            transition_score: i.transition_score.unwrap_or(v.transition_score),
            secondary_transition_score: i
                .secondary_transition_score
                .unwrap_or(v.secondary_transition_score),
            max_score: i.max_score.unwrap_or(v.max_score),
            horizon: match i.horizon_secs {
                Some(s) if s.is_finite() && s >= 0.0 => Duration::from_secs_f64(s),
                Some(s) => {
                    return Err(ConfigError::invalid(
                        "velocity.horizon_secs",
                        format!("{s} is not a non-negative number"),
                    ));
                }
                None => v.horizon,
            },
            rssi_std_db: i.rssi_std_db.unwrap_or(v.rssi_std_db),
            accel_std: i.accel_std.unwrap_or(v.accel_std),
            rate_time_constant: i
                .rate_time_constant_ms
                .map_or(v.rate_time_constant, Duration::from_millis),
            min_pps_for_success: i.min_pps_for_success.unwrap_or(v.min_pps_for_success),
            threshold_step_db: v.threshold_step_db,
            max_threshold_adjustment_db: v.max_threshold_adjustment_db,
            busy_link_pps: i.busy_link_pps.unwrap_or(v.busy_link_pps),
            keep_below_transition: i
                .keep_below_transition_ms
                .map_or(v.keep_below_transition, Duration::from_millis),
            nud_knob: i.nud_knob.unwrap_or(v.nud_knob),
            nud_time_constant: v.nud_time_constant,
            low_score_scan_threshold: i
                .low_score_scan_threshold
                .unwrap_or(v.low_score_scan_threshold),
        };
        if velocity.nud_knob > 10 {
            return Err(ConfigError::invalid(
                "velocity.nud_knob",
                format!("{} is outside 0..=10", velocity.nud_knob),
            ));
        }
        if velocity.max_score < 0 {
            return Err(ConfigError::invalid("velocity.max_score", "must not be negative"));
        }
        if velocity.max_score < velocity.transition_score
            || velocity.max_score < velocity.secondary_transition_score
        {
            return Err(ConfigError::invalid(
                "velocity.max_score",
                "must be at least transition_score and secondary_transition_score",
            ));
        }
        if !(velocity.rssi_std_db > 0.0) {
            return Err(ConfigError::invalid("velocity.rssi_std_db", "must be positive"));
        }
        if velocity.rate_time_constant.is_zero() {
            return Err(ConfigError::invalid(
                "velocity.rate_time_constant_ms",
                "must be positive",
            ));
        }

        Ok(ScorerConfig {
            version,
            kind: self.kind.unwrap_or_default(),
            model_id: self.model_id.unwrap_or(RANDOM_FOREST_MODEL_ID),
            window,
            derivation,
            link_quality,
            hysteresis,
            velocity,
        })
    }
}
