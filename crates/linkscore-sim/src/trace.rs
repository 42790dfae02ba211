use linkscore::{LinkCounters, LinkIdentity, TelemetrySample};
use std::time::Duration;

/// Payload size assumed when converting link speed to airtime.
const FRAME_BITS: f64 = 1_500.0 * 8.0;
const BEACON_INTERVAL_MS: f64 = 102.4;

/// What the link looks like during one polling interval.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConditions {
    /// `linkscore::sample::INVALID_RSSI_DBM` models a missing measurement.
    pub rssi_dbm: i32,
    /// Successful transmissions per second.
    pub tx_pps: f64,
    /// Successful receptions per second.
    pub rx_pps: f64,
    /// Failed transmissions as a fraction of attempts.
    pub tx_failure_ratio: f64,
    /// Retries per successful transmission.
    pub tx_retry_ratio: f64,
    pub link_speed_mbps: i32,
    /// Fraction of on-channel time the medium was busy.
    pub cca_busy_fraction: f64,
}

impl Default for LinkConditions {
    fn default() -> Self {
        LinkConditions {
            rssi_dbm: -55,
            tx_pps: 20.0,
            rx_pps: 25.0,
            tx_failure_ratio: 0.01,
            tx_retry_ratio: 0.05,
            link_speed_mbps: 433,
            cca_busy_fraction: 0.2,
        }
    }
}

impl LinkConditions {
    /// Weak, quiet link.
    pub fn idle(rssi_dbm: i32) -> Self {
        LinkConditions {
            rssi_dbm,
            tx_pps: 0.1,
            rx_pps: 0.1,
            link_speed_mbps: 6,
            ..Default::default()
        }
    }

    /// Weak link that keeps moving traffic.
    pub fn busy(rssi_dbm: i32) -> Self {
        LinkConditions {
            rssi_dbm,
            tx_pps: 12.0,
            rx_pps: 15.0,
            tx_failure_ratio: 0.05,
            tx_retry_ratio: 0.3,
            link_speed_mbps: 24,
            ..Default::default()
        }
    }
}

/// Accumulates counters across intervals and stamps out samples.
///
/// Fractional packet counts carry over so that low rates still produce the
/// right long-run totals.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    identity: LinkIdentity,
    step: Duration,
    now_ms: u64,
    tx_success: f64,
    tx_retries: f64,
    tx_bad: f64,
    rx_success: f64,
    beacon_rx: f64,
    radio_on_ms: f64,
    radio_tx_ms: f64,
    radio_rx_ms: f64,
    cca_busy_ms: f64,
}

impl TraceBuilder {
    pub fn new(identity: LinkIdentity, step: Duration) -> Self {
        TraceBuilder {
            identity,
            step,
            now_ms: 0,
            tx_success: 0.0,
            tx_retries: 0.0,
            tx_bad: 0.0,
            rx_success: 0.0,
            beacon_rx: 0.0,
            radio_on_ms: 0.0,
            radio_tx_ms: 0.0,
            radio_rx_ms: 0.0,
            cca_busy_ms: 0.0,
        }
    }

    pub fn identity(&self) -> &LinkIdentity {
        &self.identity
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Move to another access point. Counters keep running, as they do on a
    /// real interface.
    pub fn roam(&mut self, identity: LinkIdentity) {
        self.identity = identity;
    }

    /// Skip `gap` without producing a sample (poller stall).
    pub fn stall(&mut self, gap: Duration) {
        self.now_ms += gap.as_millis() as u64;
    }

    /// Advance one step under `c` and return the resulting sample.
    pub fn push(&mut self, c: &LinkConditions) -> TelemetrySample {
        let step_ms = self.step.as_millis() as f64;
        let secs = self.step.as_secs_f64();
        self.now_ms += step_ms as u64;

        let tx_ok = c.tx_pps.max(0.0) * secs;
        let failure = c.tx_failure_ratio.clamp(0.0, 0.99);
        let tx_bad = tx_ok * failure / (1.0 - failure);
        let retries = tx_ok * c.tx_retry_ratio.max(0.0);
        let rx_ok = c.rx_pps.max(0.0) * secs;

        self.tx_success += tx_ok;
        self.tx_bad += tx_bad;
        self.tx_retries += retries;
        self.rx_success += rx_ok;
        self.beacon_rx += step_ms / BEACON_INTERVAL_MS;

        let airtime_ms = if c.link_speed_mbps > 0 {
            FRAME_BITS / (f64::from(c.link_speed_mbps) * 1_000.0)
        } else {
            0.0
        };
        let radio_on = step_ms * 0.95;
        self.radio_on_ms += radio_on;
        self.radio_tx_ms += (tx_ok + tx_bad + retries) * airtime_ms;
        self.radio_rx_ms += rx_ok * airtime_ms;
        self.cca_busy_ms += radio_on * c.cca_busy_fraction.clamp(0.0, 1.0);

        TelemetrySample {
            timestamp_ms: self.now_ms,
            identity: self.identity.clone(),
            rssi_dbm: c.rssi_dbm,
            tx_link_speed_mbps: c.link_speed_mbps,
            rx_link_speed_mbps: c.link_speed_mbps,
            counters: LinkCounters {
                tx_success: self.tx_success as u64,
                tx_retries: self.tx_retries as u64,
                tx_bad: self.tx_bad as u64,
                rx_success: self.rx_success as u64,
                beacon_rx: self.beacon_rx as u64,
                radio_on_time_ms: self.radio_on_ms as u64,
                radio_tx_time_ms: self.radio_tx_ms as u64,
                radio_rx_time_ms: self.radio_rx_ms as u64,
                scan_time_ms: 0,
                roam_scan_time_ms: 0,
                radio_on_freq_time_ms: self.radio_on_ms as u64,
                cca_busy_freq_time_ms: self.cca_busy_ms as u64,
            },
        }
    }
}
