//! Low-pass filtered packet rates from cumulative counters.

use crate::sample::{LinkCounters, TelemetrySample};

/// Filtered packets per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PacketRates {
    pub tx_success_pps: f64,
    pub tx_retries_pps: f64,
    pub tx_bad_pps: f64,
    pub rx_success_pps: f64,
}

impl PacketRates {
    /// Share of tx attempts that went through, `None` with no tx activity.
    pub fn tx_success_probability(&self) -> Option<f64> {
        let total = self.tx_success_pps + self.tx_bad_pps + self.tx_retries_pps;
        (total > 0.0).then(|| self.tx_success_pps / total)
    }
}

/// Exponentially weighted packet rates. Each interval of length `dt` keeps
/// `exp(-dt / τ)` of the previous rate.
#[derive(Debug, Clone)]
pub struct PacketRateTracker {
    time_constant_ms: f64,
    rates: PacketRates,
    last: Option<(u64, LinkCounters)>,
}

impl PacketRateTracker {
    pub fn new(time_constant_ms: f64) -> Self {
        PacketRateTracker {
            time_constant_ms,
            rates: PacketRates::default(),
            last: None,
        }
    }

    pub fn rates(&self) -> &PacketRates {
        &self.rates
    }

    pub fn reset(&mut self) {
        self.rates = PacketRates::default();
        self.last = None;
    }

    /// Fold in a sample. The first sample, a non-advancing timestamp or a
    /// counter that went backwards restarts the rates from zero.
    pub fn update(&mut self, sample: &TelemetrySample) {
        let now = sample.timestamp_ms;
        let cur = sample.counters;
        let prev = self.last.replace((now, cur));

        let Some((then, old)) = prev else {
            self.rates = PacketRates::default();
            return;
        };
        let diffs = (
            cur.tx_success.checked_sub(old.tx_success),
            cur.tx_retries.checked_sub(old.tx_retries),
            cur.tx_bad.checked_sub(old.tx_bad),
            cur.rx_success.checked_sub(old.rx_success),
        );
        let (Some(tx_success), Some(tx_retries), Some(tx_bad), Some(rx_success)) = diffs else {
            self.rates = PacketRates::default();
            return;
        };
        if now <= then {
            self.rates = PacketRates::default();
            return;
        }

        let dt = (now - then) as f64;
        let keep = (-dt / self.time_constant_ms).exp();
        let blend = |old: f64, count: u64| old * keep + (1.0 - keep) * count as f64 * 1_000.0 / dt;

        self.rates = PacketRates {
            tx_success_pps: blend(self.rates.tx_success_pps, tx_success),
            tx_retries_pps: blend(self.rates.tx_retries_pps, tx_retries),
            tx_bad_pps: blend(self.rates.tx_bad_pps, tx_bad),
            rx_success_pps: blend(self.rates.rx_success_pps, rx_success),
        };
    }
}
