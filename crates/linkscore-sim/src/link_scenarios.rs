//! # Scripted Link Scenarios
//!
//! Pre-built telemetry traces for the situations the scorers must get right:
//! - **Stable link**: strong signal, steady traffic
//! - **Walk-away fade**: signal ramps down past the exit level and stays there
//! - **Idle weak link**: weak signal with almost no traffic
//! - **Busy weak link**: the same weak signal carrying sustained traffic
//! - **Roam**: a degrading link hands over to a fresh access point
//!
//! Each produces a `Vec<TelemetrySample>` on a fixed polling cadence.

use crate::trace::{LinkConditions, TraceBuilder};
use linkscore::{Bssid, LinkIdentity, TelemetrySample};
use std::time::Duration;

fn steps(duration: Duration, step: Duration) -> u64 {
    (duration.as_secs_f64() / step.as_secs_f64()).ceil() as u64
}

pub fn default_identity() -> LinkIdentity {
    LinkIdentity::new(Bssid([2, 0, 0, 0, 0, 1]), 5180)
}

/// Strong, steady link.
#[derive(Debug, Clone)]
pub struct StableLinkScenario {
    pub duration: Duration,
    pub step: Duration,
    pub identity: LinkIdentity,
    pub conditions: LinkConditions,
}

impl Default for StableLinkScenario {
    fn default() -> Self {
        StableLinkScenario {
            duration: Duration::from_secs(60),
            step: Duration::from_secs(3),
            identity: default_identity(),
            conditions: LinkConditions::default(),
        }
    }
}

impl StableLinkScenario {
    pub fn samples(&self) -> Vec<TelemetrySample> {
        let mut trace = TraceBuilder::new(self.identity.clone(), self.step);
        (0..steps(self.duration, self.step))
            .map(|_| trace.push(&self.conditions))
            .collect()
    }
}

/// User walks away from the access point: rssi ramps linearly from
/// `start_rssi_dbm` to `end_rssi_dbm`, then holds. Traffic thins out and
/// failures grow as the signal drops.
#[derive(Debug, Clone)]
pub struct WalkAwayScenario {
    pub step: Duration,
    pub identity: LinkIdentity,
    /// Time at full signal before the fade.
    pub hold: Duration,
    pub fade: Duration,
    /// Time at the faded level.
    pub tail: Duration,
    pub start_rssi_dbm: i32,
    pub end_rssi_dbm: i32,
}

impl Default for WalkAwayScenario {
    fn default() -> Self {
        WalkAwayScenario {
            step: Duration::from_secs(3),
            identity: default_identity(),
            hold: Duration::from_secs(15),
            fade: Duration::from_secs(30),
            tail: Duration::from_secs(45),
            start_rssi_dbm: -55,
            end_rssi_dbm: -82,
        }
    }
}

impl WalkAwayScenario {
    pub fn samples(&self) -> Vec<TelemetrySample> {
        let mut trace = TraceBuilder::new(self.identity.clone(), self.step);
        let hold = steps(self.hold, self.step);
        let fade = steps(self.fade, self.step).max(1);
        let total = hold + fade + steps(self.tail, self.step);
        let span = f64::from(self.end_rssi_dbm - self.start_rssi_dbm);

        (0..total)
            .map(|i| {
                let progress = (i.saturating_sub(hold) as f64 / fade as f64).min(1.0);
                let rssi = f64::from(self.start_rssi_dbm) + span * progress;
                let conditions = LinkConditions {
                    rssi_dbm: rssi.round() as i32,
                    tx_pps: 20.0 * (1.0 - 0.9 * progress),
                    rx_pps: 25.0 * (1.0 - 0.9 * progress),
                    tx_failure_ratio: 0.01 + 0.4 * progress,
                    tx_retry_ratio: 0.05 + 0.9 * progress,
                    link_speed_mbps: if progress < 0.5 { 433 } else { 12 },
                    cca_busy_fraction: 0.2 + 0.3 * progress,
                };
                trace.push(&conditions)
            })
            .collect()
    }
}

/// Weak signal below the 2.4 GHz exit level with near-zero traffic.
#[derive(Debug, Clone)]
pub struct IdleWeakScenario {
    pub samples: u64,
    pub step: Duration,
    pub identity: LinkIdentity,
    pub rssi_dbm: i32,
}

impl Default for IdleWeakScenario {
    fn default() -> Self {
        IdleWeakScenario {
            samples: 10,
            step: Duration::from_secs(3),
            identity: LinkIdentity::new(Bssid([2, 0, 0, 0, 0, 1]), 2412),
            rssi_dbm: -85,
        }
    }
}

impl IdleWeakScenario {
    pub fn samples(&self) -> Vec<TelemetrySample> {
        let mut trace = TraceBuilder::new(self.identity.clone(), self.step);
        let c = LinkConditions::idle(self.rssi_dbm);
        (0..self.samples).map(|_| trace.push(&c)).collect()
    }
}

/// Same weak signal as [`IdleWeakScenario`], but the link keeps carrying
/// traffic successfully.
#[derive(Debug, Clone)]
pub struct BusyWeakScenario {
    pub samples: u64,
    pub step: Duration,
    pub identity: LinkIdentity,
    pub rssi_dbm: i32,
}

impl Default for BusyWeakScenario {
    fn default() -> Self {
        let idle = IdleWeakScenario::default();
        BusyWeakScenario {
            samples: idle.samples,
            step: idle.step,
            identity: idle.identity,
            rssi_dbm: idle.rssi_dbm,
        }
    }
}

impl BusyWeakScenario {
    pub fn samples(&self) -> Vec<TelemetrySample> {
        let mut trace = TraceBuilder::new(self.identity.clone(), self.step);
        let c = LinkConditions::busy(self.rssi_dbm);
        (0..self.samples).map(|_| trace.push(&c)).collect()
    }
}

/// A link degrades, then the station roams to a strong access point.
#[derive(Debug, Clone)]
pub struct RoamScenario {
    pub step: Duration,
    pub from: LinkIdentity,
    pub to: LinkIdentity,
    /// Samples on the old access point at `weak_rssi_dbm`.
    pub weak_samples: u64,
    /// Samples on the new access point at `strong_rssi_dbm`.
    pub strong_samples: u64,
    pub weak_rssi_dbm: i32,
    pub strong_rssi_dbm: i32,
}

impl Default for RoamScenario {
    fn default() -> Self {
        RoamScenario {
            step: Duration::from_secs(3),
            from: default_identity(),
            to: LinkIdentity::new(Bssid([2, 0, 0, 0, 0, 2]), 5745),
            weak_samples: 8,
            strong_samples: 8,
            weak_rssi_dbm: -80,
            strong_rssi_dbm: -52,
        }
    }
}

impl RoamScenario {
    /// Index of the first sample on the new access point.
    pub fn roam_index(&self) -> usize {
        self.weak_samples as usize
    }

    pub fn samples(&self) -> Vec<TelemetrySample> {
        let mut trace = TraceBuilder::new(self.from.clone(), self.step);
        let weak = LinkConditions {
            tx_failure_ratio: 0.3,
            tx_retry_ratio: 0.8,
            link_speed_mbps: 12,
            ..LinkConditions::idle(self.weak_rssi_dbm)
        };
        let strong = LinkConditions {
            rssi_dbm: self.strong_rssi_dbm,
            ..Default::default()
        };

        let mut out: Vec<TelemetrySample> = (0..self.weak_samples)
            .map(|_| trace.push(&weak))
            .collect();
        trace.roam(self.to.clone());
        out.extend((0..self.strong_samples).map(|_| trace.push(&strong)));
        out
    }
}
