//! # Telemetry Samples
//!
//! One snapshot of station link-layer statistics, pushed in by the external
//! poller on a fixed cadence (order of seconds). Counters are cumulative since
//! the interface came up; the scorers diff consecutive snapshots themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rssi reported by the driver when no measurement is available.
pub const INVALID_RSSI_DBM: i32 = -127;

/// Radio band, derived from the channel center frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    TwoGhz,
    FiveGhz,
    SixGhz,
}

impl Band {
    pub fn from_frequency_mhz(frequency_mhz: u32) -> Option<Band> {
        match frequency_mhz {
            2400..=2500 => Some(Band::TwoGhz),
            4900..=5900 => Some(Band::FiveGhz),
            5925..=7125 => Some(Band::SixGhz),
            _ => None,
        }
    }
}

/// 48-bit access point MAC address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bssid(pub [u8; 6]);

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for Bssid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.trim().split(':');
        for byte in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("BSSID `{s}` has fewer than 6 octets"))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|e| format!("BSSID `{s}` has invalid octet `{part}`: {e}"))?;
        }
        if parts.next().is_some() {
            return Err(format!("BSSID `{s}` has more than 6 octets"));
        }
        Ok(Bssid(out))
    }
}

impl TryFrom<String> for Bssid {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bssid> for String {
    fn from(value: Bssid) -> Self {
        value.to_string()
    }
}

/// Access point identity. A change of either field is a roam or reconnect
/// and invalidates all per-connection history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkIdentity {
    pub bssid: Bssid,
    pub frequency_mhz: u32,
}

impl LinkIdentity {
    pub fn new(bssid: Bssid, frequency_mhz: u32) -> Self {
        LinkIdentity {
            bssid,
            frequency_mhz,
        }
    }

    pub fn band(&self) -> Option<Band> {
        Band::from_frequency_mhz(self.frequency_mhz)
    }
}

impl fmt::Display for LinkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}MHz", self.bssid, self.frequency_mhz)
    }
}

/// Cumulative link-layer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkCounters {
    pub tx_success: u64,
    pub tx_retries: u64,
    pub tx_bad: u64,
    pub rx_success: u64,
    pub beacon_rx: u64,
    pub radio_on_time_ms: u64,
    pub radio_tx_time_ms: u64,
    pub radio_rx_time_ms: u64,
    pub scan_time_ms: u64,
    pub roam_scan_time_ms: u64,
    /// Radio-on time on the current channel.
    pub radio_on_freq_time_ms: u64,
    /// Clear-channel-assessment busy time on the current channel.
    pub cca_busy_freq_time_ms: u64,
}

/// Immutable telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySample {
    /// Monotonic capture time in milliseconds.
    pub timestamp_ms: u64,
    pub identity: LinkIdentity,
    pub rssi_dbm: i32,
    /// Tx link speed in Mbps. Negative when unknown.
    pub tx_link_speed_mbps: i32,
    /// Rx link speed in Mbps. Negative when unknown.
    pub rx_link_speed_mbps: i32,
    pub counters: LinkCounters,
}

impl Default for TelemetrySample {
    fn default() -> Self {
        TelemetrySample {
            timestamp_ms: 0,
            identity: LinkIdentity::default(),
            rssi_dbm: INVALID_RSSI_DBM,
            tx_link_speed_mbps: -1,
            rx_link_speed_mbps: -1,
            counters: LinkCounters::default(),
        }
    }
}

impl TelemetrySample {
    /// Rssi, or `None` when the driver reported the invalid sentinel.
    pub fn rssi(&self) -> Option<i32> {
        (self.rssi_dbm != INVALID_RSSI_DBM).then_some(self.rssi_dbm)
    }

    pub fn band(&self) -> Option<Band> {
        self.identity.band()
    }

    /// Milliseconds elapsed since `earlier`, or `None` if time went backwards.
    pub fn gap_since(&self, earlier: &TelemetrySample) -> Option<u64> {
        self.timestamp_ms.checked_sub(earlier.timestamp_ms)
    }
}
