//! # linkscore
//!
//! Continuous link-quality scoring for a wireless station connection.
//!
//! Periodic interface telemetry goes in; a bounded quality score and a set of
//! actuator decisions (scan, reachability probe, block the access point,
//! recommend leaving the link) come out. The engine never performs those
//! actions itself.
//!
//! ## Crate structure
//!
//! - [`sample`] — Raw telemetry snapshot and access-point identity
//! - [`derived`] — Per-interval deltas, derived rates and the model feature set
//! - [`window`] — Identity-scoped sliding window of derived samples
//! - [`features`] — Normalization table and windowed feature extraction
//! - [`model`] — Decision trees, ensembles and model bundle loading
//! - [`hysteresis`] — Score scaling and the breach/debounce decision machine
//! - [`ml`] — Model-driven scorer (window → features → ensemble → hysteresis)
//! - [`velocity`] — Heuristic scorer built on a Kalman-filtered rssi trend
//! - [`result`] — Score result, scorer trait and scorer selection
//! - [`config`] — TOML configuration with validated defaults
//! - [`error`] — Construction-time error types

pub mod config;
pub mod derived;
pub mod error;
pub mod features;
pub mod hysteresis;
pub mod ml;
pub mod model;
pub mod result;
pub mod sample;
pub mod velocity;
pub mod window;

pub use config::{ScorerConfig, ScorerKind};
pub use result::{ConnectedScorer, ScoreResult, Scorer};
pub use sample::{Bssid, LinkCounters, LinkIdentity, TelemetrySample};

/// Score reported when no model output is available.
pub const UNCLASSIFIED_SCORE: f64 = -1.0;
