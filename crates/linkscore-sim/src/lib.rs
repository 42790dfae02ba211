//! Telemetry simulation toolkit for linkscore integration testing.
//!
//! Turns per-interval link conditions (signal, traffic, failures) into the
//! cumulative telemetry samples a station poller would report, either from a
//! seeded random walk or from scripted scenarios.

pub mod link_scenarios;
pub mod scenario;
pub mod trace;

pub mod test_util;
