use std::sync::Once;

use linkscore::{ConnectedScorer, ScoreResult, TelemetrySample};

static TRACING: Once = Once::new();

/// Install a test-friendly `tracing` subscriber once per process. Honors
/// `RUST_LOG`, defaulting to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Feed `samples` through `scorer` as the primary link, using each sample's
/// timestamp as the scoring time.
pub fn run_primary<S: ConnectedScorer + ?Sized>(
    scorer: &mut S,
    samples: &[TelemetrySample],
) -> Vec<ScoreResult> {
    samples
        .iter()
        .map(|s| scorer.generate_score_result(s, s.timestamp_ms, true))
        .collect()
}
