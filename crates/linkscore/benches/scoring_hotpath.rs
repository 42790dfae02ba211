//! Per-sample scoring cost benchmarks for linkscore.
//!
//! Measures:
//! - FeatureExtractor.extract() over a full window
//! - TreeEnsemble.predict() for a 50-tree forest of depth 6
//! - MlScorer end to end (derive + extract + predict + hysteresis)
//! - VelocityScorer end to end
//!
//! Run with: cargo bench --package linkscore

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use linkscore::config::{ScorerConfig, VelocityConfig};
use linkscore::features::{FeatureExtractor, FeatureVector, NormalizationTable, FEATURE_VECTOR_LEN};
use linkscore::ml::MlScorer;
use linkscore::model::{Aggregation, DecisionTree, LoadedModel, TreeEnsemble, TreeNode};
use linkscore::velocity::VelocityScorer;
use linkscore::{Bssid, LinkCounters, LinkIdentity, TelemetrySample};

/// Complete binary tree of `depth` levels with splits cycling through the
/// feature vector.
fn full_tree(depth: u32, seed: usize) -> DecisionTree {
    let internal = (1usize << depth) - 1;
    let total = (1usize << (depth + 1)) - 1;
    let nodes = (0..total)
        .map(|i| {
            if i < internal {
                TreeNode::Split {
                    feature: (i * 7 + seed) % FEATURE_VECTOR_LEN,
                    threshold: ((i + seed) % 5) as f64 * 0.25 - 0.5,
                    left: 2 * i + 1,
                    right: 2 * i + 2,
                }
            } else {
                TreeNode::Leaf {
                    probability: ((i + seed) % 10) as f64 / 10.0,
                }
            }
        })
        .collect();
    DecisionTree::new(nodes).unwrap()
}

fn forest() -> TreeEnsemble {
    TreeEnsemble::new((0..50).map(|s| full_tree(6, s)).collect(), Aggregation::Mean)
}

fn normalization() -> NormalizationTable {
    let means = (0..FEATURE_VECTOR_LEN).map(|i| i as f64 * 0.1).collect();
    NormalizationTable::new(means, vec![2.0; FEATURE_VECTOR_LEN]).unwrap()
}

fn sample(i: u64) -> TelemetrySample {
    TelemetrySample {
        timestamp_ms: i * 3_000,
        identity: LinkIdentity::new(Bssid([2, 0, 0, 0, 0, 1]), 5180),
        rssi_dbm: -60 - (i % 15) as i32,
        tx_link_speed_mbps: 433,
        rx_link_speed_mbps: 390,
        counters: LinkCounters {
            tx_success: i * 30,
            tx_retries: i * 4,
            tx_bad: i,
            rx_success: i * 40,
            radio_on_time_ms: i * 2_900,
            radio_tx_time_ms: i * 300,
            radio_rx_time_ms: i * 900,
            radio_on_freq_time_ms: i * 2_800,
            cca_busy_freq_time_ms: i * 700,
            ..Default::default()
        },
    }
}

fn bench_predict(c: &mut Criterion) {
    let ensemble = forest();
    let mut fv = FeatureVector([0.0; FEATURE_VECTOR_LEN]);
    for (i, v) in fv.0.iter_mut().enumerate() {
        *v = (i as f64 * 0.37).sin();
    }
    c.bench_function("ensemble_predict_50x6", |b| {
        b.iter(|| black_box(ensemble.predict(black_box(&fv))));
    });
}

fn bench_extract(c: &mut Criterion) {
    let cfg = ScorerConfig::default();
    let model = LoadedModel::new(forest(), normalization());
    let mut scorer = MlScorer::new(&cfg, Some(model));
    for i in 0..5 {
        scorer.score(&sample(i), true);
    }
    let extractor = FeatureExtractor::new(Arc::new(normalization()));
    c.bench_function("feature_extract_window5", |b| {
        b.iter(|| black_box(extractor.extract(black_box(scorer.window()))));
    });
}

fn bench_ml_scorer(c: &mut Criterion) {
    let cfg = ScorerConfig::default();
    let model = LoadedModel::new(forest(), normalization());
    let mut scorer = MlScorer::new(&cfg, Some(model));
    let mut i = 0u64;
    c.bench_function("ml_scorer_generate_result", |b| {
        b.iter(|| {
            i += 1;
            black_box(scorer.generate_score_result(&sample(i), i * 3_000, true));
        });
    });
}

fn bench_velocity_scorer(c: &mut Criterion) {
    let mut scorer = VelocityScorer::new(VelocityConfig::default());
    let mut i = 0u64;
    c.bench_function("velocity_scorer_generate_result", |b| {
        b.iter(|| {
            i += 1;
            black_box(scorer.generate_score_result(&sample(i), i * 3_000, true));
        });
    });
}

criterion_group!(
    benches,
    bench_predict,
    bench_extract,
    bench_ml_scorer,
    bench_velocity_scorer,
);
criterion_main!(benches);
