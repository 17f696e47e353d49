//! Benchmarks for stream parsing, aggregation and evaluation.
//!
//! Run with: `cargo bench -p minimantics-core --bench evaluation`
//!
//! These benchmarks measure the throughput of:
//! - Record stream parsing
//! - Vector store loading and compound sums
//! - Score-table evaluation (correlations, threshold metrics, extremities)
//! - Energy measures over neighbor rank lists

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use minimantics_core::config::DEFAULT_ENERGY_THRESHOLDS;
use minimantics_core::evaluation::{
    EnergyScores, EvaluationOptions, RankEvaluation, ScoreTable, ScoreTableOptions,
};
use minimantics_core::record::{RecordStream, StreamItem};
use minimantics_core::vectors::{CombinePolicy, KeyedVectorStore};
use minimantics_core::DiagnosticSink;
use std::io::Cursor;

// =============================================================================
// Benchmark Configuration
// =============================================================================

/// Contexts per target in generated profiles.
const CONTEXTS_PER_TARGET: usize = 50;

// =============================================================================
// Test Data Generation
// =============================================================================

/// Deterministic pseudo-random value in [0, 1) for a seed.
fn seeded_value(seed: u64) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    hasher.finish() as f64 / u64::MAX as f64
}

/// Profiles file with `targets` targets and `CONTEXTS_PER_TARGET` contexts each.
fn profiles(targets: usize) -> String {
    let mut out = String::from("target\tcontext\tid_target\tcount\tpmi\n");
    for t in 0..targets {
        for c in 0..CONTEXTS_PER_TARGET {
            let seed = (t * CONTEXTS_PER_TARGET + c) as u64;
            out.push_str(&format!(
                "w{}\tc{}\t{}\t{}\t{:.4}\n",
                t,
                (c * 7 + t) % 500,
                t,
                1 + (seeded_value(seed) * 20.0) as usize,
                seeded_value(seed + 1_000_000) * 5.0
            ));
        }
    }
    out
}

/// Score table with `n` items; predictions are noisy copies of gold.
fn score_tables(n: usize) -> (String, String) {
    let mut gold = String::from("pair\tscore\n");
    let mut pred = String::from("pair\tcosine\n");
    for i in 0..n {
        let g = seeded_value(i as u64) * 5.0;
        gold.push_str(&format!("p{}\t{:.3}\n", i, g));
        pred.push_str(&format!("p{}\t{:.3}\n", i, g / 5.0 + seeded_value(i as u64 + 7) * 0.3));
    }
    (gold, pred)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_stream_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_parsing");
    for targets in [100, 1000] {
        let input = profiles(targets);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(targets), &input, |b, input| {
            b.iter(|| {
                let records = RecordStream::new(Cursor::new(input.as_bytes()))
                    .filter(|item| matches!(item, Ok(StreamItem::Data(_))))
                    .count();
                black_box(records)
            });
        });
    }
    group.finish();
}

fn bench_vector_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_store");
    for targets in [100, 1000] {
        let input = profiles(targets);
        group.throughput(Throughput::Elements((targets * CONTEXTS_PER_TARGET) as u64));
        group.bench_with_input(BenchmarkId::new("load_and_sum", targets), &input, |b, input| {
            b.iter(|| {
                let mut sink = DiagnosticSink::new();
                let mut store = KeyedVectorStore::new(CombinePolicy::default());
                store.begin_source("bench");
                for item in RecordStream::new(Cursor::new(input.as_bytes())) {
                    if let Ok(StreamItem::Data(record)) = item {
                        store.add_record(&record, &mut sink).unwrap();
                    }
                }
                black_box(store.sum("compound", &["w0", "w1", "w2"], &mut sink))
            });
        });
    }
    group.finish();
}

fn bench_rank_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_evaluation");
    group.sample_size(20);
    for n in [100, 1000] {
        let (gold, pred) = score_tables(n);
        let gold = ScoreTable::load(Cursor::new(gold), &ScoreTableOptions::default()).unwrap();
        let pred = ScoreTable::load(Cursor::new(pred), &ScoreTableOptions::default()).unwrap();
        let options = EvaluationOptions {
            gold_threshold: Some(2.5),
            ..Default::default()
        };

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &(gold, pred), |b, (gold, pred)| {
            b.iter(|| {
                let mut sink = DiagnosticSink::new();
                let reports = RankEvaluation::new(gold, pred, options.clone())
                    .evaluate(&mut sink)
                    .unwrap();
                black_box(reports)
            });
        });
    }
    group.finish();
}

fn bench_energy(c: &mut Criterion) {
    let ranks: Vec<usize> = (0..500).map(|i| 1 + (seeded_value(i) * 2000.0) as usize).collect();
    let threshold = DEFAULT_ENERGY_THRESHOLDS[0];
    c.bench_function("energy_500_ranks", |b| {
        b.iter(|| black_box(EnergyScores::compute(black_box(&ranks), threshold)))
    });
}

criterion_group!(
    benches,
    bench_stream_parsing,
    bench_vector_store,
    bench_rank_evaluation,
    bench_energy
);
criterion_main!(benches);
