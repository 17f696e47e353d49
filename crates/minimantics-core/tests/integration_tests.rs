//! End-to-end tests for the aggregation and evaluation pipelines.
//!
//! These tests exercise full workflows from readers to reports:
//! 1. Aggregation: record stream → vector store → sum/normalize → rows
//! 2. Similarity: vector store → sparse cosine; embeddings → TOEFL
//! 3. Evaluation: score tables → alignment → metrics; ranked neighbors → measures
//!
//! Run with: `cargo test -p minimantics-core --test integration_tests`

use minimantics_core::config::NOTHING_KEY;
use minimantics_core::evaluation::{
    EvaluationOptions, NeighborEvaluation, NeighborEvaluationConfig, NeighborRanker, RankEvaluation,
    RankedNeighbor, ScoreTable, ScoreTableOptions,
};
use minimantics_core::record::{parse_records, Record, RecordHandler, RecordStream, Schema, StreamItem};
use minimantics_core::statistics::GroupedStatistics;
use minimantics_core::thesaurus::ToeflSolver;
use minimantics_core::vectors::{
    cosine_sparse, CombinePolicy, Combination, EmbeddingSet, KeyedVectorStore, NormMode,
};
use minimantics_core::{DiagnosticSink, RecordError};
use std::io::{BufReader, Cursor, Write};
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

const PROFILES: &str = "# profiles built from a toy corpus\n\
                        target\tcontext\tid_target\tcount\tpmi\n\
                        ice\tcold\t1\t4\t1.5\n\
                        ice\twhite\t1\t2\t0.5\n\
                        cream\twhite\t2\t3\t1.0\n\
                        cream\tsweet\t2\t6\t2.0\n\
                        tape\tred\t3\t1\t0.2\n";

/// Loads a tabular string into a store through the record stream.
fn load_store(store: &mut KeyedVectorStore, sink: &mut DiagnosticSink, name: &str, input: &str) {
    store.begin_source(name);
    for item in RecordStream::new(Cursor::new(input)) {
        if let StreamItem::Data(record) = item.unwrap() {
            store.add_record(&record, sink).unwrap();
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_sum_compound_vectors() {
    let mut sink = DiagnosticSink::new();
    let combinations = Combination::load(Cursor::new(
        "compound\thead\tmodifier\nice_cream\tice\tcream\nred_tape\ttape\t@NOTHING\n",
    ))
    .unwrap();

    let mut store = KeyedVectorStore::new(CombinePolicy::default());
    store.retain_only(Combination::keys_of_interest(&combinations));
    load_store(&mut store, &mut sink, "profiles.tsv", PROFILES);
    store.apply_combinations(&combinations, &mut sink);

    let count = store.field_position("count").unwrap();
    let compound = store.vector("ice_cream").unwrap();
    assert_eq!(compound.len(), 3);
    assert_eq!(compound.value("white", count), Some(5.0));
    assert_eq!(compound.value("cold", count), Some(4.0));
    assert_eq!(compound.value("sweet", count), Some(6.0));

    assert_eq!(store.vector("red_tape").unwrap().value("red", count), Some(1.0));
    assert!(!sink.contains(NOTHING_KEY));
}

#[test]
fn test_sum_is_commutative() {
    let mut sink = DiagnosticSink::new();
    let mut store = KeyedVectorStore::new(CombinePolicy::default());
    load_store(&mut store, &mut sink, "profiles.tsv", PROFILES);

    let pmi = store.field_position("pmi").unwrap();
    let ab = store.sum("x", &["ice", "cream"], &mut sink);
    let ba = store.sum("x", &["cream", "ice"], &mut sink);
    for subkey in ["cold", "white", "sweet"] {
        assert_eq!(ab.value(subkey, pmi), ba.value(subkey, pmi));
    }
}

#[test]
fn test_merge_files_and_normalize() {
    let mut sink = DiagnosticSink::new();
    let mut store = KeyedVectorStore::new(CombinePolicy::default());
    load_store(&mut store, &mut sink, "a.tsv", PROFILES);
    load_store(
        &mut store,
        &mut sink,
        "b.tsv",
        "target\tcontext\tcount\nice\tcold\t0\nice\tslippery\t1\n",
    );
    assert!(sink.is_empty());

    store.normalize(&["count"], NormMode::L2).unwrap();
    let count = store.field_position("count").unwrap();
    let ice = store.vector("ice").unwrap();
    let norm: f64 = ice
        .subkeys()
        .filter_map(|s| ice.value(s, count))
        .map(|v| v * v)
        .sum();
    assert!((norm - 1.0).abs() < 1e-9);

    // the second file has no pmi; its new cells render the placeholder
    let rows: Vec<Vec<String>> = store
        .rows()
        .filter(|(k, s, _)| *k == "ice" && *s == "slippery")
        .map(|(_, _, cell)| store.render(cell))
        .collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains(&"?".to_string()));
}

#[test]
fn test_sparse_cosine_between_stored_vectors() {
    let mut sink = DiagnosticSink::new();
    let mut store = KeyedVectorStore::new(CombinePolicy::default().replacing());
    load_store(&mut store, &mut sink, "profiles.tsv", PROFILES);

    let count = store.field_position("count").unwrap();
    let ice = store.vector("ice").unwrap();
    let cream = store.vector("cream").unwrap();
    let tape = store.vector("tape").unwrap();

    // ice = {cold: 4, white: 2}, cream = {white: 3, sweet: 6}
    let expected = 6.0 / (20f64.sqrt() * 45f64.sqrt());
    let cos = cosine_sparse(("ice", ice), ("cream", cream), count).unwrap();
    assert!((cos - expected).abs() < 1e-12);
    assert_eq!(cosine_sparse(("ice", ice), ("tape", tape), count).unwrap(), 0.0);
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_grouped_statistics_over_stream() {
    let mut stats = GroupedStatistics::new(vec!["target".into()], "count");
    let mut summaries = Vec::new();
    for item in RecordStream::new(Cursor::new(PROFILES)) {
        match item.unwrap() {
            StreamItem::Header { schema, .. } => stats.bind(&schema).unwrap(),
            StreamItem::Data(record) => summaries.extend(stats.observe(&record).unwrap()),
            StreamItem::Comment(_) => {}
        }
    }
    summaries.extend(stats.finish());

    let means: Vec<f64> = summaries.iter().map(|s| s.mean).collect();
    assert_eq!(means, vec![3.0, 4.5, 1.0]);
    assert!(summaries[2].sample_stddev.is_infinite());
    assert!((stats.global().mean().unwrap() - 8.5 / 3.0).abs() < 1e-12);
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_evalrank_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let gold_path = dir.path().join("gold.tsv");
    let pred_path = dir.path().join("pred.tsv");
    std::fs::File::create(&gold_path)
        .unwrap()
        .write_all(b"compound\tscore\na\t1\nb\t1\nc\t1\nx\t0\ny\t0\n")
        .unwrap();
    std::fs::File::create(&pred_path)
        .unwrap()
        .write_all(b"compound\tcosine\na\t0.9\nx\t0.8\nb\t0.7\ny\t0.1\n")
        .unwrap();

    let open = |p: &std::path::Path| BufReader::new(std::fs::File::open(p).unwrap());
    let gold = ScoreTable::load(open(&gold_path), &ScoreTableOptions::default()).unwrap();
    let pred = ScoreTable::load(open(&pred_path), &ScoreTableOptions::default()).unwrap();

    let options = EvaluationOptions {
        gold_threshold: Some(1.0),
        precision_at: 1,
        ..Default::default()
    };
    let mut sink = DiagnosticSink::new();
    let reports = RankEvaluation::new(&gold, &pred, options).evaluate(&mut sink).unwrap();
    let metrics = reports[0].threshold.as_ref().unwrap();

    assert_eq!(metrics.precision_at_value, Some(1.0));
    assert_eq!(metrics.precisions[2], 0.5);
    assert_eq!(metrics.precisions[4], 0.5);
    assert_eq!(metrics.total_positives, 2);
    assert!(sink.contains("`c`"));

    let json = serde_json::to_value(&reports[0]).unwrap();
    assert_eq!(json["gold_column"], "score");
    assert_eq!(json["predictions"], 4);
    assert!(json["threshold"].get("precisions").is_none());
}

#[test]
fn test_inverted_predictions_restore_correlation() {
    let gold = ScoreTable::load(
        Cursor::new("id\tv\na\t1\nb\t2\nc\t3\nd\t4\n"),
        &ScoreTableOptions::default(),
    )
    .unwrap();
    let distances = "id\tdistance\na\t0.9\nb\t0.5\nc\t0.4\nd\t0.1\n";
    let pred = ScoreTable::load(Cursor::new(distances), &ScoreTableOptions::default().inverted(true))
        .unwrap();

    let mut sink = DiagnosticSink::new();
    let reports = RankEvaluation::new(&gold, &pred, EvaluationOptions::default())
        .evaluate(&mut sink)
        .unwrap();
    assert!((reports[0].spearman.coefficient - 1.0).abs() < 1e-12);
    assert!((reports[0].kendall.coefficient - 1.0).abs() < 1e-12);
}

/// Ranks a thesaurus and feeds the ranked rows, joined with one gold
/// resource column, to a neighbor evaluation.
struct RankThenEvaluate {
    ranker: NeighborRanker,
    gold: Vec<(&'static str, &'static str)>,
    schema: Option<Arc<Schema>>,
    evaluation: NeighborEvaluation,
}

impl RankThenEvaluate {
    fn forward(&mut self, ranked: Vec<RankedNeighbor>) -> Result<(), RecordError> {
        let Some(schema) = &self.schema else {
            return Ok(());
        };
        for neighbor in ranked {
            let target = neighbor.record.fields()[0].clone();
            let candidate = neighbor.record.fields()[1].clone();
            let listed = self.gold.iter().any(|&(t, c)| t == target && c == candidate);
            let mut fields = neighbor.record.into_fields();
            fields.push(neighbor.rank.to_string());
            fields.push(if listed { "1" } else { "0" }.to_string());
            let record = Record::new(0, Arc::clone(schema), fields)?;
            self.evaluation.add(&record)?;
        }
        Ok(())
    }
}

impl RecordHandler for RankThenEvaluate {
    type Error = RecordError;

    fn handle_header(&mut self, _line: &str, schema: &Arc<Schema>) -> Result<(), RecordError> {
        self.ranker.bind(schema)?;
        let mut names = schema.names().to_vec();
        names.push("rank".into());
        names.push("gold".into());
        let joined = Arc::new(Schema::from_header(names));
        self.evaluation.bind(&joined)?;
        self.schema = Some(joined);
        Ok(())
    }

    fn handle_data(&mut self, record: Record) -> Result<(), RecordError> {
        let ranked = self.ranker.push(record)?;
        self.forward(ranked)
    }

    fn end(&mut self) -> Result<(), RecordError> {
        let ranked = self.ranker.finish();
        self.forward(ranked)
    }
}

#[test]
fn test_rank_and_evaluate_neighbors() {
    let thesaurus = "verb1\tverb2\tsimilarity\n\
                     eat\tconsume\t0.7\n\
                     eat\teat\t1.0\n\
                     eat\trun\t0.2\n\
                     eat\tdevour\t0.6\n\
                     walk\tstroll\t0.5\n\
                     walk\tamble\t0.8\n";
    let mut pipeline = RankThenEvaluate {
        ranker: NeighborRanker::new("verb1", "verb2", "similarity", 3),
        gold: vec![("eat", "consume"), ("eat", "devour"), ("walk", "stroll")],
        schema: None,
        evaluation: NeighborEvaluation::new(NeighborEvaluationConfig::default()),
    };
    parse_records(Cursor::new(thesaurus), &mut pipeline).unwrap();

    let report = pipeline.evaluation.report();
    let column = |name: &str| report.columns.iter().position(|c| c == name).unwrap();
    let targets: Vec<&str> = report.rows.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(targets, vec!["eat", "walk"]);

    // eat: consume rank 1, devour rank 2 -> perfect list
    let eat = &report.rows[0].values;
    assert_eq!(eat[column("gold-refs")], 2.0);
    assert!((eat[column("gold-energy@100")] - 1.0).abs() < 1e-12);
    assert_eq!(eat[column("gold-MAP")], 1.0);

    // walk: stroll ranked 2nd behind amble
    let walk = &report.rows[1].values;
    assert_eq!(walk[column("gold-MAP")], 0.5);
    assert_eq!(walk[column("gold-Rprec")], 0.0);
}

// ============================================================================
// Thesaurus / embeddings
// ============================================================================

#[test]
fn test_toefl_with_embeddings() {
    let embeddings = "4 2\n\
                      big 1.0 0.1\n\
                      large 0.9 0.2\n\
                      small -1.0 0.3\n\
                      tiny -0.9 0.1\n";
    let set = EmbeddingSet::load(Cursor::new(embeddings)).unwrap();
    let mut solver = ToeflSolver::new(&set);

    let problems = ["big large small tiny", "small tiny big unknown", "big unknown large"];
    let outcomes: Vec<bool> = problems
        .iter()
        .enumerate()
        .filter_map(|(i, p)| solver.solve(i + 1, p))
        .map(|o| o.correct)
        .collect();

    assert_eq!(outcomes, vec![true, true, false]);
    let summary = solver.summary();
    assert_eq!(summary.problems, 3);
    assert_eq!(summary.empty, 1);
}

#[test]
fn test_malformed_input_stops_stream() {
    let mut stream = RecordStream::new(Cursor::new("target\tcontext\tcount\nice\tcold\nice\twhite\t1\n"));

    assert!(matches!(stream.next(), Some(Ok(StreamItem::Header { .. }))));
    let err = stream.next().unwrap().unwrap_err();
    assert!(matches!(err, RecordError::Malformed { line: 2, expected: 3, actual: 2 }));
    assert!(stream.next().is_none());
}
