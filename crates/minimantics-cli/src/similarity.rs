//! Similarity commands: `cosine`, `embedding-cosine` and `toefl`.

use crate::aggregate::load_source;
use crate::config::{self, write_row};
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use minimantics_core::config::{DEFAULT_KEY_FIELD, DEFAULT_NEIGHBOR_FIELD, DEFAULT_SUBKEY_FIELD};
use minimantics_core::error::RecordError;
use minimantics_core::record::{format_number, GroupTracker, RecordStream, StreamItem};
use minimantics_core::thesaurus::{Thesaurus, ToeflSolver};
use minimantics_core::vectors::{
    cosine_sparse, similarity_or_default, CombinePolicy, EmbeddingSet, KeyedVectorStore, WordSimilarity,
};
use minimantics_core::DiagnosticSink;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Header of the target pairs file.
const PAIR_FIELDS: [&str; 2] = ["target_a", "target_b"];

/// Column appended by `embedding-cosine`.
const EMBEDDING_COSINE_FIELD: &str = "w2v_cosine";

/// Label of embedding similarities in TOEFL output.
const EMBEDDING_LABEL: &str = "w2v";

/// Arguments of `mm cosine`.
#[derive(Args, Debug)]
pub struct CosineArgs {
    /// File with a `target_a`/`target_b` header and one pair per line
    pub target_pairs: PathBuf,

    /// Profile stream (`-` for stdin)
    pub input: PathBuf,

    /// Numeric column the vectors are built from
    pub column: String,
}

/// Arguments of `mm embedding-cosine`.
#[derive(Args, Debug)]
pub struct EmbeddingCosineArgs {
    /// Only score the first K neighbors of each target (input grouped by
    /// target); later rows are dropped
    #[arg(short = 'k', long)]
    pub best_k: Option<usize>,

    /// Column holding the target
    #[arg(long, default_value = DEFAULT_KEY_FIELD)]
    pub target_field: String,

    /// Column holding the neighbor
    #[arg(long, default_value = DEFAULT_NEIGHBOR_FIELD)]
    pub neighbor_field: String,

    /// Embeddings file (size line, then `word x1 ... xN`)
    pub embeddings: PathBuf,

    /// Thesaurus stream (default: stdin)
    pub input: Option<PathBuf>,
}

/// Arguments of `mm toefl`.
#[derive(Args, Debug)]
pub struct ToeflArgs {
    /// Also print the share of problems whose synonym had no similarity
    #[arg(short = 'a', long)]
    pub all_stats: bool,

    /// Print the similarity of every candidate
    #[arg(short = 's', long)]
    pub out_similarity: bool,

    /// Printed for a candidate with no similarity
    #[arg(short = 'd', long, default_value = "?")]
    pub default: String,

    /// Score candidates with embeddings instead of a thesaurus
    #[arg(long, conflicts_with_all = ["thesaurus", "column"])]
    pub embeddings: Option<PathBuf>,

    /// Problems file, `word syn0 syn1 ...` per line (default: stdin)
    #[arg(long)]
    pub problems: Option<PathBuf>,

    /// Thesaurus with `target`, `neighbor` and score columns
    #[arg(required_unless_present = "embeddings")]
    pub thesaurus: Option<PathBuf>,

    /// Score column of the thesaurus
    #[arg(required_unless_present = "embeddings")]
    pub column: Option<String>,
}

// ============================================================================
// Commands
// ============================================================================

/// Prints the sparse cosine of every target pair.
pub fn run_cosine(args: &CosineArgs) -> Result<()> {
    let pairs = load_pairs(&args.target_pairs)?;

    let mut sink = DiagnosticSink::new();
    let policy = CombinePolicy::new(DEFAULT_KEY_FIELD, DEFAULT_SUBKEY_FIELD).replacing();
    let mut store = KeyedVectorStore::new(policy);
    load_source(&mut store, Some(args.input.as_path()), &mut sink)?;
    let field = store
        .field_position(&args.column)
        .ok_or_else(|| RecordError::missing_column(&args.column, store.fields()))
        .with_context(|| format!("Bad header in {}", args.input.display()))?;

    let mut out = config::output();
    write_row(&mut out, &[PAIR_FIELDS[0], PAIR_FIELDS[1], "cosine"])?;
    for (a, b) in &pairs {
        let (Some(va), Some(vb)) = (store.vector(a), store.vector(b)) else {
            let missing = if store.vector(a).is_none() { a } else { b };
            sink.warn(format!("missing target `{}`; skipping pair ({}, {})", missing, a, b));
            continue;
        };
        let cosine = match cosine_sparse((a.as_str(), va), (b.as_str(), vb), field) {
            Ok(value) => value,
            Err(e) => {
                sink.warn_once(format!("{}; using 0.0", e));
                0.0
            }
        };
        let cosine = format_number(cosine);
        write_row(&mut out, &[a.as_str(), b.as_str(), cosine.as_str()])?;
    }
    out.flush()?;
    Ok(())
}

/// Appends the embedding cosine of target and neighbor to each row.
pub fn run_embedding_cosine(args: &EmbeddingCosineArgs) -> Result<()> {
    let embeddings = EmbeddingSet::load(config::open_file(&args.embeddings)?)
        .with_context(|| format!("Failed to load embeddings {}", args.embeddings.display()))?;
    info!(words = embeddings.len(), "loaded embeddings");

    let name = config::source_name(args.input.as_deref());
    let best_k = args.best_k.unwrap_or(usize::MAX);
    let mut sink = DiagnosticSink::new();
    let mut positions = None;
    let mut tracker = GroupTracker::new();
    let mut seen_in_group = 0usize;

    let mut out = config::output();
    for item in RecordStream::new(config::open_input(args.input.as_deref())?) {
        match item.with_context(|| format!("Failed to read {}", name))? {
            StreamItem::Comment(line) => writeln!(out, "{}", line)?,
            StreamItem::Header { line, schema } => {
                let target = schema.require(&args.target_field);
                let neighbor = schema.require(&args.neighbor_field);
                positions = Some(
                    target
                        .and_then(|t| neighbor.map(|n| (t, n)))
                        .with_context(|| format!("Bad header in {}", name))?,
                );
                writeln!(out, "{}\t{}", line, EMBEDDING_COSINE_FIELD)?;
            }
            StreamItem::Data(record) => {
                let Some((t, n)) = positions else {
                    continue;
                };
                let target = record.field(t).unwrap_or_default().to_string();
                if tracker.observe(&target) {
                    seen_in_group = 0;
                }
                seen_in_group += 1;
                if seen_in_group > best_k {
                    continue;
                }
                let neighbor = record.field(n).unwrap_or_default();
                let cosine = similarity_or_default(&embeddings, &target, neighbor, 0.0, &mut sink);
                let mut fields = record.fields().to_vec();
                fields.push(format!("{:.10}", cosine));
                write_row(&mut out, &fields)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Solves TOEFL problems with a thesaurus or with embeddings.
pub fn run_toefl(args: &ToeflArgs) -> Result<()> {
    if let Some(path) = &args.embeddings {
        let embeddings = EmbeddingSet::load(config::open_file(path)?)
            .with_context(|| format!("Failed to load embeddings {}", path.display()))?;
        return solve_problems(&embeddings, EMBEDDING_LABEL, args);
    }

    let (Some(path), Some(column)) = (&args.thesaurus, &args.column) else {
        anyhow::bail!("a thesaurus file and a score column are required without --embeddings");
    };
    let thesaurus = Thesaurus::load(config::open_file(path)?, column)
        .with_context(|| format!("Failed to load thesaurus {}", path.display()))?;
    info!(pairs = thesaurus.len(), "loaded thesaurus");
    solve_problems(&thesaurus, column, args)
}

fn solve_problems<S: WordSimilarity + ?Sized>(oracle: &S, label: &str, args: &ToeflArgs) -> Result<()> {
    let name = config::source_name(args.problems.as_deref());
    let reader = config::open_input(args.problems.as_deref())?;
    let mut solver = ToeflSolver::new(oracle);

    let mut out = config::output();
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", name))?;
        let Some(outcome) = solver.solve(i + 1, line.trim_end_matches('\r')) else {
            continue;
        };
        if args.out_similarity {
            writeln!(out, "{}", output::toefl_similarities(label, &outcome, &args.default))?;
        }
    }
    for line in output::toefl_summary(&solver.summary(), args.all_stats) {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

/// Reads the `target_a`/`target_b` pairs file.
fn load_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let name = path.display().to_string();
    let mut positions = None;
    let mut pairs = Vec::new();
    for item in RecordStream::new(config::open_file(path)?) {
        match item.with_context(|| format!("Failed to read {}", name))? {
            StreamItem::Comment(_) => {}
            StreamItem::Header { schema, .. } => {
                let found = schema
                    .require_all(&PAIR_FIELDS)
                    .with_context(|| format!("Bad header in {}", name))?;
                positions = Some((found[0], found[1]));
            }
            StreamItem::Data(record) => {
                if let Some((a, b)) = positions {
                    pairs.push((
                        record.field(a).unwrap_or_default().to_string(),
                        record.field(b).unwrap_or_default().to_string(),
                    ));
                }
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use minimantics_core::error::SimilarityError;

    /// Exact lookups in a pair table.
    struct PairTable(Vec<(&'static str, &'static str, f64)>);

    impl WordSimilarity for PairTable {
        fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
            self.0
                .iter()
                .find(|(x, y, _)| *x == a && *y == b)
                .map(|(_, _, s)| *s)
                .ok_or_else(|| SimilarityError::UnknownPair(a.to_string(), b.to_string()))
        }
    }

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        toefl: ToeflArgs,
    }

    #[test]
    fn test_load_pairs_requires_pair_header() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("pairs.tsv");
        std::fs::write(&good, "target_a\ttarget_b\nice\tcream\n").unwrap();
        assert_eq!(
            load_pairs(&good).unwrap(),
            vec![("ice".to_string(), "cream".to_string())]
        );

        let bad = dir.path().join("bad.tsv");
        std::fs::write(&bad, "first\tsecond\nice\tcream\n").unwrap();
        let err = load_pairs(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("target_a"));
    }

    #[test]
    fn test_toefl_args_need_thesaurus_or_embeddings() {
        assert!(Harness::try_parse_from(["mm"]).is_err());

        let harness = Harness::try_parse_from(["mm", "thes.tsv", "cosine", "-a"]).unwrap();
        assert_eq!(harness.toefl.column.as_deref(), Some("cosine"));
        assert!(harness.toefl.all_stats);
        assert_eq!(harness.toefl.default, "?");

        let harness = Harness::try_parse_from(["mm", "--embeddings", "w2v.txt"]).unwrap();
        assert!(harness.toefl.thesaurus.is_none());
    }

    #[test]
    fn test_solver_over_pair_table() {
        let table = PairTable(vec![("big", "large", 0.9), ("big", "small", 0.4)]);
        let mut solver = ToeflSolver::new(&table);
        let outcome = solver.solve(1, "big large small red").unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.similarities[2], None);
        assert_eq!(solver.summary().problems, 1);
    }
}
