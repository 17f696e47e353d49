//! Evaluation commands: `evalrank`, `rank-neighbors` and `eval-neighbors`.

use crate::config::{self, write_row};
use crate::output;
use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::Args;
use minimantics_core::config::{
    DEFAULT_ENERGY_THRESHOLDS, DEFAULT_EXTREMITIES, DEFAULT_PRECISION_AT, DEFAULT_PRECISION_CUTOFFS,
    DEFAULT_RANK_SEED, NEIGHBOR_FIELD, NEIGHBOR_SCORE_FIELD, NEIGHBOR_TARGET_FIELD, RANK_FIELD,
};
use minimantics_core::evaluation::{
    EvaluationOptions, NeighborEvaluation, NeighborEvaluationConfig, NeighborRanker, RankEvaluation, RankedNeighbor,
    ScoreTable, ScoreTableOptions,
};
use minimantics_core::record::{parse_records, RecordStream, StreamItem};
use minimantics_core::DiagnosticSink;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments of `mm evalrank`.
#[derive(Args, Debug)]
pub struct EvalRankArgs {
    /// Id column of the gold file (default: first column)
    #[arg(long)]
    pub gold_id_column: Option<String>,

    /// Id column of the prediction file (default: first column)
    #[arg(long)]
    pub pred_id_column: Option<String>,

    /// Gold value columns (default: second column)
    #[arg(long, num_args = 1..)]
    pub gold_value_columns: Option<Vec<String>>,

    /// Prediction value columns (default: second column)
    #[arg(long, num_args = 1..)]
    pub pred_value_columns: Option<Vec<String>>,

    /// Gold values at or above this are relevant (enables BestF1, AvgPrec,
    /// Prec@X and NDCG)
    #[arg(long)]
    pub gold_threshold: Option<f64>,

    /// Predictions are distances: lower means more similar
    #[arg(long)]
    pub inverted_scales: bool,

    /// Cut-off for Prec@X
    #[arg(long, default_value_t = DEFAULT_PRECISION_AT)]
    pub precision_at: usize,

    /// Items per extremity list (0 disables them)
    #[arg(long, default_value_t = DEFAULT_EXTREMITIES)]
    pub extremities: usize,

    /// Gold columns shown next to extremity items
    #[arg(long, num_args = 1..)]
    pub extremity_gold_info_columns: Vec<String>,

    /// Print the aligned lists and per-prefix measures
    #[arg(long)]
    pub debug: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Gold-standard scores
    pub gold_file: PathBuf,

    /// Predicted scores
    pub pred_file: PathBuf,
}

/// Arguments of `mm rank-neighbors`.
#[derive(Args, Debug)]
pub struct RankNeighborsArgs {
    /// Column holding the target
    #[arg(long, default_value = NEIGHBOR_TARGET_FIELD)]
    pub target_field: String,

    /// Column holding the neighbor
    #[arg(long, default_value = NEIGHBOR_FIELD)]
    pub neighbor_field: String,

    /// Column holding the similarity
    #[arg(long, default_value = NEIGHBOR_SCORE_FIELD)]
    pub score_field: String,

    /// Seed for shuffling tied neighbors
    #[arg(long, default_value_t = DEFAULT_RANK_SEED)]
    pub seed: u64,

    /// Thesaurus grouped by target (default: stdin)
    pub input: Option<PathBuf>,
}

/// Arguments of `mm eval-neighbors`.
#[derive(Args, Debug)]
pub struct EvalNeighborsArgs {
    /// Column holding the target
    #[arg(long, default_value = NEIGHBOR_TARGET_FIELD)]
    pub target_field: String,

    /// Column holding the neighbor rank
    #[arg(long, default_value = RANK_FIELD)]
    pub rank_field: String,

    /// Further columns that are not gold resources
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Rank thresholds of the energy measures (at least 1)
    #[arg(
        long,
        num_args = 1..,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..),
        default_values_t = DEFAULT_ENERGY_THRESHOLDS.to_vec()
    )]
    pub thresholds: Vec<usize>,

    /// Cut-offs of P@k
    #[arg(long, num_args = 1.., default_values_t = DEFAULT_PRECISION_CUTOFFS.to_vec())]
    pub cutoffs: Vec<usize>,

    /// Ranked thesaurus joined with gold resources (default: stdin)
    pub input: Option<PathBuf>,
}

// ============================================================================
// Commands
// ============================================================================

/// Compares predicted scores with gold scores.
pub fn run_evalrank(args: &EvalRankArgs) -> Result<()> {
    let gold_options = ScoreTableOptions::new(args.gold_id_column.clone(), args.gold_value_columns.clone());
    let pred_options = ScoreTableOptions::new(args.pred_id_column.clone(), args.pred_value_columns.clone())
        .inverted(args.inverted_scales);
    let gold = load_scores(&args.gold_file, &gold_options)?;
    let pred = load_scores(&args.pred_file, &pred_options)?;
    info!(gold = gold.len(), pred = pred.len(), "loaded score tables");

    let options = EvaluationOptions {
        gold_threshold: args.gold_threshold,
        precision_at: args.precision_at,
        extremities: args.extremities,
        info_columns: args.extremity_gold_info_columns.clone(),
        gold_name: file_name(&args.gold_file),
        pred_name: file_name(&args.pred_file),
    };
    let mut sink = DiagnosticSink::new();
    let reports = RankEvaluation::new(&gold, &pred, options)
        .evaluate(&mut sink)
        .context("Evaluation failed")?;

    let gold_name = args.gold_file.display().to_string();
    let pred_name = args.pred_file.display().to_string();
    let text = if args.json {
        output::format_evaluation_json(&gold_name, &pred_name, &reports)
    } else {
        output::format_evaluation(
            &gold_name,
            &pred_name,
            &reports,
            &args.extremity_gold_info_columns,
            args.debug,
        )
    };

    let mut out = config::output();
    writeln!(out, "{}", text)?;
    out.flush()?;
    Ok(())
}

/// Appends the rank of each neighbor within its target.
pub fn run_rank_neighbors(args: &RankNeighborsArgs) -> Result<()> {
    let name = config::source_name(args.input.as_deref());
    let mut ranker = NeighborRanker::new(
        &args.target_field,
        &args.neighbor_field,
        &args.score_field,
        args.seed,
    );
    let mut header_seen = false;

    let mut out = config::output();
    for item in RecordStream::new(config::open_input(args.input.as_deref())?) {
        match item.with_context(|| format!("Failed to read {}", name))? {
            StreamItem::Comment(line) => writeln!(out, "{}", line)?,
            StreamItem::Header { line, schema } => {
                ranker
                    .bind(&schema)
                    .with_context(|| format!("Bad header in {}", name))?;
                writeln!(out, "{}\t{}", line, RANK_FIELD)?;
                header_seen = true;
            }
            StreamItem::Data(record) => {
                let ranked = ranker
                    .push(record)
                    .with_context(|| format!("Bad record in {}", name))?;
                write_ranked(&mut out, &ranked)?;
            }
        }
    }
    if !header_seen {
        anyhow::bail!("{} has no header line", name);
    }
    write_ranked(&mut out, &ranker.finish())?;
    out.flush()?;
    Ok(())
}

/// Scores ranked neighbor lists against every gold resource.
pub fn run_eval_neighbors(args: &EvalNeighborsArgs) -> Result<()> {
    let name = config::source_name(args.input.as_deref());
    let mut excluded = NeighborEvaluationConfig::default().excluded;
    excluded.extend(args.exclude.iter().cloned());
    let mut evaluation = NeighborEvaluation::new(NeighborEvaluationConfig {
        target_field: args.target_field.clone(),
        rank_field: args.rank_field.clone(),
        excluded,
        thresholds: args.thresholds.clone(),
        cutoffs: args.cutoffs.clone(),
    });

    parse_records(config::open_input(args.input.as_deref())?, &mut evaluation)
        .with_context(|| format!("Failed to evaluate {}", name))?;
    info!(
        targets = evaluation.targets(),
        resources = evaluation.resources().count(),
        "collected neighbor ranks"
    );

    let report = evaluation.report();
    let mut out = config::output();
    write_row(&mut out, &output::neighbor_header(&args.target_field, &report))?;
    for row in output::neighbor_rows(&report) {
        write_row(&mut out, &row)?;
    }
    out.flush()?;

    let mut err = io::stderr().lock();
    for line in output::neighbor_averages(&report) {
        writeln!(err, "{}", line)?;
    }
    Ok(())
}

fn load_scores(path: &Path, options: &ScoreTableOptions) -> Result<ScoreTable> {
    ScoreTable::load(config::open_file(path)?, options)
        .with_context(|| format!("Failed to load scores from {}", path.display()))
}

fn write_ranked<W: Write>(out: &mut W, ranked: &[RankedNeighbor]) -> io::Result<()> {
    for neighbor in ranked {
        let mut fields = neighbor.record.fields().to_vec();
        fields.push(neighbor.rank.to_string());
        write_row(out, &fields)?;
    }
    Ok(())
}

/// Base name of a path, for warnings.
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct EvalRankHarness {
        #[command(flatten)]
        args: EvalRankArgs,
    }

    #[derive(Parser)]
    struct EvalNeighborsHarness {
        #[command(flatten)]
        args: EvalNeighborsArgs,
    }

    #[test]
    fn test_evalrank_defaults() {
        let harness = EvalRankHarness::parse_from(["mm", "gold.tsv", "pred.tsv"]);
        assert_eq!(harness.args.precision_at, 10);
        assert_eq!(harness.args.extremities, 5);
        assert_eq!(harness.args.gold_threshold, None);
        assert!(!harness.args.inverted_scales);
        assert!(harness.args.gold_value_columns.is_none());
    }

    #[test]
    fn test_evalrank_column_lists() {
        let harness = EvalRankHarness::parse_from([
            "mm",
            "--gold-value-columns",
            "sim",
            "rel",
            "--gold-threshold",
            "2.5",
            "--extremity-gold-info-columns",
            "pos",
            "--",
            "gold.tsv",
            "pred.tsv",
        ]);
        assert_eq!(
            harness.args.gold_value_columns,
            Some(vec!["sim".to_string(), "rel".to_string()])
        );
        assert_eq!(harness.args.gold_threshold, Some(2.5));
        assert_eq!(harness.args.extremity_gold_info_columns, vec!["pos"]);
        assert_eq!(harness.args.pred_file, PathBuf::from("pred.tsv"));
    }

    #[test]
    fn test_eval_neighbors_default_cutoffs() {
        let harness = EvalNeighborsHarness::parse_from(["mm"]);
        assert_eq!(harness.args.thresholds, vec![100]);
        assert_eq!(harness.args.cutoffs, vec![10, 100]);
        assert_eq!(harness.args.target_field, "verb1");
        assert!(harness.args.input.is_none());
    }

    #[test]
    fn test_eval_neighbors_rejects_zero_threshold() {
        assert!(EvalNeighborsHarness::try_parse_from(["mm", "--thresholds", "0"]).is_err());
        let harness = EvalNeighborsHarness::try_parse_from(["mm", "--thresholds", "1", "50"]).unwrap();
        assert_eq!(harness.args.thresholds, vec![1, 50]);
    }

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(file_name(Path::new("/data/gold/simlex.tsv")), "simlex.tsv");
    }

    #[test]
    fn test_load_scores_names_file_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.tsv");
        std::fs::write(&path, "id\tscore\na\tnot-a-number\n").unwrap();
        let err = load_scores(&path, &ScoreTableOptions::default()).unwrap_err();
        assert!(err.to_string().contains("pred.tsv"));
        assert!(format!("{:#}", err).contains("not-a-number"));
    }

    #[test]
    fn test_write_ranked_appends_rank() {
        let mut ranker = NeighborRanker::new("verb1", "verb2", "similarity", 0);
        let input = "verb1\tverb2\tsimilarity\neat\tdevour\t0.8\neat\tconsume\t0.9\n";
        let mut ranked = Vec::new();
        for item in RecordStream::new(std::io::Cursor::new(input)) {
            if let StreamItem::Data(record) = item.unwrap() {
                ranked.extend(ranker.push(record).unwrap());
            }
        }
        ranked.extend(ranker.finish());

        let mut out = Vec::new();
        write_ranked(&mut out, &ranked).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "eat\tconsume\t0.9\t1\neat\tdevour\t0.8\t2\n"
        );
    }
}
