//! Output formatting for evaluation reports and tool rows.
//!
//! `evalrank` supports both a line-oriented text report and JSON for
//! scripting. Every other tool prints tab-separated rows.

use minimantics_core::evaluation::{ColumnPairReport, Correlation, NeighborReport, RankPair, TieCount};
use minimantics_core::record::format_number;
use minimantics_core::statistics::{GroupSummary, RunningStatistics};
use minimantics_core::thesaurus::{ToeflOutcome, ToeflSummary};
use serde::Serialize;

/// Significant digits of the Wilcoxon p-value.
const PVALUE_DIGITS: usize = 5;

// ============================================================================
// evalrank
// ============================================================================

/// JSON output structure for `evalrank`.
#[derive(Serialize)]
pub struct JsonEvaluation<'a> {
    pub gold: &'a str,
    pub pred: &'a str,
    pub reports: &'a [ColumnPairReport],
}

/// Formats an evaluation as JSON.
pub fn format_evaluation_json(gold: &str, pred: &str, reports: &[ColumnPairReport]) -> String {
    let output = JsonEvaluation { gold, pred, reports };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an evaluation as the line-oriented text report.
///
/// # Arguments
///
/// * `gold` / `pred` - Source names shown in the preamble
/// * `reports` - One report per (gold column, prediction column) pair
/// * `info_columns` - Gold columns shown next to extremity items
/// * `debug` - Also print the aligned lists and per-prefix measures
pub fn format_evaluation(
    gold: &str,
    pred: &str,
    reports: &[ColumnPairReport],
    info_columns: &[String],
    debug: bool,
) -> String {
    let mut lines = vec![format!("## Gold: `{}`", gold), format!("## Pred: `{}`", pred)];

    for report in reports {
        lines.push(format!(
            "\n==> Scores between columns `{}` (gold) and `{}` (pred)",
            report.gold_column, report.pred_column
        ));
        lines.push(format_correlation("PearsonR", &report.pearson));
        lines.push(format_correlation("SpearmanRho", &report.spearman));
        lines.push(format_correlation("KendallTau", &report.kendall));

        if let Some(threshold) = &report.threshold {
            if debug {
                lines.push(debug_list("PredList", &report.ranked.pred));
                lines.push(debug_list("GoldList", &report.ranked.gold));
                lines.push(debug_list("PrecisList", threshold.precisions.get(1..).unwrap_or_default()));
                lines.push(debug_list("F1List", threshold.f1s.get(1..).unwrap_or_default()));
            }
            lines.push(format!(
                "BestF1: {:.5}  (@{}, where prec={})",
                threshold.best_f1.score,
                threshold.best_f1.n,
                format_number(threshold.best_f1.precision)
            ));
            lines.push(format!("AvgPrec: {:.5}", threshold.average_precision));
            if let Some(p) = threshold.precision_at_value {
                lines.push(format!("Prec@{}: {:.5}", threshold.precision_at, p));
            }
            lines.push(format!(
                "NDCG: {:.5}  (DCG={:.5})",
                threshold.ndcg.ndcg, threshold.ndcg.dcg
            ));
        }

        lines.push(format!(
            "Wilcoxon: W={}; pvalue={}",
            format_number(report.wilcoxon.statistic),
            format_significant(report.wilcoxon.p_value, PVALUE_DIGITS)
        ));
        lines.push(format!("NPreds: {}", report.predictions));
        lines.push(format!("PredTies: {}", format_ties(&report.ties)));

        if let Some(extremities) = &report.extremities {
            let header: String = info_columns.iter().map(|c| format!("[{}]", c)).collect();
            for (name, pairs) in extremities.named() {
                lines.push(format!("{}[Gold->Pred]{}: {}", name, header, format_pairs(pairs)));
            }
        }
    }
    lines.join("\n")
}

fn format_correlation(name: &str, correlation: &Correlation) -> String {
    format!(
        "{}: {:.5}  (deviation={:.5})",
        name, correlation.coefficient, correlation.p_value
    )
}

fn debug_list(name: &str, values: &[f64]) -> String {
    let joined: Vec<String> = values.iter().map(|v| format!("{:.2}", v)).collect();
    format!("DEBUG:{}: {}", name, joined.join(" "))
}

fn format_ties(ties: &[TieCount]) -> String {
    if ties.is_empty() {
        return "NoTies".to_string();
    }
    ties.iter()
        .map(|t| format!("{}(x{})", format_number(t.value), t.count))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_pairs(pairs: &[RankPair]) -> String {
    pairs
        .iter()
        .map(|p| {
            let info: String = p.info.iter().map(|i| format!("[{}]", i)).collect();
            format!("{}[{}->{}]{}", p.key, p.gold_rank, p.pred_rank, info)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats `value` with `digits` significant digits, switching to
/// exponent notation for very small or large magnitudes and dropping
/// trailing zeros (`0.031`, `1.2e-07`).
pub fn format_significant(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    let exponent = value.abs().log10().floor() as i32;

    if exponent < -4 || exponent >= digits as i32 {
        let formatted = format!("{:.*e}", digits - 1, value);
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

// ============================================================================
// Tool rows
// ============================================================================

/// Header of the grouped statistics table.
pub fn statistics_header(discriminate: &[String]) -> Vec<String> {
    let mut header = discriminate.to_vec();
    header.extend(["NLines", "ArithAvg", "SampleStdDev"].map(str::to_string));
    header
}

/// One grouped statistics row.
pub fn statistics_row(summary: &GroupSummary) -> Vec<String> {
    let mut row = summary.key.clone();
    row.push(summary.count.to_string());
    row.push(format_number(summary.mean));
    row.push(format_number(summary.sample_stddev));
    row
}

/// The `GLOBAL:` line over group means, if any group was closed.
pub fn statistics_global(global: &RunningStatistics) -> Option<String> {
    let mean = global.mean().ok()?;
    let stddev = global.sample_stddev().ok()?;
    Some(format!(
        "GLOBAL:\t{}\t{}\t{}",
        global.count(),
        format_number(mean),
        format_number(stddev)
    ))
}

/// Header of the neighbor evaluation table.
pub fn neighbor_header(target_field: &str, report: &NeighborReport) -> Vec<String> {
    let mut header = vec![target_field.to_string()];
    header.extend(report.columns.iter().cloned());
    header
}

/// Neighbor evaluation rows; reference counts print as integers.
pub fn neighbor_rows(report: &NeighborReport) -> Vec<Vec<String>> {
    report
        .rows
        .iter()
        .map(|row| {
            let mut fields = vec![row.target.clone()];
            fields.extend(
                report
                    .columns
                    .iter()
                    .zip(&row.values)
                    .map(|(column, &v)| format_measure(column, v)),
            );
            fields
        })
        .collect()
}

/// `Average {column}: {value}` lines.
pub fn neighbor_averages(report: &NeighborReport) -> Vec<String> {
    report
        .averages
        .iter()
        .map(|(column, v)| format!("Average {}: {}", column, format_number(*v)))
        .collect()
}

fn format_measure(column: &str, value: f64) -> String {
    if column.ends_with("-refs") && value.is_finite() {
        format!("{}", value as u64)
    } else {
        format_number(value)
    }
}

/// Per-candidate similarities of one TOEFL problem, `placeholder` for a
/// missing one.
pub fn toefl_similarities(column: &str, outcome: &ToeflOutcome, placeholder: &str) -> String {
    let values: Vec<String> = outcome
        .similarities
        .iter()
        .map(|s| match s {
            Some(v) => format!("{:.4}", v),
            None => placeholder.to_string(),
        })
        .collect();
    format!("{}(line {}):\t{}", column, outcome.line, values.join("\t"))
}

/// Accuracy and empty-rate lines of a TOEFL run.
pub fn toefl_summary(summary: &ToeflSummary, all: bool) -> Vec<String> {
    let mut lines = vec![format!("Accuracy: {:.2}%", summary.accuracy())];
    if all {
        lines.push(format!("Empty: {:.2}%", summary.empty_rate()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use minimantics_core::diagnostics::DiagnosticSink;
    use minimantics_core::evaluation::{EvaluationOptions, RankEvaluation, ScoreTable, ScoreTableOptions, TargetMeasures};
    use std::io::Cursor;

    fn reports(threshold: Option<f64>) -> Vec<ColumnPairReport> {
        let gold = "id\tscore\tpos\na\t3\tNN\nb\t2\tVB\nc\t1\tNN\nd\t0\tJJ\n";
        let pred = "id\tcos\na\t0.9\nb\t0.5\nc\t0.5\nd\t0.1\n";
        let gold = ScoreTable::load(Cursor::new(gold), &ScoreTableOptions::new(None, Some(vec!["score".into()]))).unwrap();
        let pred = ScoreTable::load(Cursor::new(pred), &ScoreTableOptions::default()).unwrap();
        let options = EvaluationOptions {
            gold_threshold: threshold,
            precision_at: 2,
            extremities: 2,
            info_columns: vec!["pos".to_string()],
            ..EvaluationOptions::default()
        };
        let mut sink = DiagnosticSink::new();
        RankEvaluation::new(&gold, &pred, options)
            .evaluate(&mut sink)
            .unwrap()
    }

    #[test]
    fn test_format_evaluation_text() {
        let text = format_evaluation("gold.tsv", "pred.tsv", &reports(Some(2.0)), &["pos".to_string()], false);
        assert!(text.starts_with("## Gold: `gold.tsv`\n## Pred: `pred.tsv`"));
        assert!(text.contains("==> Scores between columns `score` (gold) and `cos` (pred)"));
        assert!(text.contains("PearsonR: "));
        assert!(text.contains("Prec@2: 1.00000"));
        assert!(text.contains("NPreds: 4"));
        assert!(text.contains("PredTies: 0.5(x2)"));
        assert!(text.contains("LowGold[Gold->Pred][pos]: d[1->1][JJ]"));
        assert!(!text.contains("DEBUG:"));
    }

    #[test]
    fn test_format_evaluation_without_threshold() {
        let text = format_evaluation("g", "p", &reports(None), &[], true);
        assert!(!text.contains("BestF1"));
        // debug lists belong to the threshold measures
        assert!(!text.contains("DEBUG:"));
        assert!(text.contains("Wilcoxon: W="));
    }

    #[test]
    fn test_format_evaluation_debug_lists() {
        let text = format_evaluation("g", "p", &reports(Some(2.0)), &[], true);
        assert!(text.contains("DEBUG:PredList: 0.90 0.50 0.50 0.10"));
        assert!(text.contains("DEBUG:PrecisList: 1.00"));
    }

    #[test]
    fn test_format_evaluation_json() {
        let json = format_evaluation_json("gold.tsv", "pred.tsv", &reports(Some(2.0)));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["gold"], "gold.tsv");
        assert_eq!(value["reports"][0]["pred_column"], "cos");
        assert_eq!(value["reports"][0]["predictions"], 4);
        assert!(value["reports"][0]["threshold"]["best_f1"].is_object());
    }

    #[test]
    fn test_format_significant() {
        assert_eq!(format_significant(0.0312341, 5), "0.031234");
        assert_eq!(format_significant(0.5, 5), "0.5");
        assert_eq!(format_significant(1.23e-7, 5), "1.23e-07");
        assert_eq!(format_significant(123456.0, 5), "1.2346e+05");
        assert_eq!(format_significant(0.0, 5), "0");
        assert_eq!(format_significant(f64::NAN, 5), "NaN");
    }

    #[test]
    fn test_statistics_rows() {
        let summary = GroupSummary {
            key: vec!["dog".to_string()],
            count: 2,
            mean: 1.5,
            sample_stddev: f64::INFINITY,
        };
        assert_eq!(
            statistics_header(&["target".to_string()]),
            vec!["target", "NLines", "ArithAvg", "SampleStdDev"]
        );
        assert_eq!(statistics_row(&summary), vec!["dog", "2", "1.5", "inf"]);

        let mut global = RunningStatistics::new();
        assert_eq!(statistics_global(&global), None);
        global.add(1.0);
        global.add(3.0);
        assert_eq!(statistics_global(&global).unwrap(), "GLOBAL:\t2\t2.0\t1.4142135623730951");
    }

    #[test]
    fn test_neighbor_rows_print_refs_as_integers() {
        let report = NeighborReport {
            columns: vec!["wn-refs".to_string(), "wn-MAP".to_string()],
            rows: vec![TargetMeasures {
                target: "eat".to_string(),
                values: vec![3.0, 0.5],
            }],
            averages: vec![("wn-refs".to_string(), 3.0), ("wn-MAP".to_string(), f64::NAN)],
        };
        assert_eq!(neighbor_header("verb", &report), vec!["verb", "wn-refs", "wn-MAP"]);
        assert_eq!(neighbor_rows(&report), vec![vec!["eat", "3", "0.5"]]);
        assert_eq!(neighbor_averages(&report), vec!["Average wn-refs: 3.0", "Average wn-MAP: NaN"]);
    }

    #[test]
    fn test_toefl_lines() {
        let outcome = ToeflOutcome {
            line: 4,
            word: "big".to_string(),
            candidates: vec!["large".to_string(), "red".to_string()],
            similarities: vec![Some(0.8), None],
            correct: true,
            empty: false,
        };
        assert_eq!(toefl_similarities("cosine", &outcome, "?"), "cosine(line 4):\t0.8000\t?");

        let summary = ToeflSummary {
            problems: 4,
            correct: 3,
            empty: 1,
        };
        assert_eq!(toefl_summary(&summary, false), vec!["Accuracy: 75.00%"]);
        assert_eq!(toefl_summary(&summary, true)[1], "Empty: 25.00%");
    }
}
