//! Gold-versus-prediction evaluation of score tables.
//!
//! [`RankEvaluation`] compares every (gold column, prediction column) pair
//! of two [`ScoreTable`]s and produces one [`ColumnPairReport`] per pair:
//!
//! 1. Correlations on gold-aligned values (Pearson, Spearman, Kendall)
//! 2. Threshold measures on prediction-ordered values (needs a threshold)
//! 3. Wilcoxon signed-rank test over the union of items
//! 4. Prediction count and tied prediction values
//! 5. Rank extremities

use super::alignment::{align_to_gold, align_to_predictions, align_union, report_missing_keys, AlignedPairs};
use super::metrics::ThresholdMetrics;
use super::ranking::{prediction_ties, Extremities, TieCount};
use super::scores::ScoreTable;
use super::stats::{kendall_tau, pearson, spearman, wilcoxon, Correlation, WilcoxonResult};
use crate::config::{DEFAULT_EXTREMITIES, DEFAULT_PRECISION_AT, MISSING_FIELD_PLACEHOLDER};
use crate::diagnostics::DiagnosticSink;
use crate::error::RecordError;
use serde::Serialize;
use tracing::{debug, instrument};

/// Settings of a gold-versus-prediction evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOptions {
    /// Gold values `>=` this are relevant; threshold measures are skipped
    /// without it
    pub gold_threshold: Option<f64>,
    /// Cut-off for Prec@X
    pub precision_at: usize,
    /// Items per extremity list (0 disables extremities)
    pub extremities: usize,
    /// Gold columns shown next to extremity items
    pub info_columns: Vec<String>,
    /// Gold source name, for warnings
    pub gold_name: String,
    /// Prediction source name, for warnings
    pub pred_name: String,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            gold_threshold: None,
            precision_at: DEFAULT_PRECISION_AT,
            extremities: DEFAULT_EXTREMITIES,
            info_columns: Vec::new(),
            gold_name: "gold".to_string(),
            pred_name: "pred".to_string(),
        }
    }
}

/// Every measure for one (gold column, prediction column) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnPairReport {
    pub gold_column: String,
    pub pred_column: String,
    pub pearson: Correlation,
    pub spearman: Correlation,
    pub kendall: Correlation,
    /// `None` when no gold threshold was given
    pub threshold: Option<ThresholdMetrics>,
    pub wilcoxon: WilcoxonResult,
    /// Number of predictions
    pub predictions: usize,
    /// Predicted values shared by several items
    pub ties: Vec<TieCount>,
    /// `None` when extremities are disabled
    pub extremities: Option<Extremities>,
    /// Gold and predicted values in prediction order
    #[serde(skip)]
    pub ranked: AlignedPairs,
}

/// Evaluates predicted scores against gold scores.
pub struct RankEvaluation<'a> {
    gold: &'a ScoreTable,
    pred: &'a ScoreTable,
    options: EvaluationOptions,
}

impl<'a> RankEvaluation<'a> {
    /// Creates an evaluation of `pred` against `gold`.
    pub fn new(gold: &'a ScoreTable, pred: &'a ScoreTable, options: EvaluationOptions) -> Self {
        Self { gold, pred, options }
    }

    /// Options in effect.
    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Evaluates every gold/prediction column pair, gold-major.
    ///
    /// Missing items, a missing threshold and an unavailable Prec@X are
    /// reported once each through `sink`; they never stop the evaluation.
    ///
    /// # Errors
    ///
    /// `RecordError::MissingColumn` for an extremity info column that the
    /// gold table does not have; `RecordError::EmptyColumn` when a gold or
    /// predicted value column holds no items.
    ///
    /// # Example
    ///
    /// ```
    /// use minimantics_core::diagnostics::DiagnosticSink;
    /// use minimantics_core::evaluation::{EvaluationOptions, RankEvaluation, ScoreTable, ScoreTableOptions};
    /// use std::io::Cursor;
    ///
    /// let gold = ScoreTable::load(Cursor::new("id\tv\na\t1\nb\t0\nc\t1\n"), &ScoreTableOptions::default()).unwrap();
    /// let pred = ScoreTable::load(Cursor::new("id\tv\na\t.9\nb\t.2\nc\t.8\n"), &ScoreTableOptions::default()).unwrap();
    /// let options = EvaluationOptions { gold_threshold: Some(1.0), precision_at: 2, ..Default::default() };
    ///
    /// let mut sink = DiagnosticSink::new();
    /// let reports = RankEvaluation::new(&gold, &pred, options).evaluate(&mut sink).unwrap();
    /// assert_eq!(reports[0].threshold.as_ref().unwrap().precision_at_value, Some(1.0));
    /// ```
    #[instrument(skip_all)]
    pub fn evaluate(&self, sink: &mut DiagnosticSink) -> Result<Vec<ColumnPairReport>, RecordError> {
        self.gold.schema().require_all(&self.options.info_columns)?;
        require_items(self.gold, &self.options.gold_name)?;
        require_items(self.pred, &self.options.pred_name)?;

        let first_gold = self.gold.value_columns().first().and_then(|c| self.gold.scores(c));
        let first_pred = self.pred.value_columns().first().and_then(|c| self.pred.scores(c));
        if let (Some(gold), Some(pred)) = (first_gold, first_pred) {
            report_missing_keys(gold, pred, &self.options.gold_name, &self.options.pred_name, sink);
        }

        let mut reports = Vec::new();
        for gold_column in self.gold.value_columns() {
            for pred_column in self.pred.value_columns() {
                reports.push(self.evaluate_pair(gold_column, pred_column, sink));
            }
        }
        debug!(pairs = reports.len(), "evaluated column pairs");
        Ok(reports)
    }

    fn evaluate_pair(&self, gold_column: &str, pred_column: &str, sink: &mut DiagnosticSink) -> ColumnPairReport {
        let empty = Default::default();
        let gold = self.gold.scores(gold_column).unwrap_or(&empty);
        let pred = self.pred.scores(pred_column).unwrap_or(&empty);

        let by_gold = align_to_gold(gold, pred);
        let ranked = align_to_predictions(gold, pred);
        let union = align_union(gold, pred);

        let threshold = match self.options.gold_threshold {
            Some(t) => {
                let metrics = ThresholdMetrics::compute(&ranked.gold, t, self.options.precision_at);
                if metrics.precision_at_value.is_none() {
                    sink.warn_once(format!(
                        "Prec@{} unavailable; pred vector has {} entries",
                        self.options.precision_at,
                        ranked.len()
                    ));
                }
                Some(metrics)
            }
            None => {
                sink.warn_once("no gold threshold given; skipping threshold measures");
                None
            }
        };

        let extremities = (self.options.extremities != 0).then(|| {
            let mut extremities = Extremities::compute(gold, pred, self.options.extremities);
            if !self.options.info_columns.is_empty() {
                extremities.annotate(|key| {
                    self.options
                        .info_columns
                        .iter()
                        .map(|c| {
                            self.gold
                                .info(key, c)
                                .unwrap_or_else(|| MISSING_FIELD_PLACEHOLDER.to_string())
                        })
                        .collect()
                });
            }
            extremities
        });

        ColumnPairReport {
            gold_column: gold_column.to_string(),
            pred_column: pred_column.to_string(),
            pearson: pearson(&by_gold.gold, &by_gold.pred),
            spearman: spearman(&by_gold.gold, &by_gold.pred),
            kendall: kendall_tau(&by_gold.gold, &by_gold.pred),
            threshold,
            wilcoxon: wilcoxon(&union.gold, &union.pred),
            predictions: pred.len(),
            ties: prediction_ties(pred),
            extremities,
            ranked,
        }
    }
}

/// Fails on a value column with no rows.
fn require_items(table: &ScoreTable, name: &str) -> Result<(), RecordError> {
    for column in table.value_columns() {
        if table.scores(column).map_or(true, |s| s.is_empty()) {
            return Err(RecordError::EmptyColumn {
                source_name: name.to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}
