//! Evaluation of similarity predictions against gold standards.
//!
//! Two evaluation styles are supported:
//!
//! | Style | Input | Entry point |
//! |-------|-------|-------------|
//! | **Score tables** | gold and predicted scores per item | [`RankEvaluation`] |
//! | **Neighbor lists** | ranked thesaurus joined with gold resources | [`NeighborEvaluation`] |
//!
//! # Example
//!
//! ```
//! use minimantics_core::diagnostics::DiagnosticSink;
//! use minimantics_core::evaluation::{EvaluationOptions, RankEvaluation, ScoreTable, ScoreTableOptions};
//! use std::io::Cursor;
//!
//! let gold = "pair\tsimilarity\ncar-auto\t3.9\ncar-fruit\t0.1\ndog-cat\t2.5\n";
//! let pred = "pair\tcosine\ncar-auto\t0.81\ncar-fruit\t0.05\ndog-cat\t0.44\n";
//! let gold = ScoreTable::load(Cursor::new(gold), &ScoreTableOptions::default()).unwrap();
//! let pred = ScoreTable::load(Cursor::new(pred), &ScoreTableOptions::default()).unwrap();
//!
//! let mut sink = DiagnosticSink::new();
//! let reports = RankEvaluation::new(&gold, &pred, EvaluationOptions::default())
//!     .evaluate(&mut sink)
//!     .unwrap();
//! assert!((reports[0].spearman.coefficient - 1.0).abs() < 1e-9);
//! ```
//!
//! # Metrics Reference
//!
//! | Metric | Description | Needs threshold |
//! |--------|-------------|-----------------|
//! | PearsonR / SpearmanRho / KendallTau | correlation with gold | no |
//! | BestF1 | max F1 over prediction prefixes | yes |
//! | AvgPrec | mean precision at relevant positions | yes |
//! | Prec@X | precision of the top X predictions | yes |
//! | NDCG | position-discounted binary relevance | yes |
//! | Wilcoxon | signed-rank test, gold vs. predictions | no |
//! | energy / senergy / U @τ | rank distance of gold neighbors | rank τ |
//! | Rprec / P@k / MAP | precision over neighbor ranks | no |

pub mod alignment;
pub mod metrics;
pub mod neighbors;
pub mod ranking;
pub mod report;
pub mod scores;
pub mod stats;

pub use alignment::{align_to_gold, align_to_predictions, align_union, report_missing_keys, AlignedPairs};
pub use metrics::{dcg, mean_average_precision, precision_at, BestF1, EnergyScores, Ndcg, ThresholdMetrics};
pub use neighbors::{NeighborEvaluation, NeighborEvaluationConfig, NeighborReport, TargetMeasures};
pub use ranking::{
    prediction_ties, rank, Extremities, NeighborRanker, RankPair, RankedNeighbor, TieBreak, TieCount,
};
pub use report::{ColumnPairReport, EvaluationOptions, RankEvaluation};
pub use scores::{ScoreTable, ScoreTableOptions, Scores};
pub use stats::{kendall_tau, pearson, spearman, wilcoxon, Correlation, WilcoxonResult};
