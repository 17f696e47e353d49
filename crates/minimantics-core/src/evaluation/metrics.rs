//! Retrieval-quality metrics over ranked predictions.
//!
//! This module implements the measures used to score a ranking against a
//! gold standard:
//! - Precision, recall and F1 at every prefix, best F1, average precision
//! - NDCG with binary relevance
//! - The energy family (raw energy, smooth energy, uselessness)
//! - Precision and mean average precision over neighbor rank lists
//!
//! # Prefix Convention
//!
//! Prefix lists are indexed by prefix length: entry `k` describes the top-k
//! predictions. Entry 0 (the empty prefix) is a `-inf` sentinel, so
//! `precisions[10]` is Prec@10.
//!
//! # References
//!
//! - Järvelin & Kekäläinen (2002). "Cumulated gain-based evaluation of IR techniques"

use crate::config::SMOOTH_ENERGY_AT_THRESHOLD;
use serde::Serialize;

// ============================================================================
// Threshold metrics
// ============================================================================

/// Best F1 over all prefixes of the prediction list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestF1 {
    /// Maximum F1 (`-inf` when no prefix has a true positive)
    pub score: f64,
    /// Prefix length achieving it (first maximum; 0 when every F1 is `-inf`)
    pub n: usize,
    /// Precision of that prefix
    pub precision: f64,
}

/// Normalized discounted cumulative gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ndcg {
    /// DCG / IDCG (0.0 when nothing is relevant)
    pub ndcg: f64,
    /// Raw DCG of the prediction order
    pub dcg: f64,
}

/// Measures that need a gold relevance threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdMetrics {
    /// Gold threshold (relevant iff gold value >= threshold)
    pub threshold: f64,
    /// Number of relevant items among the predictions
    pub total_positives: usize,
    /// Best F1 over all prefixes
    pub best_f1: BestF1,
    /// Mean of the precisions at each relevant position
    pub average_precision: f64,
    /// Requested precision cut-off
    pub precision_at: usize,
    /// Precision of the top `precision_at` predictions, if that many exist
    pub precision_at_value: Option<f64>,
    /// NDCG of the prediction order
    pub ndcg: Ndcg,
    /// Precision per prefix length, with the `-inf` sentinel at 0
    #[serde(skip)]
    pub precisions: Vec<f64>,
    /// F1 per prefix length, with the `-inf` sentinel at 0
    #[serde(skip)]
    pub f1s: Vec<f64>,
}

impl ThresholdMetrics {
    /// Computes threshold metrics.
    ///
    /// # Arguments
    ///
    /// * `gold` - Gold values aligned to the predictions, which are sorted by
    ///   descending score (missing gold values already substituted)
    /// * `threshold` - Gold values `>= threshold` are relevant
    /// * `precision_at` - Cut-off for Prec@X
    ///
    /// # Returns
    ///
    /// All prediction prefixes are scored; with no relevant item, recall is
    /// zero everywhere, so every F1 is `-inf`, AvgPrec is 0.0 and NDCG is 0.0.
    ///
    /// # Example
    ///
    /// ```
    /// use minimantics_core::evaluation::ThresholdMetrics;
    ///
    /// let m = ThresholdMetrics::compute(&[1.0, 0.0, 1.0, 0.0], 1.0, 2);
    /// assert_eq!(m.precision_at_value, Some(0.5));
    /// assert_eq!(m.total_positives, 2);
    /// ```
    pub fn compute(gold: &[f64], threshold: f64, precision_at: usize) -> Self {
        let relevant: Vec<bool> = gold.iter().map(|&g| g >= threshold).collect();
        let total_positives = relevant.iter().filter(|&&r| r).count();

        let mut precisions = vec![f64::NEG_INFINITY];
        let mut f1s = vec![f64::NEG_INFINITY];
        let mut true_positives = 0usize;
        for (i, &is_relevant) in relevant.iter().enumerate() {
            if is_relevant {
                true_positives += 1;
            }
            let precision = true_positives as f64 / (i + 1) as f64;
            let recall = if total_positives == 0 {
                0.0
            } else {
                true_positives as f64 / total_positives as f64
            };
            precisions.push(precision);
            f1s.push(if precision == 0.0 || recall == 0.0 {
                f64::NEG_INFINITY
            } else {
                2.0 / (1.0 / precision + 1.0 / recall)
            });
        }

        let mut best = 0;
        for (n, &f1) in f1s.iter().enumerate() {
            if f1 > f1s[best] {
                best = n;
            }
        }
        let best_f1 = BestF1 {
            score: f1s[best],
            n: best,
            precision: precisions[best],
        };

        let average_precision = if total_positives == 0 {
            0.0
        } else {
            relevant
                .iter()
                .enumerate()
                .filter(|(_, &r)| r)
                .map(|(i, _)| precisions[i + 1])
                .sum::<f64>()
                / total_positives as f64
        };

        let precision_at_value = if precision_at == 0 {
            None
        } else {
            precisions.get(precision_at).copied()
        };

        let relevances: Vec<f64> = relevant.iter().map(|&r| f64::from(u8::from(r))).collect();
        let dcg_value = dcg(&relevances);
        let idcg = dcg(&vec![1.0; total_positives]);
        let ndcg = Ndcg {
            ndcg: if idcg == 0.0 { 0.0 } else { dcg_value / idcg },
            dcg: dcg_value,
        };

        Self {
            threshold,
            total_positives,
            best_f1,
            average_precision,
            precision_at,
            precision_at_value,
            ndcg,
            precisions,
            f1s,
        }
    }
}

/// Discounted cumulative gain: the first gain is undiscounted, the gain at
/// 1-based position k ≥ 2 is divided by log2(k).
///
/// # Formula
///
/// ```text
/// DCG = rel_1 + Σ_{k=2..n} rel_k / log₂(k)
/// ```
pub fn dcg(relevances: &[f64]) -> f64 {
    relevances
        .iter()
        .enumerate()
        .map(|(i, &rel)| if i == 0 { rel } else { rel / discount(i + 1) })
        .sum()
}

/// Computes the position discount: log₂(position).
#[inline]
fn discount(position: usize) -> f64 {
    (position as f64).log2()
}

// ============================================================================
// Energy family
// ============================================================================

/// Rank-distance quality of a neighbor list at threshold τ.
///
/// | Measure | Best | Worst |
/// |---------|------|-------|
/// | energy | 1 | τ+1 (grows with list length) |
/// | smooth energy | 0 | 1 |
/// | uselessness | 0 | 1 |
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyScores {
    /// 2·Σ capped ranks / (n(n+1)); ranks above τ count as τ+1
    pub energy: f64,
    /// Ranks squashed through tanh so rank τ maps to 0.95
    pub smooth_energy: f64,
    /// Fraction of ranks above τ
    pub uselessness: f64,
}

impl EnergyScores {
    /// Computes the three energy measures in one pass.
    ///
    /// Smooth energy compares Σtanh(r·k) against its minimum Σtanh(i·k),
    /// i = 0..n-1, with k = atanh(0.95)/τ: past τ, rank differences hardly
    /// matter.
    ///
    /// # Returns
    ///
    /// `None` for an empty rank list or a zero threshold (the smoothing
    /// factor is undefined at τ = 0).
    pub fn compute(ranks: &[usize], threshold: usize) -> Option<Self> {
        if ranks.is_empty() || threshold == 0 {
            return None;
        }
        let tau = threshold as f64;
        let k = SMOOTH_ENERGY_AT_THRESHOLD.atanh() / tau;

        let mut sum_ranks = 0.0;
        let mut useless = 0usize;
        let mut e3 = 0.0;
        let mut e3_min = 0.0;
        for (i, &rank) in ranks.iter().enumerate() {
            let r = rank as f64;
            if rank <= threshold {
                sum_ranks += r;
            } else {
                sum_ranks += tau + 1.0;
                useless += 1;
            }
            e3 += (r * k).tanh();
            e3_min += (i as f64 * k).tanh();
        }

        let n = ranks.len() as f64;
        Some(Self {
            energy: 2.0 * sum_ranks / (n * (n + 1.0)),
            smooth_energy: (e3 - e3_min) / (n - e3_min),
            uselessness: useless as f64 / n,
        })
    }
}

// ============================================================================
// Neighbor rank lists
// ============================================================================

/// Fraction of the cut-off filled by gold neighbors ranked within it.
///
/// Counts the leading ranks `<= at` of an ascending rank list and divides by
/// `at` (not by the list length). Returns NaN for `at == 0`.
///
/// # Example
///
/// ```
/// use minimantics_core::evaluation::precision_at;
///
/// assert_eq!(precision_at(&[1, 3, 12], 10), 0.2);
/// ```
pub fn precision_at(sorted_ranks: &[usize], at: usize) -> f64 {
    if at == 0 {
        return f64::NAN;
    }
    let correct = sorted_ranks.iter().take_while(|&&r| r <= at).count();
    correct as f64 / at as f64
}

/// Mean over the i-th gold neighbor (0-based, ascending ranks) of
/// (i+1) / rankᵢ. An empty list scores 0.0.
pub fn mean_average_precision(sorted_ranks: &[usize]) -> f64 {
    if sorted_ranks.is_empty() {
        return 0.0;
    }
    let sum: f64 = sorted_ranks
        .iter()
        .enumerate()
        .map(|(i, &r)| (i + 1) as f64 / r as f64)
        .sum();
    sum / sorted_ranks.len() as f64
}

// ============================================================================
// Tests
// ============================================================================
