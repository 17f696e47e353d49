//! Pairing gold and predicted scores by item id.
//!
//! Three alignments are used by the evaluation:
//!
//! | Alignment | Order | Missing gold | Missing prediction |
//! |-----------|-------|--------------|--------------------|
//! | [`align_to_gold`] | gold order | not included | mean of predictions |
//! | [`align_to_predictions`] | prediction score, descending | 0.0 | not included |
//! | [`align_union`] | gold, then prediction-only | 0.0 | 0.0 |

use super::scores::Scores;
use super::stats::mean;
use crate::diagnostics::DiagnosticSink;

/// Parallel gold/prediction vectors for a set of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedPairs {
    /// Item ids
    pub keys: Vec<String>,
    /// Gold value per item
    pub gold: Vec<f64>,
    /// Predicted value per item
    pub pred: Vec<f64>,
}

impl AlignedPairs {
    /// Number of aligned items.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if nothing was aligned.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn push(&mut self, key: &str, gold: f64, pred: f64) {
        self.keys.push(key.to_string());
        self.gold.push(gold);
        self.pred.push(pred);
    }
}

/// Aligns every gold item with its prediction, substituting the mean of all
/// predictions for items that were not predicted (0.0 when nothing was).
pub fn align_to_gold(gold: &Scores, pred: &Scores) -> AlignedPairs {
    let values: Vec<f64> = pred.values().copied().collect();
    let fallback = if values.is_empty() { 0.0 } else { mean(&values) };
    let mut pairs = AlignedPairs::default();
    for (key, &g) in gold {
        pairs.push(key, g, pred.get(key).copied().unwrap_or(fallback));
    }
    pairs
}

/// Aligns every prediction with its gold value, ordered by descending
/// prediction score (stable on ties). Unknown items get a gold value of 0.0.
pub fn align_to_predictions(gold: &Scores, pred: &Scores) -> AlignedPairs {
    let mut ordered: Vec<(&String, f64)> = pred.iter().map(|(k, &v)| (k, v)).collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut pairs = AlignedPairs::default();
    for (key, p) in ordered {
        pairs.push(key, gold.get(key).copied().unwrap_or(0.0), p);
    }
    pairs
}

/// Aligns the union of gold and predicted items, 0.0 standing in for a
/// missing side.
pub fn align_union(gold: &Scores, pred: &Scores) -> AlignedPairs {
    let mut pairs = AlignedPairs::default();
    for (key, &g) in gold {
        pairs.push(key, g, pred.get(key).copied().unwrap_or(0.0));
    }
    for (key, &p) in pred {
        if !gold.contains_key(key) {
            pairs.push(key, 0.0, p);
        }
    }
    pairs
}

/// Warns once about gold items that were never predicted and once about
/// predictions for items outside the gold standard.
///
/// Each warning names how many items are affected and one example.
pub fn report_missing_keys(
    gold: &Scores,
    pred: &Scores,
    gold_name: &str,
    pred_name: &str,
    sink: &mut DiagnosticSink,
) {
    let unpredicted: Vec<&String> = gold.keys().filter(|k| !pred.contains_key(*k)).collect();
    if let Some(example) = unpredicted.first() {
        sink.warn_once(format!(
            "{} gold key(s) not found in prediction file `{}` (e.g. `{}`); using avg(predictions)",
            unpredicted.len(),
            pred_name,
            example
        ));
    }

    let unknown: Vec<&String> = pred.keys().filter(|k| !gold.contains_key(*k)).collect();
    if let Some(example) = unknown.first() {
        sink.warn_once(format!(
            "{} pred key(s) not found in gold-standard file `{}` (e.g. `{}`); using 0.0",
            unknown.len(),
            gold_name,
            example
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(items: &[(&str, f64)]) -> Scores {
        items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_missing_prediction_uses_mean() {
        let gold = scores(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let pred = scores(&[("a", 0.4), ("c", 0.8)]);
        let pairs = align_to_gold(&gold, &pred);
        assert_eq!(pairs.keys, vec!["a", "b", "c"]);
        assert_eq!(pairs.gold, vec![1.0, 2.0, 3.0]);
        assert!((pairs.pred[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_no_predictions_never_yields_nan() {
        let gold = scores(&[("a", 1.0)]);
        let pairs = align_to_gold(&gold, &Scores::default());
        assert_eq!(pairs.pred, vec![0.0]);
    }

    #[test]
    fn test_prediction_order() {
        let gold = scores(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        let pred = scores(&[("y", 0.1), ("b", 0.7), ("a", 0.9), ("x", 0.8), ("z", 0.7)]);
        let pairs = align_to_predictions(&gold, &pred);
        assert_eq!(pairs.keys, vec!["a", "x", "b", "z", "y"]);
        assert_eq!(pairs.gold, vec![1.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(pairs.pred, vec![0.9, 0.8, 0.7, 0.7, 0.1]);
    }

    #[test]
    fn test_union() {
        let gold = scores(&[("a", 1.0), ("b", 2.0)]);
        let pred = scores(&[("c", 5.0), ("a", 3.0)]);
        let pairs = align_union(&gold, &pred);
        assert_eq!(pairs.keys, vec!["a", "b", "c"]);
        assert_eq!(pairs.gold, vec![1.0, 2.0, 0.0]);
        assert_eq!(pairs.pred, vec![3.0, 0.0, 5.0]);
    }

    #[test]
    fn test_report_missing_keys_once() {
        let gold = scores(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let pred = scores(&[("a", 0.4), ("z", 0.8)]);
        let mut sink = DiagnosticSink::new();
        report_missing_keys(&gold, &pred, "gold.tsv", "pred.tsv", &mut sink);
        report_missing_keys(&gold, &pred, "gold.tsv", "pred.tsv", &mut sink);

        assert_eq!(sink.messages().len(), 2);
        assert!(sink.messages()[0].starts_with("2 gold key(s)"));
        assert!(sink.messages()[0].contains("`b`"));
        assert!(sink.messages()[1].contains("`z`"));
        assert_eq!(sink.suppressed(), 2);
    }

    #[test]
    fn test_no_warnings_when_keys_match() {
        let gold = scores(&[("a", 1.0)]);
        let mut sink = DiagnosticSink::new();
        report_missing_keys(&gold, &gold, "g", "p", &mut sink);
        assert!(sink.is_empty());
    }
}
