//! Rank assignment and rank-based reports.
//!
//! - [`rank`] turns scores into 1-based ranks (1 = lowest score)
//! - [`Extremities`] lists the items whose gold and predicted ranks are
//!   extreme or disagree the most
//! - [`prediction_ties`] reports predicted values shared by several items
//! - [`NeighborRanker`] ranks the neighbors of each target of a thesaurus

use super::scores::Scores;
use crate::error::RecordError;
use crate::record::{GroupTracker, Record, Schema};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

// ============================================================================
// Rank assignment
// ============================================================================

/// Order given to items with equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Equal scores keep their input order
    #[default]
    InputOrder,
    /// Items are shuffled with a seeded generator before a stable sort
    Shuffle {
        /// Generator seed
        seed: u64,
    },
}

/// Assigns ranks 1..n by ascending score.
///
/// # Example
///
/// ```
/// use minimantics_core::evaluation::{rank, Scores, TieBreak};
///
/// let scores: Scores = [("a", 0.9), ("b", 0.1), ("c", 0.5)]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v))
///     .collect();
/// let ranks = rank(&scores, TieBreak::InputOrder);
/// assert_eq!(ranks["b"], 1);
/// assert_eq!(ranks["a"], 3);
/// ```
pub fn rank(scores: &Scores, tie_break: TieBreak) -> IndexMap<String, usize> {
    let mut items: Vec<(&String, f64)> = scores.iter().map(|(k, &v)| (k, v)).collect();
    if let TieBreak::Shuffle { seed } = tie_break {
        items.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    items.sort_by(|a, b| a.1.total_cmp(&b.1));
    items
        .into_iter()
        .enumerate()
        .map(|(i, (key, _))| (key.clone(), i + 1))
        .collect()
}

// ============================================================================
// Extremities
// ============================================================================

/// Gold and predicted rank of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankPair {
    /// Item id
    pub key: String,
    /// Rank among gold scores
    pub gold_rank: usize,
    /// Rank among predicted scores
    pub pred_rank: usize,
    /// Extra gold columns shown with the item
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<String>,
}

impl RankPair {
    /// Absolute rank difference.
    pub fn difference(&self) -> usize {
        self.gold_rank.abs_diff(self.pred_rank)
    }
}

/// Items with extreme ranks, `n` per list.
///
/// "High" lists start with the highest rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extremities {
    pub low_gold: Vec<RankPair>,
    pub high_gold: Vec<RankPair>,
    pub low_pred: Vec<RankPair>,
    pub high_pred: Vec<RankPair>,
    /// Smallest rank differences
    pub best_diff: Vec<RankPair>,
    /// Largest rank differences, largest first
    pub worst_diff: Vec<RankPair>,
}

impl Extremities {
    /// Computes the extremity lists over predicted items that are in gold.
    ///
    /// Pairs start in prediction order and are re-sorted stably by gold rank,
    /// then by predicted rank, then by rank difference; each sort inherits
    /// the previous order on ties.
    pub fn compute(gold: &Scores, pred: &Scores, n: usize) -> Self {
        let gold_ranks = rank(gold, TieBreak::InputOrder);
        let pred_ranks = rank(pred, TieBreak::InputOrder);
        let mut pairing: Vec<RankPair> = pred
            .keys()
            .filter_map(|key| {
                Some(RankPair {
                    key: key.clone(),
                    gold_rank: *gold_ranks.get(key)?,
                    pred_rank: *pred_ranks.get(key)?,
                    info: Vec::new(),
                })
            })
            .collect();

        let mut extremities = Self::default();
        pairing.sort_by_key(|p| p.gold_rank);
        (extremities.low_gold, extremities.high_gold) = ends(&pairing, n);
        pairing.sort_by_key(|p| p.pred_rank);
        (extremities.low_pred, extremities.high_pred) = ends(&pairing, n);
        pairing.sort_by_key(RankPair::difference);
        (extremities.best_diff, extremities.worst_diff) = ends(&pairing, n);
        extremities
    }

    /// Attaches extra columns to every listed item.
    pub fn annotate<F>(&mut self, info: F)
    where
        F: Fn(&str) -> Vec<String>,
    {
        for list in self.lists_mut() {
            for pair in list.iter_mut() {
                pair.info = info(&pair.key);
            }
        }
    }

    /// The lists with their report names, in report order.
    pub fn named(&self) -> [(&'static str, &[RankPair]); 6] {
        [
            ("LowGold", self.low_gold.as_slice()),
            ("HighGold", self.high_gold.as_slice()),
            ("LowPred", self.low_pred.as_slice()),
            ("HighPred", self.high_pred.as_slice()),
            ("BestDiff", self.best_diff.as_slice()),
            ("WorstDiff", self.worst_diff.as_slice()),
        ]
    }

    fn lists_mut(&mut self) -> [&mut Vec<RankPair>; 6] {
        [
            &mut self.low_gold,
            &mut self.high_gold,
            &mut self.low_pred,
            &mut self.high_pred,
            &mut self.best_diff,
            &mut self.worst_diff,
        ]
    }
}

/// First `n` items, and last `n` items in reverse order.
fn ends(pairing: &[RankPair], n: usize) -> (Vec<RankPair>, Vec<RankPair>) {
    let low = pairing.iter().take(n).cloned().collect();
    let high = pairing.iter().rev().take(n).cloned().collect();
    (low, high)
}

// ============================================================================
// Ties
// ============================================================================

/// A value shared by several predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TieCount {
    pub value: f64,
    pub count: usize,
}

/// Values that occur more than once, most frequent first (first-seen order
/// among equally frequent values).
pub fn prediction_ties(pred: &Scores) -> Vec<TieCount> {
    // -0.0 + 0.0 == +0.0, so both zeros share a bucket
    let mut counts: IndexMap<u64, TieCount> = IndexMap::new();
    for &value in pred.values() {
        let value = value + 0.0;
        counts
            .entry(value.to_bits())
            .or_insert(TieCount { value, count: 0 })
            .count += 1;
    }
    let mut ties: Vec<TieCount> = counts.into_values().filter(|t| t.count > 1).collect();
    ties.sort_by(|a, b| b.count.cmp(&a.count));
    ties
}

// ============================================================================
// Neighbor ranking
// ============================================================================

/// A neighbor row with its assigned rank.
#[derive(Debug, Clone)]
pub struct RankedNeighbor {
    pub record: Record,
    pub score: f64,
    pub rank: usize,
}

/// Ranks the neighbors of each target by descending similarity.
///
/// Input must be grouped on the target column. Within a group, ties are
/// shuffled with one generator seeded once for the whole stream, then
/// stably sorted. Ranks start at 0 when the best neighbor is the target
/// itself and at 1 otherwise.
#[derive(Debug)]
pub struct NeighborRanker {
    target_field: String,
    neighbor_field: String,
    score_field: String,
    positions: Option<(usize, usize, usize)>,
    rng: StdRng,
    tracker: GroupTracker<String>,
    group: Vec<(Record, f64)>,
}

impl NeighborRanker {
    /// Creates a ranker reading the given columns.
    pub fn new(
        target_field: impl Into<String>,
        neighbor_field: impl Into<String>,
        score_field: impl Into<String>,
        seed: u64,
    ) -> Self {
        Self {
            target_field: target_field.into(),
            neighbor_field: neighbor_field.into(),
            score_field: score_field.into(),
            positions: None,
            rng: StdRng::seed_from_u64(seed),
            tracker: GroupTracker::new(),
            group: Vec::new(),
        }
    }

    /// Resolves the target, neighbor and score columns.
    ///
    /// # Errors
    ///
    /// `RecordError::MissingColumn` when one of them is absent.
    pub fn bind(&mut self, schema: &Schema) -> Result<(), RecordError> {
        self.positions = Some((
            schema.require(&self.target_field)?,
            schema.require(&self.neighbor_field)?,
            schema.require(&self.score_field)?,
        ));
        Ok(())
    }

    /// Adds a neighbor row. When it opens a new target group, the previous
    /// group is returned ranked.
    ///
    /// # Errors
    ///
    /// Missing columns, or a similarity that is not a number.
    pub fn push(&mut self, record: Record) -> Result<Vec<RankedNeighbor>, RecordError> {
        let (target, _, score) = match self.positions {
            Some(positions) => positions,
            None => {
                self.bind(record.schema())?;
                self.positions.ok_or(RecordError::MissingHeader)?
            }
        };
        let value = record.number_at(score)?;
        let key = record.field(target).unwrap_or_default().to_string();

        let flushed = if self.tracker.observe(&key) {
            self.flush()
        } else {
            Vec::new()
        };
        self.group.push((record, value));
        Ok(flushed)
    }

    /// Ranks and returns the last group.
    pub fn finish(&mut self) -> Vec<RankedNeighbor> {
        self.flush()
    }

    fn flush(&mut self) -> Vec<RankedNeighbor> {
        let Some((target, neighbor, _)) = self.positions else {
            return Vec::new();
        };
        if self.group.is_empty() {
            return Vec::new();
        }

        let mut group = std::mem::take(&mut self.group);
        group.shuffle(&mut self.rng);
        group.sort_by(|a, b| b.1.total_cmp(&a.1));

        let first = usize::from(group[0].0.field(neighbor) != group[0].0.field(target));
        group
            .into_iter()
            .enumerate()
            .map(|(i, (record, score))| RankedNeighbor {
                record,
                score,
                rank: first + i,
            })
            .collect()
    }
}
