//! Thesaurus lookups and TOEFL-style synonym problems.
//!
//! A thesaurus is a (target, neighbor) → score table read from a record
//! stream. A TOEFL problem is a line `word syn0 syn1 ... synN` where only
//! `syn0` is a true synonym; a model solves it when it scores `syn0` strictly
//! above every distractor.

use crate::config::{DEFAULT_KEY_FIELD, DEFAULT_NEIGHBOR_FIELD};
use crate::error::{RecordError, SimilarityError};
use crate::record::{parse_records, Record, RecordHandler, Schema};
use crate::vectors::WordSimilarity;
use serde::Serialize;
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Scores between targets and their neighbors.
#[derive(Debug, Default, Clone)]
pub struct Thesaurus {
    scores: HashMap<(String, String), f64>,
}

struct ThesaurusLoader<'a> {
    column: &'a str,
    positions: Option<(usize, usize, usize)>,
    scores: HashMap<(String, String), f64>,
}

impl RecordHandler for ThesaurusLoader<'_> {
    type Error = RecordError;

    fn handle_header(&mut self, _line: &str, schema: &Arc<Schema>) -> Result<(), RecordError> {
        self.positions = Some((
            schema.require(DEFAULT_KEY_FIELD)?,
            schema.require(DEFAULT_NEIGHBOR_FIELD)?,
            schema.require(self.column)?,
        ));
        Ok(())
    }

    fn handle_data(&mut self, record: Record) -> Result<(), RecordError> {
        let Some((target, neighbor, column)) = self.positions else {
            return Err(RecordError::MissingHeader);
        };
        let score = record.number_at(column)?;
        let fields = record.into_fields();
        self.scores
            .insert((fields[target].clone(), fields[neighbor].clone()), score);
        Ok(())
    }
}

impl Thesaurus {
    /// Creates an empty thesaurus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a thesaurus with `target`, `neighbor` and `column` columns.
    ///
    /// A pair listed twice keeps its last score.
    ///
    /// # Errors
    ///
    /// Missing columns, malformed lines, or a score that is not a number.
    #[instrument(skip(reader))]
    pub fn load<R: BufRead>(reader: R, column: &str) -> Result<Self, RecordError> {
        let mut loader = ThesaurusLoader {
            column,
            positions: None,
            scores: HashMap::new(),
        };
        parse_records(reader, &mut loader)?;
        debug!(pairs = loader.scores.len(), "loaded thesaurus");
        Ok(Self {
            scores: loader.scores,
        })
    }

    /// Sets the score of a pair.
    pub fn insert(&mut self, target: impl Into<String>, neighbor: impl Into<String>, score: f64) {
        self.scores.insert((target.into(), neighbor.into()), score);
    }

    /// Score of (target, neighbor), if listed.
    pub fn get(&self, target: &str, neighbor: &str) -> Option<f64> {
        self.scores
            .get(&(target.to_string(), neighbor.to_string()))
            .copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true if the thesaurus is empty.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl WordSimilarity for Thesaurus {
    fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        self.get(a, b)
            .ok_or_else(|| SimilarityError::UnknownPair(a.to_string(), b.to_string()))
    }
}

// ============================================================================
// TOEFL
// ============================================================================

/// Result of one TOEFL problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToeflOutcome {
    /// 1-based problem line
    pub line: usize,
    /// Problem word
    pub word: String,
    /// Candidates, the true synonym first
    pub candidates: Vec<String>,
    /// Similarity of each candidate; `None` when the oracle has no answer
    pub similarities: Vec<Option<f64>>,
    /// The true synonym scored strictly above every distractor
    pub correct: bool,
    /// The true synonym has no similarity
    pub empty: bool,
}

/// Accumulated TOEFL results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ToeflSummary {
    /// Problems seen
    pub problems: usize,
    /// Problems solved
    pub correct: usize,
    /// Problems whose true synonym had no similarity
    pub empty: usize,
}

impl ToeflSummary {
    /// Percentage of solved problems (NaN when there were none).
    pub fn accuracy(&self) -> f64 {
        100.0 * self.correct as f64 / self.problems as f64
    }

    /// Percentage of problems with no similarity for the true synonym.
    pub fn empty_rate(&self) -> f64 {
        100.0 * self.empty as f64 / self.problems as f64
    }
}

/// Solves TOEFL problems against a similarity oracle.
pub struct ToeflSolver<'a, S: WordSimilarity + ?Sized> {
    oracle: &'a S,
    summary: ToeflSummary,
}

impl<'a, S: WordSimilarity + ?Sized> ToeflSolver<'a, S> {
    /// Creates a solver querying `oracle`.
    pub fn new(oracle: &'a S) -> Self {
        Self {
            oracle,
            summary: ToeflSummary::default(),
        }
    }

    /// Solves one problem line `word syn0 syn1 ...` (single spaces).
    ///
    /// Returns `None` for a blank line.
    pub fn solve(&mut self, line: usize, problem: &str) -> Option<ToeflOutcome> {
        let mut parts = problem.split(' ');
        let word = parts.next().filter(|w| !w.is_empty())?.to_string();
        let candidates: Vec<String> = parts.map(str::to_string).collect();
        let similarities: Vec<Option<f64>> = candidates
            .iter()
            .map(|c| self.oracle.similarity(&word, c).ok())
            .collect();

        let first = similarities.first().copied().flatten();
        let correct = similarities
            .iter()
            .skip(1)
            .all(|other| beats(first, *other));
        let empty = !similarities.is_empty() && first.is_none();

        self.summary.problems += 1;
        self.summary.correct += usize::from(correct);
        self.summary.empty += usize::from(empty);

        Some(ToeflOutcome {
            line,
            word,
            candidates,
            similarities,
            correct,
            empty,
        })
    }

    /// Totals over every solved problem.
    pub fn summary(&self) -> ToeflSummary {
        self.summary
    }
}

/// Strict comparison where a missing similarity loses to any score and
/// never beats anything.
fn beats(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
