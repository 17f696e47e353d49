//! Single-pass descriptive statistics.
//!
//! [`RunningStatistics`] accumulates count, mean and variance without
//! buffering the sample. [`GroupedStatistics`] applies it to key-sorted
//! record streams, emitting one [`GroupSummary`] per group and tracking
//! global statistics over the group means.

use crate::error::{RecordError, StatsError};
use crate::record::{GroupTracker, Record, Schema};
use serde::Serialize;

// ============================================================================
// Running statistics
// ============================================================================

/// Streaming count/mean/variance accumulator (Welford's update).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStatistics {
    count: usize,
    sum: f64,
    mean: f64,
    m2: f64,
}

impl RunningStatistics {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one observation in O(1).
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of observations.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sum of observations.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Arithmetic mean.
    ///
    /// # Errors
    ///
    /// `StatsError::EmptySample` when nothing was added.
    pub fn mean(&self) -> Result<f64, StatsError> {
        if self.count == 0 {
            return Err(StatsError::EmptySample);
        }
        Ok(self.mean)
    }

    /// Population standard deviation (divides by n).
    pub fn population_stddev(&self) -> Result<f64, StatsError> {
        if self.count == 0 {
            return Err(StatsError::EmptySample);
        }
        Ok((self.m2 / self.count as f64).max(0.0).sqrt())
    }

    /// Sample standard deviation with Bessel's correction (divides by n-1).
    ///
    /// A single observation has no spread estimate and yields `+inf`.
    pub fn sample_stddev(&self) -> Result<f64, StatsError> {
        match self.count {
            0 => Err(StatsError::EmptySample),
            1 => Ok(f64::INFINITY),
            n => Ok((self.m2 / (n - 1) as f64).max(0.0).sqrt()),
        }
    }
}

impl Extend<f64> for RunningStatistics {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for RunningStatistics {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        stats.extend(iter);
        stats
    }
}

// ============================================================================
// Grouped statistics
// ============================================================================

/// Statistics of one group of consecutive records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    /// Values of the discriminating columns
    pub key: Vec<String>,
    /// Number of records in the group
    pub count: usize,
    /// Mean of the measured column
    pub mean: f64,
    /// Sample standard deviation (`+inf` for a single record)
    pub sample_stddev: f64,
}

impl GroupSummary {
    fn from_stats(key: Vec<String>, stats: &RunningStatistics) -> Option<Self> {
        Some(Self {
            key,
            count: stats.count(),
            mean: stats.mean().ok()?,
            sample_stddev: stats.sample_stddev().ok()?,
        })
    }
}

/// Per-group statistics of one numeric column over key-sorted input.
///
/// Records are discriminated by the tuple of values in the discriminating
/// columns; a new group starts whenever that tuple changes, so the input
/// must be sorted (grouped) on those columns. With no discriminating columns
/// the whole stream is one group.
#[derive(Debug)]
pub struct GroupedStatistics {
    discriminate: Vec<String>,
    column: String,
    positions: Option<(Vec<usize>, usize)>,
    tracker: GroupTracker<Vec<String>>,
    current: RunningStatistics,
    global: RunningStatistics,
}

impl GroupedStatistics {
    /// Creates grouped statistics of `column`, discriminated by `discriminate`.
    pub fn new(discriminate: Vec<String>, column: impl Into<String>) -> Self {
        Self {
            discriminate,
            column: column.into(),
            positions: None,
            tracker: GroupTracker::new(),
            current: RunningStatistics::new(),
            global: RunningStatistics::new(),
        }
    }

    /// Discriminating column names.
    pub fn discriminate(&self) -> &[String] {
        &self.discriminate
    }

    /// Resolves the column positions in a header.
    ///
    /// # Errors
    ///
    /// `RecordError::MissingColumn` if a discriminating column or the
    /// measured column is absent.
    pub fn bind(&mut self, schema: &Schema) -> Result<(), RecordError> {
        let keys = schema.require_all(&self.discriminate)?;
        let column = schema.require(&self.column)?;
        self.positions = Some((keys, column));
        Ok(())
    }

    /// Adds a record. Returns the summary of the previous group when the
    /// record opens a new one.
    ///
    /// # Errors
    ///
    /// Missing columns, or a measured value that is not a number.
    pub fn observe(&mut self, record: &Record) -> Result<Option<GroupSummary>, RecordError> {
        if self.positions.is_none() {
            self.bind(record.schema())?;
        }
        let Some((keys, column)) = &self.positions else {
            return Ok(None);
        };

        let key: Vec<String> = keys
            .iter()
            .map(|&p| record.field(p).unwrap_or_default().to_string())
            .collect();
        let value = record.number_at(*column)?;

        let closed = if self.tracker.groups() > 0 && self.tracker.current() != Some(&key) {
            self.close_current()
        } else {
            None
        };
        self.tracker.observe(&key);
        self.current.add(value);
        Ok(closed)
    }

    /// Closes the last group and returns its summary.
    pub fn finish(&mut self) -> Option<GroupSummary> {
        self.close_current()
    }

    /// Statistics over the means of every closed group.
    pub fn global(&self) -> &RunningStatistics {
        &self.global
    }

    fn close_current(&mut self) -> Option<GroupSummary> {
        let key = self.tracker.current()?.clone();
        let summary = GroupSummary::from_stats(key, &self.current)?;
        self.global.add(summary.mean);
        self.current = RunningStatistics::new();
        Some(summary)
    }
}
