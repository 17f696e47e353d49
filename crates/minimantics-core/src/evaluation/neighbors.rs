//! Per-target evaluation of ranked neighbor lists.
//!
//! Input is a ranked thesaurus (see [`NeighborRanker`](super::NeighborRanker))
//! joined with one column per gold resource: a nonzero value means the
//! neighbor is listed by that resource. For each target and resource the
//! ranks of the listed neighbors are collected and scored with the energy
//! family, R-precision, P@k and MAP.

use super::metrics::{mean_average_precision, precision_at, EnergyScores};
use crate::config::{
    DEFAULT_ENERGY_THRESHOLDS, DEFAULT_PRECISION_CUTOFFS, NEIGHBOR_NON_RESOURCE_FIELDS,
    NEIGHBOR_TARGET_FIELD, RANK_FIELD,
};
use crate::error::RecordError;
use crate::record::{parse_number, Record, RecordHandler, Schema};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Columns and cut-offs of a neighbor evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEvaluationConfig {
    /// Column holding the target word
    pub target_field: String,
    /// Column holding the neighbor rank
    pub rank_field: String,
    /// Columns that are not gold resources
    pub excluded: Vec<String>,
    /// Rank thresholds τ for the energy family
    pub thresholds: Vec<usize>,
    /// Cut-offs k for P@k
    pub cutoffs: Vec<usize>,
}

impl Default for NeighborEvaluationConfig {
    fn default() -> Self {
        Self {
            target_field: NEIGHBOR_TARGET_FIELD.to_string(),
            rank_field: RANK_FIELD.to_string(),
            excluded: NEIGHBOR_NON_RESOURCE_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            thresholds: DEFAULT_ENERGY_THRESHOLDS.to_vec(),
            cutoffs: DEFAULT_PRECISION_CUTOFFS.to_vec(),
        }
    }
}

/// Measures of one target, resource-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetMeasures {
    pub target: String,
    pub values: Vec<f64>,
}

/// Evaluation output: one row per target, sorted by target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborReport {
    /// `{resource}-{measure}` column names
    pub columns: Vec<String>,
    pub rows: Vec<TargetMeasures>,
    /// Per column mean over the targets where the measure is defined
    /// (NaN when it never is)
    pub averages: Vec<(String, f64)>,
}

/// Collects neighbor ranks per target and resource.
#[derive(Debug)]
pub struct NeighborEvaluation {
    config: NeighborEvaluationConfig,
    target: usize,
    rank: usize,
    /// Resource name and column position, in header order
    resources: Vec<(String, usize)>,
    /// Target → ranks per resource
    ranks: BTreeMap<String, Vec<Vec<usize>>>,
}

impl NeighborEvaluation {
    /// Creates an evaluation with the given columns and cut-offs.
    pub fn new(config: NeighborEvaluationConfig) -> Self {
        Self {
            config,
            target: 0,
            rank: 0,
            resources: Vec::new(),
            ranks: BTreeMap::new(),
        }
    }

    /// Resolves the target and rank columns; every other column that is not
    /// excluded becomes a resource.
    ///
    /// # Errors
    ///
    /// `RecordError::MissingColumn` for an absent target or rank column.
    pub fn bind(&mut self, schema: &Schema) -> Result<(), RecordError> {
        self.target = schema.require(&self.config.target_field)?;
        self.rank = schema.require(&self.config.rank_field)?;
        self.resources = schema
            .names()
            .iter()
            .enumerate()
            .filter(|(_, name)| !self.config.excluded.contains(name))
            .filter(|(i, _)| *i != self.target && *i != self.rank)
            .map(|(i, name)| (name.clone(), i))
            .collect();
        debug!(resources = self.resources.len(), "bound neighbor evaluation");
        Ok(())
    }

    /// Resource names, in header order.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|(name, _)| name.as_str())
    }

    /// Measure names for one resource.
    ///
    /// `refs`, then `energy@τ`, `senergy@τ` and `U@τ` per threshold, then
    /// `Rprec`, `P@k` per cut-off and `MAP`.
    pub fn measure_names(&self) -> Vec<String> {
        let mut names = vec!["refs".to_string()];
        for t in &self.config.thresholds {
            names.push(format!("energy@{}", t));
            names.push(format!("senergy@{}", t));
            names.push(format!("U@{}", t));
        }
        names.push("Rprec".to_string());
        for k in &self.config.cutoffs {
            names.push(format!("P@{}", k));
        }
        names.push("MAP".to_string());
        names
    }

    /// Records one neighbor row.
    ///
    /// Rows with rank 0 (the target itself) are ignored. Every resource with
    /// a nonzero value receives the rank.
    ///
    /// # Errors
    ///
    /// `RecordError::NotNumeric` for a rank that is not a whole number.
    pub fn add(&mut self, record: &Record) -> Result<(), RecordError> {
        let raw_rank = record.field(self.rank).unwrap_or_default();
        let rank: usize = raw_rank
            .trim()
            .parse()
            .map_err(|_| RecordError::NotNumeric {
                line: record.line(),
                column: self.config.rank_field.clone(),
                value: raw_rank.to_string(),
            })?;
        if rank == 0 {
            return Ok(());
        }

        let listed: Vec<usize> = self
            .resources
            .iter()
            .enumerate()
            .filter(|(_, (_, position))| record.field(*position).is_some_and(is_reference))
            .map(|(i, _)| i)
            .collect();
        if listed.is_empty() {
            return Ok(());
        }

        let target = record.field(self.target).unwrap_or_default().to_string();
        let width = self.resources.len();
        let per_resource = self
            .ranks
            .entry(target)
            .or_insert_with(|| vec![Vec::new(); width]);
        for i in listed {
            per_resource[i].push(rank);
        }
        Ok(())
    }

    /// Number of targets with at least one listed neighbor.
    pub fn targets(&self) -> usize {
        self.ranks.len()
    }

    /// Computes every measure for every target.
    pub fn report(&self) -> NeighborReport {
        let measures = self.measure_names();
        let columns: Vec<String> = self
            .resources
            .iter()
            .flat_map(|(resource, _)| measures.iter().map(move |m| format!("{}-{}", resource, m)))
            .collect();

        let mut sums = vec![(0.0, 0usize); columns.len()];
        let mut rows = Vec::with_capacity(self.ranks.len());
        for (target, per_resource) in &self.ranks {
            let values: Vec<f64> = per_resource
                .iter()
                .flat_map(|ranks| self.measures(ranks))
                .collect();
            for (sum, v) in sums.iter_mut().zip(&values) {
                if !v.is_nan() {
                    sum.0 += v;
                    sum.1 += 1;
                }
            }
            rows.push(TargetMeasures {
                target: target.clone(),
                values,
            });
        }

        let averages = columns
            .iter()
            .zip(sums)
            .map(|(c, (s, n))| (c.clone(), if n == 0 { f64::NAN } else { s / n as f64 }))
            .collect();
        NeighborReport {
            columns,
            rows,
            averages,
        }
    }

    fn measures(&self, ranks: &[usize]) -> Vec<f64> {
        let mut sorted = ranks.to_vec();
        sorted.sort_unstable();

        let mut values = vec![sorted.len() as f64];
        for &t in &self.config.thresholds {
            match EnergyScores::compute(&sorted, t) {
                Some(e) => values.extend([e.energy, e.smooth_energy, e.uselessness]),
                None => values.extend([f64::NAN; 3]),
            }
        }
        values.push(precision_at(&sorted, sorted.len()));
        for &k in &self.config.cutoffs {
            values.push(precision_at(&sorted, k));
        }
        values.push(mean_average_precision(&sorted));
        values
    }
}

/// A resource value lists the neighbor unless it is zero.
fn is_reference(value: &str) -> bool {
    match parse_number(value) {
        Some(v) => v != 0.0,
        None => !value.is_empty(),
    }
}

impl RecordHandler for NeighborEvaluation {
    type Error = RecordError;

    fn handle_header(&mut self, _line: &str, schema: &Arc<Schema>) -> Result<(), RecordError> {
        self.bind(schema)
    }

    fn handle_data(&mut self, record: Record) -> Result<(), RecordError> {
        self.add(&record)
    }
}
