//! Streaming per-key normalization.
//!
//! [`GroupNormalizer`] normalizes the rows of each key group independently,
//! buffering only the group in progress. Input must be grouped on the key.

use super::store::NormMode;
use crate::error::RecordError;
use crate::record::{format_number, parse_number, GroupTracker, Record, Schema};

/// Normalizes chosen columns per key group of a record stream.
#[derive(Debug)]
pub struct GroupNormalizer {
    key_field: String,
    columns: Option<Vec<String>>,
    mode: NormMode,
    key: Option<usize>,
    chosen: Vec<bool>,
    tracker: GroupTracker<String>,
    group: Vec<Record>,
}

impl GroupNormalizer {
    /// Creates a normalizer grouping on `key_field`.
    ///
    /// `columns` selects the columns to normalize; `None` means every
    /// column. Values that are not numbers are always passed through.
    pub fn new(key_field: impl Into<String>, columns: Option<Vec<String>>, mode: NormMode) -> Self {
        Self {
            key_field: key_field.into(),
            columns,
            mode,
            key: None,
            chosen: Vec::new(),
            tracker: GroupTracker::new(),
            group: Vec::new(),
        }
    }

    /// Resolves the key and chosen columns against the header.
    ///
    /// # Errors
    ///
    /// `RecordError::MissingColumn` for an unknown key or chosen column.
    pub fn bind(&mut self, schema: &Schema) -> Result<(), RecordError> {
        self.key = Some(schema.require(&self.key_field)?);
        self.chosen = match &self.columns {
            None => vec![true; schema.len()],
            Some(columns) => {
                let positions = schema.require_all(columns)?;
                let mut chosen = vec![false; schema.len()];
                for p in positions {
                    chosen[p] = true;
                }
                chosen
            }
        };
        Ok(())
    }

    /// Adds a record. When the record opens a new group, the previous group
    /// is returned normalized, as output rows.
    pub fn push(&mut self, record: Record) -> Result<Vec<Vec<String>>, RecordError> {
        if self.key.is_none() {
            self.bind(record.schema())?;
        }
        let key_pos = self.key.unwrap_or_default();
        let key = record.field(key_pos).unwrap_or_default().to_string();

        let flushed = if self.tracker.observe(&key) {
            self.flush()
        } else {
            Vec::new()
        };
        self.group.push(record);
        Ok(flushed)
    }

    /// Normalizes and returns the last group.
    pub fn finish(&mut self) -> Vec<Vec<String>> {
        self.flush()
    }

    fn flush(&mut self) -> Vec<Vec<String>> {
        if self.group.is_empty() {
            return Vec::new();
        }
        let width = self.chosen.len();
        let norms: Vec<f64> = (0..width)
            .map(|i| {
                self.mode.norm(
                    self.group
                        .iter()
                        .filter_map(|r| r.field(i).and_then(parse_number)),
                )
            })
            .collect();

        self.group
            .drain(..)
            .map(|record| {
                record
                    .into_fields()
                    .into_iter()
                    .enumerate()
                    .map(|(i, raw)| {
                        if !self.chosen.get(i).copied().unwrap_or(false) || norms[i] == 0.0 {
                            return raw;
                        }
                        match parse_number(&raw) {
                            Some(v) => format_number(v / norms[i]),
                            None => raw,
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn records(header: &[&str], rows: &[&[&str]]) -> Vec<Record> {
        let schema = Arc::new(Schema::from_header(header.iter().copied()));
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                Record::new(
                    i + 2,
                    Arc::clone(&schema),
                    row.iter().map(|s| s.to_string()).collect(),
                )
                .unwrap()
            })
            .collect()
    }

    fn run(normalizer: &mut GroupNormalizer, input: Vec<Record>) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        for record in input {
            out.extend(normalizer.push(record).unwrap());
        }
        out.extend(normalizer.finish());
        out
    }

    #[test]
    fn test_normalizes_each_group() {
        let input = records(
            &["target", "context", "count"],
            &[&["a", "x", "3"], &["a", "y", "4"], &["b", "x", "2"]],
        );
        let mut normalizer = GroupNormalizer::new("target", Some(vec!["count".into()]), NormMode::L2);
        let out = run(&mut normalizer, input);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], vec!["a", "x", "0.6"]);
        assert_eq!(out[1], vec!["a", "y", "0.8"]);
        assert_eq!(out[2], vec!["b", "x", "1.0"]);
    }

    #[test]
    fn test_all_columns_skip_text() {
        let input = records(&["target", "count"], &[&["a", "2"], &["a", "2"]]);
        let mut normalizer = GroupNormalizer::new("target", None, NormMode::L1);
        let out = run(&mut normalizer, input);
        assert_eq!(out[0], vec!["a", "0.5"]);
    }

    #[test]
    fn test_zero_group_unchanged() {
        let input = records(&["target", "count"], &[&["z", "0"], &["z", "0.0"]]);
        let mut normalizer = GroupNormalizer::new("target", None, NormMode::L2);
        let out = run(&mut normalizer, input);
        assert_eq!(out[0], vec!["z", "0"]);
        assert_eq!(out[1], vec!["z", "0.0"]);
    }

    #[test]
    fn test_unknown_column() {
        let schema = Schema::from_header(["target", "count"]);
        let mut normalizer = GroupNormalizer::new("target", Some(vec!["pmi".into()]), NormMode::L2);
        assert!(normalizer.bind(&schema).is_err());
    }
}
