//! Gold and predicted score tables.
//!
//! A score table maps item ids to one or more numeric score columns, read
//! from a tabular stream. The id column defaults to the first column and the
//! value columns default to the second. Every other column is kept as well,
//! so it can be shown next to extremity items.

use crate::error::RecordError;
use crate::record::{parse_records, ColumnKind, Record, RecordHandler, Schema, Value};
use indexmap::IndexMap;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Item id → score, in first-seen order.
pub type Scores = IndexMap<String, f64>;

/// Which columns of a stream hold ids and scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTableOptions {
    /// Id column (default: first column)
    pub id_column: Option<String>,
    /// Score columns (default: second column)
    pub value_columns: Option<Vec<String>>,
    /// Negate every numeric value on load
    pub inverted: bool,
}

impl ScoreTableOptions {
    /// Options selecting `id_column` and `value_columns`.
    pub fn new(id_column: Option<String>, value_columns: Option<Vec<String>>) -> Self {
        Self {
            id_column,
            value_columns,
            inverted: false,
        }
    }

    /// Negates numeric values, for predictions on an inverted scale.
    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }
}

/// Scores per column for a set of items.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    schema: Arc<Schema>,
    id_column: String,
    value_columns: Vec<String>,
    scores: IndexMap<String, Scores>,
    /// Every column of every item, for informational lookups
    cells: IndexMap<String, Vec<Value>>,
}

struct ScoreTableLoader<'a> {
    options: &'a ScoreTableOptions,
    table: Option<ScoreTable>,
    id_position: usize,
    value_positions: Vec<usize>,
    kinds: Option<Vec<ColumnKind>>,
}

impl ScoreTableLoader<'_> {
    fn signed(&self, v: f64) -> f64 {
        if self.options.inverted {
            -v
        } else {
            v
        }
    }
}

impl RecordHandler for ScoreTableLoader<'_> {
    type Error = RecordError;

    fn handle_header(&mut self, _line: &str, schema: &Arc<Schema>) -> Result<(), RecordError> {
        let default_column = |position: usize| {
            schema
                .name(position)
                .map(str::to_string)
                .ok_or_else(|| RecordError::missing_column(&format!("#{}", position + 1), schema.names()))
        };

        let id_column = match &self.options.id_column {
            Some(name) => name.clone(),
            None => default_column(0)?,
        };
        let value_columns = match &self.options.value_columns {
            Some(names) => names.clone(),
            None => vec![default_column(1)?],
        };

        self.id_position = schema.require(&id_column)?;
        self.value_positions = schema.require_all(&value_columns)?;
        self.table = Some(ScoreTable {
            schema: Arc::clone(schema),
            scores: value_columns
                .iter()
                .map(|c| (c.clone(), Scores::new()))
                .collect(),
            id_column,
            value_columns,
            cells: IndexMap::new(),
        });
        Ok(())
    }

    fn handle_data(&mut self, record: Record) -> Result<(), RecordError> {
        let mut parsed = Vec::with_capacity(self.value_positions.len());
        for &position in &self.value_positions {
            parsed.push(self.signed(record.number_at(position)?));
        }

        let kinds = self.kinds.get_or_insert_with(|| record.infer_kinds());
        let cells: Vec<Value> = kinds
            .iter()
            .enumerate()
            .map(|(position, &kind)| match record.value_at(position, kind) {
                Value::Numeric(v) if self.options.inverted => Value::Numeric(-v),
                value => value,
            })
            .collect();

        let table = self.table.as_mut().ok_or(RecordError::MissingHeader)?;
        let key = record.fields()[self.id_position].clone();
        for (column, score) in table.value_columns.iter().zip(parsed) {
            if let Some(scores) = table.scores.get_mut(column) {
                scores.insert(key.clone(), score);
            }
        }
        table.cells.insert(key, cells);
        Ok(())
    }
}

impl ScoreTable {
    /// Reads a score table.
    ///
    /// An id listed twice keeps its first position and its last scores.
    ///
    /// # Errors
    ///
    /// - `RecordError::MissingHeader` for a stream with no header
    /// - `RecordError::MissingColumn` when a requested column is absent
    /// - `RecordError::NotNumeric` when a score does not parse
    /// - structural errors from the record stream
    ///
    /// # Example
    ///
    /// ```
    /// use minimantics_core::evaluation::{ScoreTable, ScoreTableOptions};
    /// use std::io::Cursor;
    ///
    /// let input = "compound\tscore\nice cream\t4.5\nred tape\t1.0\n";
    /// let table = ScoreTable::load(Cursor::new(input), &ScoreTableOptions::default()).unwrap();
    /// assert_eq!(table.value_columns(), ["score"]);
    /// assert_eq!(table.scores("score").unwrap()["red tape"], 1.0);
    /// ```
    #[instrument(skip_all)]
    pub fn load<R: BufRead>(reader: R, options: &ScoreTableOptions) -> Result<Self, RecordError> {
        let mut loader = ScoreTableLoader {
            options,
            table: None,
            id_position: 0,
            value_positions: Vec::new(),
            kinds: None,
        };
        parse_records(reader, &mut loader)?;
        let table = loader.table.ok_or(RecordError::MissingHeader)?;
        debug!(
            items = table.len(),
            columns = table.value_columns.len(),
            "loaded score table"
        );
        Ok(table)
    }

    /// Header of the source stream.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Name of the id column.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Names of the score columns, in the requested order.
    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    /// Scores of one value column.
    pub fn scores(&self, column: &str) -> Option<&Scores> {
        self.scores.get(column)
    }

    /// Value of any column for an item, as printed in reports.
    pub fn info(&self, key: &str, column: &str) -> Option<String> {
        let position = self.schema.position(column)?;
        self.cells
            .get(key)
            .and_then(|cells| cells.get(position))
            .map(Value::to_string)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the table has no items.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
