//! Keyed sparse-vector store.
//!
//! A count-based model is a set of sparse vectors: for every target word
//! (the key) a row per context feature (the sub-key), each row carrying a
//! few measures (counts, association scores, identifiers). The store
//! accumulates those rows from one or more record streams, merges duplicate
//! cells, sums vectors into new keys and normalizes them.
//!
//! # Merge Rules
//!
//! | Field kind | Both present |
//! |------------|--------------|
//! | numeric | values are summed |
//! | identifier (`id_` prefix, flagged, key, sub-key) | must match; on mismatch the first is kept and a warning emitted |
//! | other text | first value kept |
//!
//! A [`CombinePolicy::replacing`] policy instead lets the later row win.
//!
//! # Memory
//!
//! Full models do not fit in memory. [`KeyedVectorStore::retain_only`]
//! restricts the store to the keys some combination needs; rows for other
//! keys are dropped as they are read.

use crate::config::{ID_FIELD_PREFIX, MISSING_FIELD_PLACEHOLDER, NOTHING_KEY};
use crate::diagnostics::DiagnosticSink;
use crate::error::RecordError;
use crate::record::{ColumnKind, Record, RecordStream, Schema, StreamItem, Value};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, instrument};

// ============================================================================
// Cells and vectors
// ============================================================================

/// One (key, sub-key) entry: an optional value per interned field of the
/// owning store. Cells created before a field was interned are shorter than
/// the field table; missing slots read as absent.
pub type Cell = Vec<Option<Value>>;

/// Sparse vector of one key: sub-key to cell, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    cells: IndexMap<String, Cell>,
}

impl SparseVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sub-keys.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the vector has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell for `subkey`.
    pub fn get(&self, subkey: &str) -> Option<&Cell> {
        self.cells.get(subkey)
    }

    /// Numeric value of field `field` (interned index) at `subkey`.
    pub fn value(&self, subkey: &str, field: usize) -> Option<f64> {
        self.cells
            .get(subkey)
            .and_then(|cell| cell_value(cell, field))
            .and_then(Value::as_f64)
    }

    /// Sub-keys in insertion order.
    pub fn subkeys(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// (sub-key, cell) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Inserts or replaces a cell.
    pub fn insert(&mut self, subkey: impl Into<String>, cell: Cell) -> Option<Cell> {
        self.cells.insert(subkey.into(), cell)
    }

    fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.values_mut()
    }

    fn entry(&mut self, subkey: &str) -> &mut Cell {
        self.cells.entry(subkey.to_string()).or_default()
    }
}

fn cell_value(cell: &Cell, field: usize) -> Option<&Value> {
    cell.get(field).and_then(Option::as_ref)
}

// ============================================================================
// Combine policy
// ============================================================================

/// What happened when two values of a field met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The slot was empty or the incoming value was absent
    Filled,
    /// Numeric values were added
    Summed,
    /// First value kept (text field, or equal identifiers)
    KeptFirst,
    /// Identifier values differ; first value kept
    Conflict,
    /// Later value replaced the earlier one
    Replaced,
}

/// How duplicate cells are merged.
#[derive(Debug, Clone)]
pub struct CombinePolicy {
    key_field: String,
    subkey_field: String,
    identifiers: HashSet<String>,
    replace: bool,
}

impl CombinePolicy {
    /// Policy for stores keyed on `key_field` / `subkey_field`.
    pub fn new(key_field: impl Into<String>, subkey_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            subkey_field: subkey_field.into(),
            identifiers: HashSet::new(),
            replace: false,
        }
    }

    /// Makes later values replace earlier ones instead of merging.
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Flags an additional field as identifier-like.
    pub fn with_identifier(mut self, field: impl Into<String>) -> Self {
        self.identifiers.insert(field.into());
        self
    }

    /// Key column name.
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Sub-key column name.
    pub fn subkey_field(&self) -> &str {
        &self.subkey_field
    }

    /// Returns true if values of `field` must match instead of being summed.
    pub fn is_identifier(&self, field: &str) -> bool {
        field.starts_with(ID_FIELD_PREFIX)
            || field == self.key_field
            || field == self.subkey_field
            || self.identifiers.contains(field)
    }

    /// Merges `incoming` into `slot` for a field named `field`.
    pub fn merge(&self, field: &str, slot: &mut Option<Value>, incoming: Option<Value>) -> MergeOutcome {
        let Some(incoming) = incoming else {
            return MergeOutcome::Filled;
        };
        if slot.is_none() {
            *slot = Some(incoming);
            return MergeOutcome::Filled;
        }
        if self.replace {
            *slot = Some(incoming);
            return MergeOutcome::Replaced;
        }
        let Some(current) = slot.as_mut() else {
            return MergeOutcome::Filled;
        };

        if self.is_identifier(field) {
            return if *current == incoming {
                MergeOutcome::KeptFirst
            } else {
                MergeOutcome::Conflict
            };
        }
        match (current, &incoming) {
            (Value::Numeric(a), Value::Numeric(b)) => {
                *a += b;
                MergeOutcome::Summed
            }
            _ => MergeOutcome::KeptFirst,
        }
    }
}

impl Default for CombinePolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_KEY_FIELD,
            crate::config::DEFAULT_SUBKEY_FIELD,
        )
    }
}

// ============================================================================
// Combinations
// ============================================================================

/// A requested sum: `result` is the sum of `operands`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    /// Key the summed vector is stored under
    pub result: String,
    /// Keys to sum; may contain `@NOTHING`
    pub operands: Vec<String>,
}

impl Combination {
    /// Creates a combination.
    pub fn new<S: Into<String>>(result: impl Into<String>, operands: impl IntoIterator<Item = S>) -> Self {
        Self {
            result: result.into(),
            operands: operands.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads combinations from a tabular stream.
    ///
    /// After the header, each data line holds the result key in its first
    /// field and the operand keys in the remaining fields. Lines of
    /// different arity pad with `@NOTHING`; empty fields are ignored.
    ///
    /// # Errors
    ///
    /// Structural parse errors of the stream.
    pub fn load<R: BufRead>(reader: R) -> Result<Vec<Self>, RecordError> {
        let mut combinations = Vec::new();
        for item in RecordStream::new(reader) {
            if let StreamItem::Data(record) = item? {
                let mut fields = record.into_fields().into_iter();
                let Some(result) = fields.next() else {
                    continue;
                };
                let operands: Vec<String> = fields.filter(|f| !f.is_empty()).collect();
                combinations.push(Self::new(result, operands));
            }
        }
        debug!(count = combinations.len(), "loaded combinations");
        Ok(combinations)
    }

    /// Operand keys of every combination, without the `@NOTHING` sentinel.
    pub fn keys_of_interest(combinations: &[Self]) -> HashSet<String> {
        combinations
            .iter()
            .flat_map(|c| c.operands.iter())
            .filter(|k| k.as_str() != NOTHING_KEY)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Store
// ============================================================================

/// Normalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormMode {
    /// Sum of values (signed; no absolute value is taken)
    L1,
    /// Square root of the sum of squares
    #[default]
    L2,
}

impl NormMode {
    /// Norm of a sequence of values.
    pub fn norm(self, values: impl Iterator<Item = f64>) -> f64 {
        match self {
            NormMode::L1 => values.sum(),
            NormMode::L2 => values.map(|v| v * v).sum::<f64>().sqrt(),
        }
    }
}

/// Column positions of one input schema, resolved once per header.
#[derive(Debug)]
struct Binding {
    schema: Arc<Schema>,
    key: usize,
    subkey: usize,
    /// Interned field index of every schema position
    fields: Vec<usize>,
    /// Column kinds, inferred from the first record of the stream
    kinds: Vec<ColumnKind>,
}

/// Sparse vectors grouped by key.
#[derive(Debug)]
pub struct KeyedVectorStore {
    policy: CombinePolicy,
    fields: Vec<String>,
    field_index: HashMap<String, usize>,
    vectors: IndexMap<String, SparseVector>,
    retain: Option<HashSet<String>>,
    source: String,
    source_cells: HashSet<(String, String)>,
    binding: Option<Binding>,
    dropped: usize,
}

impl KeyedVectorStore {
    /// Creates an empty store merging with `policy`.
    pub fn new(policy: CombinePolicy) -> Self {
        Self {
            policy,
            fields: Vec::new(),
            field_index: HashMap::new(),
            vectors: IndexMap::new(),
            retain: None,
            source: String::from("<input>"),
            source_cells: HashSet::new(),
            binding: None,
            dropped: 0,
        }
    }

    /// Merge policy of the store.
    pub fn policy(&self) -> &CombinePolicy {
        &self.policy
    }

    /// Only keep rows whose key is in `keys`; everything else is dropped on
    /// arrival.
    pub fn retain_only(&mut self, keys: HashSet<String>) {
        self.vectors.retain(|k, _| keys.contains(k));
        self.retain = Some(keys);
    }

    /// Marks the start of a new input stream named `name`.
    ///
    /// Duplicate (key, sub-key) entries are only reported when they come
    /// from the same stream; across streams they are the expected merge.
    pub fn begin_source(&mut self, name: impl Into<String>) {
        self.source = name.into();
        self.source_cells.clear();
        self.binding = None;
    }

    /// Interned field names: the union of every header seen, in first-seen
    /// order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Interned index of `field`.
    pub fn field_position(&self, field: &str) -> Option<usize> {
        self.field_index.get(field).copied()
    }

    /// Interns a field name, returning its index.
    pub fn intern(&mut self, field: &str) -> usize {
        if let Some(&i) = self.field_index.get(field) {
            return i;
        }
        self.fields.push(field.to_string());
        self.field_index.insert(field.to_string(), self.fields.len() - 1);
        self.fields.len() - 1
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Returns true if the store holds no vector.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Number of rows dropped by `retain_only`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Vector of `key`.
    pub fn vector(&self, key: &str) -> Option<&SparseVector> {
        self.vectors.get(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vectors.keys().map(String::as_str)
    }

    /// Stores `vector` under `key`, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, vector: SparseVector) {
        self.vectors.insert(key.into(), vector);
    }

    fn bind(&mut self, record: &Record) -> Result<(), RecordError> {
        if let Some(binding) = &self.binding {
            if Arc::ptr_eq(&binding.schema, record.schema()) {
                return Ok(());
            }
        }
        let schema = Arc::clone(record.schema());
        let key = schema.require(self.policy.key_field())?;
        let subkey = schema.require(self.policy.subkey_field())?;
        let fields = schema.names().iter().map(|n| self.intern(n)).collect();
        let kinds = schema
            .names()
            .iter()
            .zip(record.fields())
            .map(|(name, raw)| {
                if self.policy.is_identifier(name) {
                    ColumnKind::Text
                } else {
                    ColumnKind::infer(name, raw)
                }
            })
            .collect();
        self.binding = Some(Binding {
            schema,
            key,
            subkey,
            fields,
            kinds,
        });
        Ok(())
    }

    /// Adds one record, merging it into its (key, sub-key) cell.
    ///
    /// # Errors
    ///
    /// `RecordError::MissingColumn` when the record lacks the key or
    /// sub-key column.
    pub fn add_record(&mut self, record: &Record, sink: &mut DiagnosticSink) -> Result<(), RecordError> {
        self.bind(record)?;
        let Some(binding) = &self.binding else {
            return Ok(());
        };

        let key = record.field(binding.key).unwrap_or_default().to_string();
        let subkey = record.field(binding.subkey).unwrap_or_default().to_string();
        let values: Vec<(usize, Value)> = binding
            .fields
            .iter()
            .zip(&binding.kinds)
            .enumerate()
            .map(|(pos, (&field, &kind))| (field, record.value_at(pos, kind)))
            .collect();

        self.merge_entry(key, subkey, values, sink);
        Ok(())
    }

    /// Adds one entry given as (field name, value) pairs. The key and
    /// sub-key fields are filled in from `key` / `subkey`.
    pub fn add_entry(
        &mut self,
        key: &str,
        subkey: &str,
        values: Vec<(String, Value)>,
        sink: &mut DiagnosticSink,
    ) {
        let key_field = self.policy.key_field().to_string();
        let subkey_field = self.policy.subkey_field().to_string();
        let mut interned = vec![
            (self.intern(&key_field), Value::Text(key.to_string())),
            (self.intern(&subkey_field), Value::Text(subkey.to_string())),
        ];
        for (name, value) in values {
            interned.push((self.intern(&name), value));
        }
        self.merge_entry(key.to_string(), subkey.to_string(), interned, sink);
    }

    fn merge_entry(
        &mut self,
        key: String,
        subkey: String,
        values: Vec<(usize, Value)>,
        sink: &mut DiagnosticSink,
    ) {
        if let Some(retain) = &self.retain {
            if !retain.contains(&key) {
                self.dropped += 1;
                return;
            }
        }

        if !self.source_cells.insert((key.clone(), subkey.clone())) {
            sink.warn(format!(
                "duplicate entry ({}, {}) in {}; merging",
                key, subkey, self.source
            ));
        }

        let width = self.fields.len();
        let vector = self.vectors.entry(key.clone()).or_default();
        let cell = vector.entry(&subkey);
        cell.resize(width.max(cell.len()), None);

        for (field, value) in values {
            let name = &self.fields[field];
            if self.policy.merge(name, &mut cell[field], Some(value)) == MergeOutcome::Conflict {
                sink.warn(format!(
                    "conflicting `{}` for ({}, {}); keeping the first value",
                    name, key, subkey
                ));
            }
        }
    }

    /// Sums the vectors of `operands` into a new vector.
    ///
    /// The result holds the union of the operands' sub-keys; each cell is
    /// combined over the operands that have it. `@NOTHING` operands are
    /// skipped silently; other missing operands are skipped with a warning.
    /// The key field of every result cell is set to `new_key`.
    pub fn sum<S: AsRef<str>>(&self, new_key: &str, operands: &[S], sink: &mut DiagnosticSink) -> SparseVector {
        let key_field = self.field_position(self.policy.key_field());
        let mut result = SparseVector::new();

        for operand in operands.iter().map(AsRef::as_ref) {
            if operand == NOTHING_KEY {
                continue;
            }
            let Some(vector) = self.vectors.get(operand) else {
                sink.warn(format!(
                    "operand `{}` of `{}` has no vector; skipping",
                    operand, new_key
                ));
                continue;
            };

            for (subkey, incoming) in vector.iter() {
                let cell = result.entry(subkey);
                cell.resize(self.fields.len(), None);
                for (field, value) in incoming.iter().enumerate() {
                    if Some(field) == key_field {
                        cell[field] = Some(Value::Text(new_key.to_string()));
                        continue;
                    }
                    let name = &self.fields[field];
                    if self.policy.merge(name, &mut cell[field], value.clone())
                        == MergeOutcome::Conflict
                    {
                        sink.warn_once(format!(
                            "field `{}` differs across summed operands; keeping the first value",
                            name
                        ));
                    }
                }
            }
        }
        result
    }

    /// Evaluates every combination and stores the results under their keys.
    #[instrument(skip_all, fields(combinations = combinations.len()))]
    pub fn apply_combinations(&mut self, combinations: &[Combination], sink: &mut DiagnosticSink) {
        for combination in combinations {
            let vector = self.sum(&combination.result, &combination.operands, sink);
            self.vectors.insert(combination.result.clone(), vector);
        }
    }

    /// Fields eligible for normalization: every non-identifier field.
    pub fn measure_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !self.policy.is_identifier(f))
            .cloned()
            .collect()
    }

    /// Normalizes the given fields of every vector.
    ///
    /// For each vector and field, the norm is taken over all sub-keys and
    /// every numeric value is divided by it. A zero norm leaves the field
    /// unchanged.
    ///
    /// # Errors
    ///
    /// `RecordError::MissingColumn` if a field was never seen.
    pub fn normalize<S: AsRef<str>>(&mut self, fields: &[S], mode: NormMode) -> Result<(), RecordError> {
        let positions: Vec<usize> = fields
            .iter()
            .map(|f| {
                self.field_position(f.as_ref())
                    .ok_or_else(|| RecordError::missing_column(f.as_ref(), &self.fields))
            })
            .collect::<Result<_, _>>()?;

        for vector in self.vectors.values_mut() {
            normalize_vector(vector, &positions, mode);
        }
        Ok(())
    }

    /// Renders a cell as output fields in interned order; absent values
    /// print as `?`.
    pub fn render(&self, cell: &Cell) -> Vec<String> {
        (0..self.fields.len())
            .map(|i| match cell_value(cell, i) {
                Some(value) => value.to_string(),
                None => MISSING_FIELD_PLACEHOLDER.to_string(),
            })
            .collect()
    }

    /// Every (key, sub-key, cell) in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &Cell)> {
        self.vectors.iter().flat_map(|(key, vector)| {
            vector
                .iter()
                .map(move |(subkey, cell)| (key.as_str(), subkey, cell))
        })
    }
}

/// Divides the given fields of `vector` by their norm over all sub-keys.
pub fn normalize_vector(vector: &mut SparseVector, fields: &[usize], mode: NormMode) {
    for &field in fields {
        let norm = mode.norm(
            vector
                .iter()
                .filter_map(|(_, cell)| cell_value(cell, field).and_then(Value::as_f64)),
        );
        if norm == 0.0 {
            continue;
        }
        for cell in vector.cells_mut() {
            if let Some(Some(Value::Numeric(v))) = cell.get_mut(field) {
                *v /= norm;
            }
        }
    }
}
