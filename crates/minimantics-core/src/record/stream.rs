//! Lazy, single-pass reader for tabular record streams.
//!
//! # Line Classification
//!
//! | Line | Classification | Schema-checked |
//! |------|----------------|----------------|
//! | empty, or starts with `#` | comment | no |
//! | first other line | header | establishes the schema |
//! | every later line | data | field count must match the header |
//!
//! Bytes that are not valid UTF-8 are replaced with U+FFFD; that is the only
//! recovery performed. A field-count mismatch ends the stream with
//! [`RecordError::Malformed`]: evaluating partially valid data is unsafe.

use super::schema::Schema;
use super::value::{parse_number, ColumnKind, Value};
use crate::config::COMMENT_PREFIX;
use crate::error::RecordError;
use std::io::BufRead;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Records
// ============================================================================

/// How data lines are split into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// Single tab characters (empty fields allowed)
    #[default]
    Tab,
    /// Runs of whitespace (no empty fields)
    Whitespace,
}

impl Delimiter {
    /// Splits a line into owned fields.
    pub fn split(self, line: &str) -> Vec<String> {
        match self {
            Delimiter::Tab => line.split('\t').map(str::to_string).collect(),
            Delimiter::Whitespace => line.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Joins fields back into a line.
    pub fn join<S: AsRef<str>>(self, fields: &[S]) -> String {
        let sep = match self {
            Delimiter::Tab => "\t",
            Delimiter::Whitespace => " ",
        };
        fields
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// One data line, with field access by name through its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    line: usize,
    schema: Arc<Schema>,
    fields: Vec<String>,
}

impl Record {
    /// Creates a record, checking the field count against the schema.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Malformed` if `fields.len()` differs from the
    /// schema length.
    pub fn new(line: usize, schema: Arc<Schema>, fields: Vec<String>) -> Result<Self, RecordError> {
        if fields.len() != schema.len() {
            return Err(RecordError::Malformed {
                line,
                expected: schema.len(),
                actual: fields.len(),
            });
        }
        Ok(Self {
            line,
            schema,
            fields,
        })
    }

    /// 1-based input line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Schema shared by every record of the stream.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Raw fields in positional order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Consumes the record, returning its fields.
    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    /// Field at `position`.
    pub fn field(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(String::as_str)
    }

    /// Field named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.schema.position(name).and_then(|p| self.field(p))
    }

    /// Field named `name`, which must exist in the schema.
    pub fn require(&self, name: &str) -> Result<&str, RecordError> {
        let position = self.schema.require(name)?;
        Ok(&self.fields[position])
    }

    /// Numeric field at `position`.
    ///
    /// # Errors
    ///
    /// `RecordError::NotNumeric` names the line and column when the field
    /// does not parse as a float.
    pub fn number_at(&self, position: usize) -> Result<f64, RecordError> {
        let raw = self.field(position).unwrap_or_default();
        parse_number(raw).ok_or_else(|| RecordError::NotNumeric {
            line: self.line,
            column: self.schema.name(position).unwrap_or_default().to_string(),
            value: raw.to_string(),
        })
    }

    /// Numeric field named `name`.
    pub fn number(&self, name: &str) -> Result<f64, RecordError> {
        let position = self.schema.require(name)?;
        self.number_at(position)
    }

    /// Typed value of the field at `position`.
    pub fn value_at(&self, position: usize, kind: ColumnKind) -> Value {
        Value::parse(self.field(position).unwrap_or_default(), kind)
    }

    /// Column kinds inferred from this record's values.
    pub fn infer_kinds(&self) -> Vec<ColumnKind> {
        self.schema
            .names()
            .iter()
            .zip(&self.fields)
            .map(|(name, raw)| ColumnKind::infer(name, raw))
            .collect()
    }

    /// Re-serializes the record; for tab-delimited input this reproduces
    /// the original line.
    pub fn to_line(&self, delimiter: Delimiter) -> String {
        delimiter.join(&self.fields)
    }
}

// ============================================================================
// Stream
// ============================================================================

/// An item produced by [`RecordStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Empty or `#` line, unmodified
    Comment(String),
    /// Header line and the schema built from it
    Header {
        /// Raw header line
        line: String,
        /// Schema built from the header
        schema: Arc<Schema>,
    },
    /// Data record
    Data(Record),
}

/// Iterator over the lines of a tabular stream.
///
/// The stream is single-pass and not restartable. After an error it yields
/// `None`.
pub struct RecordStream<R> {
    reader: R,
    delimiter: Delimiter,
    schema: Option<Arc<Schema>>,
    line: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> RecordStream<R> {
    /// Creates a tab-delimited stream.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            delimiter: Delimiter::Tab,
            schema: None,
            line: 0,
            buf: Vec::new(),
            done: false,
        }
    }

    /// Sets the field delimiter.
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Schema, once the header has been read.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line
    }

    fn read_line(&mut self) -> Result<Option<String>, RecordError> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|source| RecordError::Io {
                line: self.line + 1,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        self.line += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    fn next_item(&mut self) -> Result<Option<StreamItem>, RecordError> {
        let Some(line) = self.read_line()? else {
            return Ok(None);
        };

        if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
            return Ok(Some(StreamItem::Comment(line)));
        }

        let fields = self.delimiter.split(&line);
        match &self.schema {
            None => {
                let schema = Arc::new(Schema::from_header(fields));
                debug!(fields = schema.len(), "read header");
                self.schema = Some(Arc::clone(&schema));
                Ok(Some(StreamItem::Header { line, schema }))
            }
            Some(schema) => {
                let record = Record::new(self.line, Arc::clone(schema), fields)?;
                Ok(Some(StreamItem::Data(record)))
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<StreamItem, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Callbacks driven by [`parse_records`].
///
/// Only `handle_data` is required. Every callback may fail; the first error
/// aborts the parse and is returned to the caller.
pub trait RecordHandler {
    /// Error type of the handler; stream errors convert into it.
    type Error: From<RecordError>;

    /// Called before the first line.
    fn begin(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for each comment or empty line.
    fn handle_comment(&mut self, _line: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called once with the header.
    fn handle_header(&mut self, _line: &str, _schema: &Arc<Schema>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for each data record.
    fn handle_data(&mut self, record: Record) -> Result<(), Self::Error>;

    /// Called after the last line.
    fn end(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Parses a tab-delimited stream, driving `handler`.
pub fn parse_records<R, H>(reader: R, handler: &mut H) -> Result<(), H::Error>
where
    R: BufRead,
    H: RecordHandler + ?Sized,
{
    parse_records_with(reader, Delimiter::Tab, handler)
}

/// Parses a stream with an explicit delimiter, driving `handler`.
pub fn parse_records_with<R, H>(reader: R, delimiter: Delimiter, handler: &mut H) -> Result<(), H::Error>
where
    R: BufRead,
    H: RecordHandler + ?Sized,
{
    handler.begin()?;
    for item in RecordStream::new(reader).with_delimiter(delimiter) {
        match item? {
            StreamItem::Comment(line) => handler.handle_comment(&line)?,
            StreamItem::Header { line, schema } => handler.handle_header(&line, &schema)?,
            StreamItem::Data(record) => handler.handle_data(record)?,
        }
    }
    handler.end()
}
