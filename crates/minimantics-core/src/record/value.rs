//! Typed cell values.

use crate::config::ID_FIELD_PREFIX;
use serde::Serialize;
use std::fmt;

/// Kind of a column, decided once per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Values are parsed as `f64`
    Numeric,
    /// Values are kept verbatim
    Text,
}

impl ColumnKind {
    /// Infers the kind of a column from its name and a sample value.
    ///
    /// Identifier columns (`id_` prefix) are always text, even when their
    /// values look numeric, so they are never summed.
    pub fn infer(name: &str, sample: &str) -> Self {
        if name.starts_with(ID_FIELD_PREFIX) {
            ColumnKind::Text
        } else if parse_number(sample).is_some() {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        }
    }
}

/// A cell value: either a number or text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric value
    Numeric(f64),
    /// Text value
    Text(String),
}

impl Value {
    /// Parses a raw field according to its column kind.
    ///
    /// A numeric column whose value does not parse keeps the raw text.
    pub fn parse(raw: &str, kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Numeric => match parse_number(raw) {
                Some(v) => Value::Numeric(v),
                None => Value::Text(raw.to_string()),
            },
            ColumnKind::Text => Value::Text(raw.to_string()),
        }
    }

    /// Numeric content, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    /// Returns true for `Value::Numeric`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Numeric(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(v) => f.write_str(&format_number(*v)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Parses a float, tolerating surrounding whitespace.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Formats a number so integral values keep a decimal point (`3.0`).
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}
