//! Error types for minimantics-core.
//!
//! Structural problems with the input (bad field counts, missing columns,
//! unreadable streams) are fatal and carry the offending line or column.
//! Lookup misses and degenerate computations are recoverable; callers decide
//! how to resolve them (usually with a default value and a warning).

use std::io;
use thiserror::Error;

/// Errors raised while reading a tabular record stream.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Data line with a different number of fields than the header
    #[error("line {line}: expected {expected} fields, got {actual}")]
    Malformed {
        /// 1-based input line number
        line: usize,
        /// Field count declared by the header
        expected: usize,
        /// Field count found on the line
        actual: usize,
    },
    /// Underlying reader failed
    #[error("line {line}: read failed: {source}")]
    Io {
        /// 1-based number of the line being read
        line: usize,
        /// Reader error
        #[source]
        source: io::Error,
    },
    /// A required column is absent from the header
    #[error("missing column `{column}` in header [{}]", .header.join(", "))]
    MissingColumn {
        /// Column that was requested
        column: String,
        /// Field names actually present
        header: Vec<String>,
    },
    /// A column expected to hold numbers holds something else
    #[error("line {line}, column `{column}`: expected a number, got {value:?}")]
    NotNumeric {
        /// 1-based input line number
        line: usize,
        /// Column name
        column: String,
        /// Raw field value
        value: String,
    },
    /// The stream ended before a header line was seen
    #[error("input has no header line")]
    MissingHeader,
    /// A score column has no data rows
    #[error("{source_name}: column `{column}` has no scored items")]
    EmptyColumn {
        /// Name of the table the column belongs to
        source_name: String,
        /// Column name
        column: String,
    },
}

/// Errors raised by running statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatsError {
    /// Mean or deviation requested before any value was added
    #[error("statistics requested on an empty sample")]
    EmptySample,
}

/// Errors raised when a similarity cannot be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimilarityError {
    /// Word absent from an embedding set or vector store
    #[error("unknown word `{0}`")]
    UnknownWord(String),
    /// Pair absent from a thesaurus
    #[error("unknown pair (`{0}`, `{1}`)")]
    UnknownPair(String, String),
    /// One of the vectors has zero norm
    #[error("zero-norm vector for `{0}`")]
    ZeroNorm(String),
    /// Dense vectors of different lengths
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the first vector
        expected: usize,
        /// Length of the second vector
        actual: usize,
    },
}

/// Errors raised while loading an embedding file.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Underlying reader failed
    #[error("line {line}: read failed: {source}")]
    Io {
        /// 1-based number of the line being read
        line: usize,
        /// Reader error
        #[source]
        source: io::Error,
    },
    /// A vector component is not a float
    #[error("bad float in line {line} (col {column}): {value:?}")]
    BadFloat {
        /// 1-based input line number
        line: usize,
        /// 1-based component position
        column: usize,
        /// Raw component text
        value: String,
    },
    /// A line names a word but carries no components
    #[error("line {line}: word `{word}` has no vector components")]
    EmptyVector {
        /// 1-based input line number
        line: usize,
        /// Word on that line
        word: String,
    },
}

impl RecordError {
    /// Builds a `MissingColumn` error from a header slice.
    pub fn missing_column(column: &str, header: &[String]) -> Self {
        RecordError::MissingColumn {
            column: column.to_string(),
            header: header.to_vec(),
        }
    }

    /// Returns the 1-based line number the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            RecordError::Malformed { line, .. }
            | RecordError::Io { line, .. }
            | RecordError::NotNumeric { line, .. } => Some(*line),
            RecordError::MissingColumn { .. }
            | RecordError::MissingHeader
            | RecordError::EmptyColumn { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_line() {
        let err = RecordError::Malformed {
            line: 12,
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "line 12: expected 3 fields, got 2");
        assert_eq!(err.line(), Some(12));
    }

    #[test]
    fn test_missing_column_lists_header() {
        let header = vec!["target".to_string(), "cosine".to_string()];
        let err = RecordError::missing_column("context", &header);
        assert_eq!(
            err.to_string(),
            "missing column `context` in header [target, cosine]"
        );
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_bad_float_message() {
        let err = EmbeddingError::BadFloat {
            line: 4,
            column: 2,
            value: "x".to_string(),
        };
        assert_eq!(err.to_string(), "bad float in line 4 (col 2): \"x\"");
    }
}
