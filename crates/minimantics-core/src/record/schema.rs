//! Field-name schema established by a header line.

use crate::error::RecordError;
use std::collections::HashMap;

/// Ordered field names of a record stream, with name lookup.
///
/// Names are taken from the header line. A name that is empty or repeats an
/// earlier name is renamed to `_<position>` (0-based), so every field stays
/// addressable by name and positions never shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema from raw header fields, renaming duplicates.
    ///
    /// # Example
    ///
    /// ```
    /// use minimantics_core::record::Schema;
    ///
    /// let schema = Schema::from_header(["target", "cosine", "cosine"]);
    /// assert_eq!(schema.names(), &["target", "cosine", "_2"]);
    /// ```
    pub fn from_header<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut index = HashMap::new();

        for (position, field) in fields.into_iter().enumerate() {
            let mut name: String = field.into();
            if name.is_empty() || index.contains_key(&name) {
                name = format!("_{}", position);
                while index.contains_key(&name) {
                    name.insert(0, '_');
                }
            }
            index.insert(name.clone(), position);
            names.push(name);
        }

        Self { names, index }
    }

    /// Field names in positional order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the header declared no fields.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a field, if present.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns true if the schema has a field named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Position of a field that must exist.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::MissingColumn` naming the column and the header.
    pub fn require(&self, name: &str) -> Result<usize, RecordError> {
        self.position(name)
            .ok_or_else(|| RecordError::missing_column(name, &self.names))
    }

    /// Positions of several required fields, in the order given.
    pub fn require_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, RecordError> {
        names.iter().map(|n| self.require(n.as_ref())).collect()
    }

    /// Name of the field at `position`.
    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_follow_header_order() {
        let schema = Schema::from_header(["target", "context", "count"]);
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.position("target"), Some(0));
        assert_eq!(schema.position("count"), Some(2));
        assert_eq!(schema.position("missing"), None);
        assert_eq!(schema.name(1), Some("context"));
    }

    #[test]
    fn test_duplicate_and_empty_names_renamed() {
        let schema = Schema::from_header(["a", "", "a", "b"]);
        assert_eq!(schema.names(), &["a", "_1", "_2", "b"]);
        assert_eq!(schema.position("_2"), Some(2));
    }

    #[test]
    fn test_renamed_name_never_collides() {
        // "_2" is taken by a real column, so the duplicate at position 2 backs off
        let schema = Schema::from_header(["_2", "x", "x"]);
        assert_eq!(schema.names(), &["_2", "x", "__2"]);
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_require_reports_missing_column() {
        let schema = Schema::from_header(["target", "neighbor"]);
        assert_eq!(schema.require("neighbor").unwrap(), 1);

        let err = schema.require("cosine").unwrap_err();
        assert!(err.to_string().contains("cosine"));
        assert!(err.to_string().contains("target, neighbor"));

        assert!(schema.require_all(&["target", "cosine"]).is_err());
        assert_eq!(schema.require_all(&["neighbor", "target"]).unwrap(), vec![1, 0]);
    }
}
