//! Cosine similarity and word-similarity oracles.
//!
//! - [`cosine_sparse`] compares two sparse vectors over the union of their
//!   sub-keys, one field at a time.
//! - [`cosine_dense`] compares two embeddings.
//! - [`EmbeddingSet`] maps words to dense embeddings loaded from a text file.
//! - [`WordSimilarity`] is the seam through which commands query an oracle
//!   (an embedding set or a thesaurus) without knowing which one it is.

use super::store::SparseVector;
use crate::diagnostics::DiagnosticSink;
use crate::error::{EmbeddingError, SimilarityError};
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use tracing::{debug, instrument};

// ============================================================================
// Cosine
// ============================================================================

/// Cosine of field `field` between two sparse vectors.
///
/// Dimensions are the union of both vectors' sub-keys; a sub-key absent
/// from one vector (or holding a non-numeric value) contributes 0.
///
/// # Errors
///
/// `SimilarityError::ZeroNorm` if either vector has zero norm on `field`.
///
/// # Example
///
/// ```
/// use minimantics_core::vectors::{cosine_sparse, SparseVector};
/// use minimantics_core::record::Value;
///
/// let mut a = SparseVector::new();
/// a.insert("x", vec![Some(Value::Numeric(3.0))]);
/// a.insert("y", vec![Some(Value::Numeric(4.0))]);
/// let cos = cosine_sparse(("a", &a), ("a", &a), 0).unwrap();
/// assert!((cos - 1.0).abs() < 1e-9);
/// ```
pub fn cosine_sparse(
    (name_a, a): (&str, &SparseVector),
    (name_b, b): (&str, &SparseVector),
    field: usize,
) -> Result<f64, SimilarityError> {
    let mut seen = HashSet::new();
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for subkey in a.subkeys().chain(b.subkeys()) {
        if !seen.insert(subkey) {
            continue;
        }
        let x = a.value(subkey, field).unwrap_or(0.0);
        let y = b.value(subkey, field).unwrap_or(0.0);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 {
        return Err(SimilarityError::ZeroNorm(name_a.to_string()));
    }
    if norm_b == 0.0 {
        return Err(SimilarityError::ZeroNorm(name_b.to_string()));
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Cosine between two dense vectors.
///
/// # Errors
///
/// `DimensionMismatch` for vectors of different lengths, `ZeroNorm` when
/// either vector is all zeros (named `"a"` or `"b"`).
pub fn cosine_dense(a: &[f64], b: &[f64]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();

    if mag_a == 0.0 {
        return Err(SimilarityError::ZeroNorm("a".to_string()));
    }
    if mag_b == 0.0 {
        return Err(SimilarityError::ZeroNorm("b".to_string()));
    }
    Ok(dot / (mag_a * mag_b))
}

// ============================================================================
// Oracles
// ============================================================================

/// A source of word-pair similarities.
pub trait WordSimilarity {
    /// Similarity between `a` and `b`.
    ///
    /// # Errors
    ///
    /// A lookup miss (`UnknownWord`, `UnknownPair`) or a degenerate
    /// computation (`ZeroNorm`).
    fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError>;
}

/// Resolves a similarity lookup, substituting `default` on failure.
///
/// Each distinct failure is reported once through `sink`.
pub fn similarity_or_default<S: WordSimilarity + ?Sized>(
    oracle: &S,
    a: &str,
    b: &str,
    default: f64,
    sink: &mut DiagnosticSink,
) -> f64 {
    match oracle.similarity(a, b) {
        Ok(value) => value,
        Err(e) => {
            sink.warn_once(format!("{}; using {}", e, default));
            default
        }
    }
}

/// Word embeddings loaded from a word2vec-style text file.
#[derive(Debug, Default, Clone)]
pub struct EmbeddingSet {
    vectors: HashMap<String, Vec<f64>>,
}

impl EmbeddingSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads embeddings: the first line (a size header) is ignored, then
    /// each line is `word x1 x2 ... xN`, separated by single spaces.
    ///
    /// A word that appears twice keeps its last vector.
    ///
    /// # Errors
    ///
    /// `EmbeddingError::BadFloat` names the 1-based line and component
    /// column of a value that is not a float.
    #[instrument(skip_all)]
    pub fn load<R: BufRead>(reader: R) -> Result<Self, EmbeddingError> {
        let mut set = Self::new();
        set.add_from(reader)?;
        debug!(words = set.len(), "loaded embeddings");
        Ok(set)
    }

    /// Adds the embeddings of `reader` to the set.
    pub fn add_from<R: BufRead>(&mut self, mut reader: R) -> Result<(), EmbeddingError> {
        let mut buf = Vec::new();
        let mut line = 0;
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| EmbeddingError::Io {
                    line: line + 1,
                    source,
                })?;
            if n == 0 {
                return Ok(());
            }
            line += 1;
            if line == 1 {
                continue;
            }

            let text = String::from_utf8_lossy(&buf);
            let text = text.trim_end();
            if text.is_empty() {
                continue;
            }
            let mut parts = text.split(' ');
            let word = parts.next().unwrap_or_default().to_string();
            let vector = parts
                .enumerate()
                .map(|(i, raw)| {
                    raw.parse::<f64>().map_err(|_| EmbeddingError::BadFloat {
                        line,
                        column: i + 1,
                        value: raw.to_string(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            if vector.is_empty() {
                return Err(EmbeddingError::EmptyVector { line, word });
            }
            self.vectors.insert(word, vector);
        }
    }

    /// Inserts one embedding.
    pub fn insert(&mut self, word: impl Into<String>, vector: Vec<f64>) {
        self.vectors.insert(word.into(), vector);
    }

    /// Embedding of `word`.
    pub fn get(&self, word: &str) -> Option<&[f64]> {
        self.vectors.get(word).map(Vec::as_slice)
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Returns true if no embedding was loaded.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Cosine between the embeddings of two words.
    ///
    /// # Errors
    ///
    /// `UnknownWord` if either word has no embedding; `ZeroNorm` and
    /// `DimensionMismatch` as for [`cosine_dense`], naming the word.
    pub fn cosine(&self, w1: &str, w2: &str) -> Result<f64, SimilarityError> {
        let a = self
            .get(w1)
            .ok_or_else(|| SimilarityError::UnknownWord(w1.to_string()))?;
        let b = self
            .get(w2)
            .ok_or_else(|| SimilarityError::UnknownWord(w2.to_string()))?;
        cosine_dense(a, b).map_err(|e| match e {
            SimilarityError::ZeroNorm(side) if side == "a" => SimilarityError::ZeroNorm(w1.to_string()),
            SimilarityError::ZeroNorm(_) => SimilarityError::ZeroNorm(w2.to_string()),
            other => other,
        })
    }
}

impl WordSimilarity for EmbeddingSet {
    fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        self.cosine(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use std::io::Cursor;

    fn sparse(entries: &[(&str, f64)]) -> SparseVector {
        let mut v = SparseVector::new();
        for (k, x) in entries {
            v.insert(*k, vec![Some(Value::Numeric(*x))]);
        }
        v
    }

    #[test]
    fn test_orthogonal_and_identical() {
        let a = sparse(&[("x", 1.0)]);
        let b = sparse(&[("y", 1.0)]);
        assert_eq!(cosine_sparse(("a", &a), ("b", &b), 0).unwrap(), 0.0);

        let c = sparse(&[("x", 3.0), ("y", 4.0)]);
        let cos = cosine_sparse(("c", &c), ("c", &c), 0).unwrap();
        assert!((cos - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_union_of_subkeys() {
        let a = sparse(&[("x", 1.0), ("y", 1.0)]);
        let b = sparse(&[("y", 1.0), ("z", 1.0)]);
        let cos = cosine_sparse(("a", &a), ("b", &b), 0).unwrap();
        assert!((cos - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_zero_norm_names_vector() {
        let a = sparse(&[("x", 1.0)]);
        let zero = sparse(&[("x", 0.0)]);
        assert_eq!(
            cosine_sparse(("a", &a), ("nil", &zero), 0),
            Err(SimilarityError::ZeroNorm("nil".into()))
        );
    }

    #[test]
    fn test_dense_errors() {
        assert!(matches!(
            cosine_dense(&[1.0, 0.0], &[1.0]),
            Err(SimilarityError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            cosine_dense(&[0.0, 0.0], &[1.0, 1.0]),
            Err(SimilarityError::ZeroNorm(_))
        ));
        let cos = cosine_dense(&[1.0, 1.0], &[-1.0, -1.0]).unwrap();
        assert!((cos + 1.0).abs() < 1e-9);
    }

    const EMBEDDINGS: &str = "3 2\ncat 1.0 0.0\ndog 0.6 0.8\nnil 0 0\n";

    #[test]
    fn test_load_embeddings_skips_first_line() {
        let set = EmbeddingSet::load(Cursor::new(EMBEDDINGS)).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.get("3").is_none());
        assert!((set.cosine("cat", "dog").unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_embedding_lookup_errors() {
        let set = EmbeddingSet::load(Cursor::new(EMBEDDINGS)).unwrap();
        assert_eq!(
            set.cosine("cat", "emu"),
            Err(SimilarityError::UnknownWord("emu".into()))
        );
        assert_eq!(
            set.cosine("nil", "cat"),
            Err(SimilarityError::ZeroNorm("nil".into()))
        );
    }

    #[test]
    fn test_bad_float_reports_position() {
        let err = EmbeddingSet::load(Cursor::new("2 2\ncat 1.0 0.0\ndog 0.5 x\n")).unwrap_err();
        match err {
            EmbeddingError::BadFloat {
                line,
                column,
                value,
            } => {
                assert_eq!((line, column), (3, 2));
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_similarity_or_default() {
        let set = EmbeddingSet::load(Cursor::new(EMBEDDINGS)).unwrap();
        let mut sink = DiagnosticSink::new();
        assert_eq!(similarity_or_default(&set, "cat", "emu", 0.0, &mut sink), 0.0);
        assert_eq!(similarity_or_default(&set, "cat", "emu", 0.0, &mut sink), 0.0);
        assert_eq!(sink.messages().len(), 1);
        assert!(sink.contains("unknown word `emu`"));

        let cos = similarity_or_default(&set, "dog", "dog", 0.0, &mut sink);
        assert!((cos - 1.0).abs() < 1e-9);
    }
}
