//! Production configuration constants.
//!
//! These values define the conventions shared by every tool in the suite:
//! column names produced by the count-based model, reserved keys, and the
//! default cut-offs used when evaluating thesauri.
//!
//! # Usage
//!
//! ```
//! use minimantics_core::config::{DEFAULT_KEY_FIELD, NOTHING_KEY};
//!
//! assert_eq!(DEFAULT_KEY_FIELD, "target");
//! assert!(NOTHING_KEY.starts_with('@'));
//! ```

// =============================================================================
// Record Format
// =============================================================================

/// Lines starting with this character are comments.
pub const COMMENT_PREFIX: char = '#';

/// Default field delimiter of tabular input.
pub const FIELD_DELIMITER: char = '\t';

/// Text printed for a field a record does not have.
///
/// Merging files with different headers produces cells that lack some
/// fields; they are rendered with this placeholder.
pub const MISSING_FIELD_PLACEHOLDER: &str = "?";

// =============================================================================
// Column Conventions
// =============================================================================

/// Column holding the entity key (the word whose vector a row belongs to).
pub const DEFAULT_KEY_FIELD: &str = "target";

/// Column holding the sub-key (the context feature of a vector cell).
pub const DEFAULT_SUBKEY_FIELD: &str = "context";

/// Column holding a neighbor in thesaurus files.
pub const DEFAULT_NEIGHBOR_FIELD: &str = "neighbor";

/// Columns whose name starts with this prefix are identifiers.
///
/// Identifiers are never summed; when two rows are merged their identifiers
/// must agree.
pub const ID_FIELD_PREFIX: &str = "id_";

/// Operand key meaning "no vector on purpose".
///
/// A combination such as `compound head @NOTHING` sums only `head`; the
/// sentinel is dropped without a missing-key warning.
pub const NOTHING_KEY: &str = "@NOTHING";

// =============================================================================
// Evaluation Defaults
// =============================================================================

/// Default prefix length for `Prec@X`.
pub const DEFAULT_PRECISION_AT: usize = 10;

/// Default number of entries per extremity list.
pub const DEFAULT_EXTREMITIES: usize = 5;

/// Default rank thresholds for the energy family.
///
/// Past these ranks a neighbor is considered useless and further rank
/// differences do not matter.
pub const DEFAULT_ENERGY_THRESHOLDS: &[usize] = &[100];

/// Default cut-offs for precision over neighbor lists (`P@10`, `P@100`).
pub const DEFAULT_PRECISION_CUTOFFS: &[usize] = &[10, 100];

/// Smooth-energy value reached when a rank equals the threshold.
///
/// Ranks are squashed through `tanh(rank * atanh(0.95) / threshold)`.
pub const SMOOTH_ENERGY_AT_THRESHOLD: f64 = 0.95;

// =============================================================================
// Ranked Thesaurus
// =============================================================================

/// Column holding the target of a ranked thesaurus.
pub const NEIGHBOR_TARGET_FIELD: &str = "verb1";

/// Column holding the neighbor of a ranked thesaurus.
pub const NEIGHBOR_FIELD: &str = "verb2";

/// Column holding the target/neighbor similarity.
pub const NEIGHBOR_SCORE_FIELD: &str = "similarity";

/// Column appended by neighbor ranking.
pub const RANK_FIELD: &str = "rank";

/// Default seed for shuffling tied neighbors.
pub const DEFAULT_RANK_SEED: u64 = 0;

/// Columns of a ranked thesaurus that are not gold resources.
pub const NEIGHBOR_NON_RESOURCE_FIELDS: &[&str] =
    &["verb1", "idverb1", "verb2", "idverb2", "similarity", "rank"];
