//! # Minimantics Core
//!
//! Streaming aggregation and evaluation engine for count-based distributional
//! semantic models.
//!
//! This crate provides the record reader, vector store, similarity functions
//! and rank-quality metrics used by the `mm` command-line tools, designed to
//! work in a single pass over large tab-separated files.
//!
//! ## Modules
//!
//! - [`record`] - Tab-separated record streams with named schemas
//! - [`statistics`] - Single-pass running and grouped statistics
//! - [`vectors`] - Sparse vector store, normalization, cosine similarity
//! - [`evaluation`] - Score-table and neighbor-list evaluation
//! - [`thesaurus`] - Thesaurus lookups and TOEFL synonym problems
//! - [`diagnostics`] - Run-scoped warning sink
//! - [`config`] - Column conventions and evaluation defaults
//! - [`error`] - Error types

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evaluation;
pub mod record;
pub mod statistics;
pub mod thesaurus;
pub mod vectors;

pub use diagnostics::DiagnosticSink;
pub use error::{EmbeddingError, RecordError, SimilarityError, StatsError};
