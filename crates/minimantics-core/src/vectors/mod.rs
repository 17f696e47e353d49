//! Sparse vectors of a count-based model and similarity between vectors.
//!
//! - [`store`] - keyed vector store: merging, sums, normalization
//! - [`normalize`] - streaming per-key normalization of grouped input
//! - [`similarity`] - sparse/dense cosine, embeddings, similarity oracles

pub mod normalize;
pub mod similarity;
pub mod store;

pub use normalize::GroupNormalizer;
pub use similarity::{
    cosine_dense, cosine_sparse, similarity_or_default, EmbeddingSet, WordSimilarity,
};
pub use store::{
    normalize_vector, Cell, CombinePolicy, Combination, KeyedVectorStore, MergeOutcome, NormMode,
    SparseVector,
};
