//! Apothecary vector crate - embeddings, exact vector index, corpus builder,
//! persistence and query-time retrieval.
//!
//! An index version is an [`IndexedCatalog`]: a [`VectorIndex`] paired
//! position-for-position with the products it embeds. Versions are built by
//! [`CorpusIndexBuilder`], persisted and reloaded through [`store`], and
//! queried through a [`Retriever`].

pub mod builder;
pub mod catalog;
pub mod embedding;
pub mod index;
pub mod retriever;
pub mod store;

pub use builder::{canonical_text, CorpusIndexBuilder};
pub use catalog::{IndexedCatalog, RankedMatch};
pub use embedding::{
    DynEmbeddingService, EmbeddingService, KeywordEmbedding, MockEmbedding, OnnxEmbeddingService,
};
pub use index::{Neighbor, VectorIndex};
pub use retriever::Retriever;
