//! Corpus index builder.
//!
//! Turns a product catalog into an [`IndexedCatalog`]: one canonical text per
//! product, one embedding call per text, vectors assembled in catalog order.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use apothecary_core::catalog::ensure_unique_ids;
use apothecary_core::error::{ApothecaryError, Result};
use apothecary_core::types::Product;

use crate::catalog::IndexedCatalog;
use crate::embedding::DynEmbeddingService;
use crate::index::VectorIndex;

/// Canonical embedding text for a product.
///
/// Field order is fixed (name, description, effects, ingredients) so that a
/// rebuild with the same embedding model reproduces the same vectors.
pub fn canonical_text(product: &Product) -> String {
    format!(
        "{}. {} Effects: {}. Ingredients: {}.",
        product.name,
        product.description,
        product.effects.join(", "),
        product.ingredients.join(", ")
    )
}

/// Builds a fresh index version from a catalog.
pub struct CorpusIndexBuilder {
    embedder: Arc<dyn DynEmbeddingService>,
    concurrency: usize,
}

impl CorpusIndexBuilder {
    /// Create a builder issuing at most `concurrency` embedding calls at once.
    pub fn new(embedder: Arc<dyn DynEmbeddingService>, concurrency: usize) -> Self {
        Self {
            embedder,
            concurrency: concurrency.max(1),
        }
    }

    /// Embed every product and pair the vectors with the catalog.
    ///
    /// Embedding calls run concurrently, but results are gathered in catalog
    /// order before the index is assembled, so position `i` always holds the
    /// embedding of `products[i]`.
    pub async fn build(&self, products: Vec<Product>) -> Result<IndexedCatalog> {
        if products.is_empty() {
            return Err(ApothecaryError::Config(
                "cannot build an index from an empty catalog".to_string(),
            ));
        }
        ensure_unique_ids(&products).map_err(ApothecaryError::Config)?;

        let started = Instant::now();
        info!(
            products = products.len(),
            concurrency = self.concurrency,
            "Building product index"
        );

        let texts: Vec<String> = products.iter().map(canonical_text).collect();
        let embedder = &self.embedder;

        // `buffered` yields in input order regardless of completion order.
        let vectors: Vec<Vec<f32>> = stream::iter(texts.iter().enumerate())
            .map(|(position, text)| async move {
                let vector = embedder.embed_boxed(text).await?;
                debug!(position, dimension = vector.len(), "Embedded product");
                Ok::<Vec<f32>, ApothecaryError>(vector)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let index = VectorIndex::from_vectors(vectors)?;
        let catalog = IndexedCatalog::new(index, products)?;

        info!(
            products = catalog.len(),
            dimension = catalog.dimension(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Product index built"
        );
        Ok(catalog)
    }
}
