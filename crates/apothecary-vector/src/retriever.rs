//! Query-time retrieval over a loaded index version.

use std::sync::Arc;

use tracing::{debug, warn};

use apothecary_core::error::{ApothecaryError, Result};
use apothecary_core::query::validate_query;
use apothecary_core::types::Recommendation;

use crate::catalog::IndexedCatalog;
use crate::embedding::DynEmbeddingService;

/// Embeds a query and returns the nearest products of one index version.
///
/// The embedder must be the same model that built the catalog. A retriever
/// holds its catalog behind an `Arc` and never mutates it, so concurrent
/// queries need no locking.
#[derive(Clone)]
pub struct Retriever {
    catalog: Arc<IndexedCatalog>,
    embedder: Arc<dyn DynEmbeddingService>,
}

impl Retriever {
    pub fn new(catalog: Arc<IndexedCatalog>, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self { catalog, embedder }
    }

    pub fn catalog(&self) -> &Arc<IndexedCatalog> {
        &self.catalog
    }

    /// Return up to `k` products ordered from most to least relevant.
    pub async fn recommend(&self, query: &str, k: usize) -> Result<Vec<Recommendation>> {
        let query = validate_query(query)?;
        if k == 0 {
            return Err(ApothecaryError::Input(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let vector = self.embedder.embed_boxed(query).await.map_err(|e| {
            warn!(error = %e, "Query embedding failed");
            ApothecaryError::Retrieval(format!("failed to embed query: {}", e))
        })?;

        let matches = self.catalog.search(&vector, k)?;
        debug!(k, hits = matches.len(), "Retrieved products");

        matches
            .into_iter()
            .map(|m| {
                let product = self.catalog.product_at(m.position).ok_or_else(|| {
                    ApothecaryError::Retrieval(format!(
                        "index position {} has no metadata",
                        m.position
                    ))
                })?;
                Ok(Recommendation {
                    product: product.clone(),
                    distance: m.distance,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("products", &self.catalog.len())
            .field("dimension", &self.catalog.dimension())
            .finish()
    }
}
