//! Recommendation orchestrator: retrieval, enrichment and bounded generation.
//!
//! Retrieval errors reach the caller. Augmentation errors never do: they are
//! logged at `warn` and the response falls back to plain recommendations.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use apothecary_core::error::{ApothecaryError, Result};
use apothecary_core::types::{EnrichedProduct, Recommendation};
use apothecary_vector::catalog::IndexedCatalog;
use apothecary_vector::embedding::DynEmbeddingService;
use apothecary_vector::retriever::Retriever;

use crate::enricher::KnowledgeEnricher;
use crate::error::AugmentError;
use crate::generator::GenerativeAugmenter;
use crate::prompt::{PromptBuilder, ResponseSanitizer};

/// Plain retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<Recommendation>,
}

/// Retrieval result with an optional generated explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedResponse {
    pub recommendations: Vec<Recommendation>,
    pub augmented_text: Option<String>,
    /// `true` exactly when `augmented_text` is present.
    pub augmented: bool,
}

/// Generated marketing description for one catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescription {
    pub product: EnrichedProduct,
    pub description: Option<String>,
    pub augmented: bool,
}

/// Summary of the index version currently being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub products: usize,
    pub dimension: usize,
    /// Starts at 1 and increases by one on every successful swap.
    pub version: u64,
}

struct IndexSnapshot {
    retriever: Retriever,
    version: u64,
}

impl IndexSnapshot {
    fn info(&self) -> IndexInfo {
        let catalog = self.retriever.catalog();
        IndexInfo {
            products: catalog.len(),
            dimension: catalog.dimension(),
            version: self.version,
        }
    }
}

/// Coordinates the retriever, the knowledge enricher and the augmenter.
///
/// The served index version sits behind an [`ArcSwap`]. Each request loads
/// the snapshot once, so it sees either the old or the new index in full
/// even when a swap happens mid-request.
pub struct RecommendationOrchestrator {
    snapshot: ArcSwap<IndexSnapshot>,
    embedder: Arc<dyn DynEmbeddingService>,
    enricher: KnowledgeEnricher,
    augmenter: Arc<dyn GenerativeAugmenter>,
    generation_timeout: Duration,
}

impl RecommendationOrchestrator {
    /// Create an orchestrator serving `catalog`.
    ///
    /// Fails with a retrieval error if the catalog was built with a model of
    /// a different dimension than `embedder`.
    pub fn new(
        catalog: Arc<IndexedCatalog>,
        embedder: Arc<dyn DynEmbeddingService>,
        enricher: KnowledgeEnricher,
        augmenter: Arc<dyn GenerativeAugmenter>,
        generation_timeout: Duration,
    ) -> Result<Self> {
        check_dimension(&catalog, embedder.as_ref())?;
        info!(
            products = catalog.len(),
            dimension = catalog.dimension(),
            knowledge_entries = enricher.len(),
            augmenter = augmenter.name(),
            timeout_ms = generation_timeout.as_millis() as u64,
            "Recommendation orchestrator ready"
        );

        let snapshot = IndexSnapshot {
            retriever: Retriever::new(catalog, embedder.clone()),
            version: 1,
        };
        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            embedder,
            enricher,
            augmenter,
            generation_timeout,
        })
    }

    /// Nearest products for `query`.
    pub async fn recommend(&self, query: &str, k: usize) -> Result<RecommendResponse> {
        let snapshot = self.snapshot.load_full();
        let recommendations = snapshot.retriever.recommend(query, k).await?;
        Ok(RecommendResponse { recommendations })
    }

    /// Nearest products plus a best-effort generated explanation.
    ///
    /// Input and retrieval errors propagate. Any failure in the generative
    /// step yields the recommendations alone with `augmented = false`.
    pub async fn recommend_augmented(&self, query: &str, k: usize) -> Result<AugmentedResponse> {
        let snapshot = self.snapshot.load_full();
        let recommendations = snapshot.retriever.recommend(query, k).await?;

        if recommendations.is_empty() {
            debug!("No recommendations, skipping generation");
            return Ok(AugmentedResponse {
                recommendations,
                augmented_text: None,
                augmented: false,
            });
        }

        let enriched: Vec<EnrichedProduct> = recommendations
            .iter()
            .map(|r| self.enricher.enrich_product(&r.product))
            .collect();
        let prompt = PromptBuilder::build_prompt(query, &enriched);

        let augmented_text = match self.generate_bounded(&prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(
                    error = %e,
                    augmenter = self.augmenter.name(),
                    "Augmentation failed, returning plain recommendations"
                );
                None
            }
        };

        Ok(AugmentedResponse {
            augmented: augmented_text.is_some(),
            recommendations,
            augmented_text,
        })
    }

    /// Best-effort generated description for the product with `product_id`.
    pub async fn describe_product(&self, product_id: i64) -> Result<ProductDescription> {
        let snapshot = self.snapshot.load_full();
        let product = snapshot
            .retriever
            .catalog()
            .product_by_id(product_id)
            .ok_or_else(|| ApothecaryError::Input(format!("unknown product id {}", product_id)))?;

        let enriched = self.enricher.enrich_product(product);
        let prompt = PromptBuilder::build_description_prompt(&enriched);

        let description = match self.generate_bounded(&prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, product_id, "Description generation failed");
                None
            }
        };

        Ok(ProductDescription {
            augmented: description.is_some(),
            product: enriched,
            description,
        })
    }

    /// Atomically replace the served index version.
    ///
    /// In-flight requests finish against the snapshot they already loaded.
    pub fn swap_index(&self, catalog: Arc<IndexedCatalog>) -> Result<IndexInfo> {
        check_dimension(&catalog, self.embedder.as_ref())?;

        let retriever = Retriever::new(catalog, self.embedder.clone());
        let previous = self.snapshot.rcu(|current| {
            Arc::new(IndexSnapshot {
                retriever: retriever.clone(),
                version: current.version + 1,
            })
        });

        let info = IndexInfo {
            products: retriever.catalog().len(),
            dimension: retriever.catalog().dimension(),
            version: previous.version + 1,
        };
        info!(
            previous_version = previous.version,
            version = info.version,
            products = info.products,
            "Index swapped"
        );
        Ok(info)
    }

    pub fn index_info(&self) -> IndexInfo {
        self.snapshot.load().info()
    }

    async fn generate_bounded(&self, prompt: &str) -> std::result::Result<String, AugmentError> {
        debug!(prompt_len = prompt.len(), "Invoking augmenter");
        let started = Instant::now();

        // A panicking augmenter is an augmentation failure like any other.
        let generation = AssertUnwindSafe(self.augmenter.generate(prompt)).catch_unwind();
        let raw = tokio::time::timeout(self.generation_timeout, generation)
            .await
            .map_err(|_| AugmentError::Timeout(self.generation_timeout.as_millis() as u64))?
            .map_err(|payload| {
                AugmentError::Generation(format!(
                    "augmenter {} panicked: {}",
                    self.augmenter.name(),
                    panic_message(payload.as_ref())
                ))
            })??;
        let text = ResponseSanitizer::sanitize(&raw, prompt)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            text_len = text.len(),
            "Augmentation complete"
        );
        Ok(text)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

fn check_dimension(catalog: &IndexedCatalog, embedder: &dyn DynEmbeddingService) -> Result<()> {
    if catalog.dimension() != embedder.dimensions() {
        return Err(ApothecaryError::Retrieval(format!(
            "index dimension {} does not match embedding model dimension {}",
            catalog.dimension(),
            embedder.dimensions()
        )));
    }
    Ok(())
}
