//! Wiring of configured components and the subcommand bodies.

use std::sync::Arc;

use tracing::{info, warn};

use apothecary_augment::{
    DisabledGenerator, GenerativeAugmenter, IndexInfo, KnowledgeEnricher, OllamaGenerator,
    RecommendationOrchestrator,
};
use apothecary_core::catalog::{load_catalog, load_knowledge};
use apothecary_core::config::ApothecaryConfig;
use apothecary_core::error::{ApothecaryError, Result};
use apothecary_vector::embedding::{DynEmbeddingService, MockEmbedding, OnnxEmbeddingService};
use apothecary_vector::{store, CorpusIndexBuilder};

/// Construct the embedding provider named by `embedding.backend`.
pub fn build_embedder(config: &ApothecaryConfig) -> Result<Arc<dyn DynEmbeddingService>> {
    match config.embedding.backend.as_str() {
        "onnx" => {
            let service = OnnxEmbeddingService::from_directory(&config.embedding.model_dir)?;
            info!(
                model = %config.embedding.model,
                dir = %config.embedding.model_dir.display(),
                "ONNX embedding model loaded"
            );
            Ok(Arc::new(service))
        }
        "mock" => {
            warn!("Using mock embeddings; results are not semantically meaningful");
            Ok(Arc::new(MockEmbedding::new()))
        }
        other => Err(ApothecaryError::Config(format!(
            "unknown embedding backend {:?} (expected \"onnx\" or \"mock\")",
            other
        ))),
    }
}

/// Construct the generative augmenter, or a disabled one.
pub fn build_augmenter(config: &ApothecaryConfig) -> Result<Arc<dyn GenerativeAugmenter>> {
    if !config.generation.enabled {
        info!("Generation disabled, augmented requests return plain recommendations");
        return Ok(Arc::new(DisabledGenerator));
    }
    let generator = OllamaGenerator::new(&config.generation)
        .map_err(|e| ApothecaryError::Config(e.to_string()))?;
    info!(
        url = %generator.url(),
        model = %config.generation.model,
        "Generation enabled"
    );
    Ok(Arc::new(generator))
}

/// Embed the configured catalog and persist the index pair.
pub async fn build_index(
    config: &ApothecaryConfig,
    embedder: Arc<dyn DynEmbeddingService>,
) -> Result<IndexInfo> {
    let products = load_catalog(&config.paths.catalog)?;
    info!(
        path = %config.paths.catalog.display(),
        products = products.len(),
        "Catalog loaded"
    );

    let built = CorpusIndexBuilder::new(embedder, config.embedding.build_concurrency)
        .build(products)
        .await?;
    store::save(&built, &config.paths.index, &config.paths.metadata)?;

    Ok(IndexInfo {
        products: built.len(),
        dimension: built.dimension(),
        version: 1,
    })
}

/// Load the persisted index and knowledge base and assemble the orchestrator.
///
/// A missing knowledge base is not fatal: every ingredient then enriches to
/// the "Unknown" placeholder.
pub fn open_orchestrator(
    config: &ApothecaryConfig,
    embedder: Arc<dyn DynEmbeddingService>,
    augmenter: Arc<dyn GenerativeAugmenter>,
) -> Result<RecommendationOrchestrator> {
    let catalog = store::load(&config.paths.index, &config.paths.metadata)?;

    let knowledge = if config.paths.knowledge.exists() {
        load_knowledge(&config.paths.knowledge)?
    } else {
        warn!(
            path = %config.paths.knowledge.display(),
            "Knowledge base not found, ingredients will be reported as unknown"
        );
        Vec::new()
    };

    RecommendationOrchestrator::new(
        Arc::new(catalog),
        embedder,
        KnowledgeEnricher::new(knowledge),
        augmenter,
        config.generation.timeout(),
    )
}
