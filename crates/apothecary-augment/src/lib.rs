//! Retrieval augmentation for Apothecary.
//!
//! Enriches retrieved products with ingredient knowledge, builds prompts,
//! calls a generative model under a timeout and sanitizes its output. The
//! [`RecommendationOrchestrator`] ties this to the retriever and owns the
//! hot-swappable index snapshot.

pub mod enricher;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod prompt;

pub use enricher::KnowledgeEnricher;
pub use error::AugmentError;
pub use generator::{DisabledGenerator, GenerativeAugmenter, OllamaGenerator};
pub use orchestrator::{
    AugmentedResponse, IndexInfo, ProductDescription, RecommendResponse,
    RecommendationOrchestrator,
};
pub use prompt::{PromptBuilder, ResponseSanitizer, INGREDIENTS_MARKER};
