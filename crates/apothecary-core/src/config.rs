use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApothecaryError, Result};

/// Top-level configuration for the Apothecary recommender.
///
/// Loaded from `apothecary.toml` by default. Every section falls back to its
/// defaults when omitted, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApothecaryConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl ApothecaryConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ApothecaryConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.default_top_k == 0 {
            return Err(ApothecaryError::Config(
                "retrieval.default_top_k must be at least 1".to_string(),
            ));
        }
        if self.retrieval.default_top_k > self.retrieval.max_top_k {
            return Err(ApothecaryError::Config(format!(
                "retrieval.default_top_k ({}) exceeds retrieval.max_top_k ({})",
                self.retrieval.default_top_k, self.retrieval.max_top_k
            )));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ApothecaryError::Config(
                "generation.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.embedding.build_concurrency == 0 {
            return Err(ApothecaryError::Config(
                "embedding.build_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP API port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            port: 3030,
        }
    }
}

/// Locations of the input data and the persisted index pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Product catalog (JSON array of products).
    pub catalog: PathBuf,
    /// Ingredient knowledge base (JSON).
    pub knowledge: PathBuf,
    /// Binary vector index file.
    pub index: PathBuf,
    /// Product metadata aligned with the index.
    pub metadata: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("data/products.json"),
            knowledge: PathBuf::from("data/knowledge.json"),
            index: PathBuf::from("vector_db/product_index.bin"),
            metadata: PathBuf::from("vector_db/product_metadata.json"),
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend: "onnx" (sentence-transformer via ONNX Runtime) or "mock".
    pub backend: String,
    /// Embedding model identifier.
    pub model: String,
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Maximum concurrent embedding calls while building the index.
    pub build_concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "onnx".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            build_concurrency: 4,
        }
    }
}

/// Generative model configuration for augmented recommendations.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Whether augmented recommendations call the generative model at all.
    pub enabled: bool,
    /// Generative model identifier.
    pub model: String,
    /// Base URL of the generation endpoint.
    pub endpoint: String,
    /// Bearer credential for the endpoint. Never logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Deadline for a single generation call, in seconds.
    pub timeout_secs: u64,
}

impl GenerationConfig {
    /// Generation deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "mistral:7b-instruct".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            max_tokens: 100,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("enabled", &self.enabled)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Retrieval defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of recommendations when the request does not specify one.
    pub default_top_k: usize,
    /// Largest `top_k` the HTTP API accepts.
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 3,
            max_top_k: 50,
        }
    }
}
