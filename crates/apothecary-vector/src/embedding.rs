//! Embedding service trait and implementations.
//!
//! - `OnnxEmbeddingService` loads a sentence-transformer ONNX model (e.g.
//!   all-MiniLM-L6-v2) via ort and tokenizes with the HuggingFace tokenizers
//!   crate. This is the production embedding backend.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing.
//! - `KeywordEmbedding` maps keyword groups onto axes, so tests can place
//!   texts near or far from each other on purpose.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

use apothecary_core::error::ApothecaryError;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::info;

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors. The same
/// service must be used to build an index and to embed queries against it.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, ApothecaryError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, which is not object-safe.
/// This trait boxes the future so `Arc<dyn DynEmbeddingService>` can be shared
/// between the index builder, the retriever and request handlers.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, ApothecaryError>> + Send + 'a>,
    >;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, ApothecaryError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in values.iter_mut() {
            *val /= norm;
        }
    }
}

fn reject_empty(text: &str) -> Result<(), ApothecaryError> {
    if text.trim().is_empty() {
        return Err(ApothecaryError::Embedding(
            "Cannot embed empty text".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - real ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX Runtime-backed embedding service using a sentence-transformer model.
///
/// Expects a model directory containing:
/// - `model.onnx`: the sentence-transformer ONNX export
/// - `tokenizer.json`: the HuggingFace fast-tokenizer file
///
/// Token embeddings are mean-pooled under the attention mask and
/// L2-normalized, so squared L2 distance between outputs ranks the same way
/// as cosine similarity.
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

// ort::Session is internally reference counted and guarded by the Mutex here.
unsafe impl Send for OnnxEmbeddingService {}
unsafe impl Sync for OnnxEmbeddingService {}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

fn onnx_err<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> ApothecaryError + '_ {
    move |e| ApothecaryError::Embedding(format!("{}: {}", context, e))
}

impl OnnxEmbeddingService {
    /// Load a sentence-transformer model from the given directory.
    pub fn from_directory(model_dir: &Path) -> Result<Self, ApothecaryError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, ApothecaryError> {
        if !model_path.exists() {
            return Err(ApothecaryError::Config(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(ApothecaryError::Config(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(onnx_err("ONNX session builder"))?
            .with_intra_threads(1)
            .map_err(onnx_err("ONNX set threads"))?
            .commit_from_file(model_path)
            .map_err(onnx_err("ONNX load model"))?;

        // Sentence-transformer output is [batch, seq_len, hidden_dim].
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { 384 })
            .unwrap_or(384);

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            ApothecaryError::Config(format!("Failed to load tokenizer: {}", e))
        })?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
        })
    }

    /// Tokenize, run inference, mean-pool and normalize.
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, ApothecaryError> {
        reject_empty(text)?;

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ApothecaryError::Embedding(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();

        let seq_len = input_ids.len();
        let shape_err =
            |e: ndarray::ShapeError| ApothecaryError::Embedding(format!("input tensor: {}", e));

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids).map_err(shape_err)?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(shape_err)?;
        let type_array =
            ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids).map_err(shape_err)?;

        let ids_ref = TensorRef::from_array_view(&ids_array).map_err(onnx_err("input_ids"))?;
        let mask_ref =
            TensorRef::from_array_view(&mask_array).map_err(onnx_err("attention_mask"))?;
        let type_ref =
            TensorRef::from_array_view(&type_array).map_err(onnx_err("token_type_ids"))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ApothecaryError::Embedding(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(onnx_err("ONNX inference failed"))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(onnx_err("Extract embeddings"))?;

        let hidden_dim = match shape.iter().copied().collect::<Vec<i64>>().as_slice() {
            [_, .., last] if *last > 0 => *last as usize,
            other => {
                return Err(ApothecaryError::Embedding(format!(
                    "Unexpected output shape: {:?}",
                    other
                )))
            }
        };

        let mut pooled = mean_pool(data, &attention_mask, hidden_dim);
        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

/// Average token vectors whose attention mask is set.
fn mean_pool(token_data: &[f32], attention_mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
        if mask_val > 0 {
            let offset = tok_idx * hidden_dim;
            if let Some(row) = token_data.get(offset..offset + hidden_dim) {
                for (acc, v) in pooled.iter_mut().zip(row) {
                    *acc += v;
                }
                count += 1.0;
            }
        }
    }

    if count > 0.0 {
        for val in &mut pooled {
            *val /= count;
        }
    }
    pooled
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApothecaryError> {
        // ONNX Runtime inference is CPU-bound; run on a blocking thread.
        let svc = OnnxEmbeddingService {
            session: Arc::clone(&self.session),
            tokenizer: Arc::clone(&self.tokenizer),
            dimensions: self.dimensions,
        };
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || svc.embed_sync(&text_owned))
            .await
            .map_err(|e| ApothecaryError::Embedding(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service that returns deterministic unit vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    /// 384 dimensions, matching all-MiniLM-L6-v2.
    pub fn new() -> Self {
        Self::with_dimensions(384)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }
        l2_normalize(&mut result);
        result
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApothecaryError> {
        reject_empty(text)?;
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// KeywordEmbedding - one axis per keyword group
// ---------------------------------------------------------------------------

/// Embedding stub with one dimension per keyword group.
///
/// A component is 1.0 when the lowercased text contains any keyword of its
/// group, then the vector is L2-normalized. Texts sharing a group end up
/// close together, texts in disjoint groups end up far apart.
#[derive(Debug, Clone)]
pub struct KeywordEmbedding {
    groups: Vec<Vec<String>>,
}

impl KeywordEmbedding {
    pub fn new(groups: &[&[&str]]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|g| g.iter().map(|k| k.to_lowercase()).collect())
                .collect(),
        }
    }
}

impl EmbeddingService for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApothecaryError> {
        reject_empty(text)?;
        let lowered = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .groups
            .iter()
            .map(|group| {
                if group.iter().any(|k| lowered.contains(k.as_str())) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.groups.len()
    }
}
