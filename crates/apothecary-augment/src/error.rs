//! Error types for the augmentation step.
//!
//! Augmentation failures never reach callers of the orchestrator: they are
//! logged and the response degrades to plain recommendations.

/// Errors from the generative augmenter and the response sanitizer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AugmentError {
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("generation timed out after {0} ms")]
    Timeout(u64),
    #[error("generated text is empty after sanitizing")]
    EmptyOutput,
}

impl From<reqwest::Error> for AugmentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AugmentError::Generation(format!("request timed out: {}", err))
        } else {
            AugmentError::Generation(err.to_string())
        }
    }
}
