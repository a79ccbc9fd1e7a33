//! Validation of caller-supplied query parameters.

use crate::error::{ApothecaryError, Result};

/// Default number of recommendations when the caller does not specify one.
pub const DEFAULT_TOP_K: i64 = 3;

/// Validate a requested result count.
///
/// Zero and negative values are rejected. Clamping against the index size
/// happens at search time.
pub fn validate_top_k(k: i64) -> Result<usize> {
    if k <= 0 {
        return Err(ApothecaryError::Input(format!(
            "top_k must be a positive integer, got {}",
            k
        )));
    }
    usize::try_from(k).map_err(|_| ApothecaryError::Input(format!("top_k {} is too large", k)))
}

/// Reject empty or whitespace-only query text.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ApothecaryError::Input(
            "query must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
