use thiserror::Error;

/// Top-level error type for the Apothecary system.
///
/// The first three variants carry the structural failure classes of the
/// recommender: a corpus or configuration that cannot be built from, caller
/// input that cannot be served, and a persisted index that cannot be trusted.
/// Generation failures live in `apothecary_augment::AugmentError` and never
/// reach this type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApothecaryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ApothecaryError {
    /// True for errors caused by the caller rather than by the service.
    pub fn is_input(&self) -> bool {
        matches!(self, ApothecaryError::Input(_))
    }
}

impl From<toml::de::Error> for ApothecaryError {
    fn from(err: toml::de::Error) -> Self {
        ApothecaryError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ApothecaryError {
    fn from(err: serde_json::Error) -> Self {
        ApothecaryError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Apothecary operations.
pub type Result<T> = std::result::Result<T, ApothecaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ApothecaryError, &str)> = vec![
            (
                ApothecaryError::Config("empty catalog".to_string()),
                "Configuration error: empty catalog",
            ),
            (
                ApothecaryError::Input("k must be positive".to_string()),
                "Invalid input: k must be positive",
            ),
            (
                ApothecaryError::Retrieval("metadata truncated".to_string()),
                "Retrieval error: metadata truncated",
            ),
            (
                ApothecaryError::Embedding("model offline".to_string()),
                "Embedding error: model offline",
            ),
            (
                ApothecaryError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_is_input() {
        assert!(ApothecaryError::Input("blank query".into()).is_input());
        assert!(!ApothecaryError::Retrieval("corrupt".into()).is_input());
        assert!(!ApothecaryError::Config("bad".into()).is_input());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "index file not found");
        let err: ApothecaryError = io_err.into();
        assert!(matches!(err, ApothecaryError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("index file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let converted: ApothecaryError = err.unwrap_err().into();
        assert!(matches!(converted, ApothecaryError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let converted: ApothecaryError = err.unwrap_err().into();
        assert!(matches!(converted, ApothecaryError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
