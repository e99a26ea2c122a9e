/// Domain-specific error types for bookrec
///
/// Collaborator failures (vector index, embedding, text generation) are
/// degraded at the call site and never reach callers as errors — only
/// validation and catalog storage problems surface here.

#[derive(Debug, thiserror::Error)]
pub enum BookrecError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Book not found: {id}")]
    NotFound { id: i64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for BookrecError {
    fn from(e: sqlx::Error) -> Self {
        BookrecError::Storage(e.to_string())
    }
}

impl From<crate::embedding::EmbeddingError> for BookrecError {
    fn from(e: crate::embedding::EmbeddingError) -> Self {
        BookrecError::Internal(e.to_string())
    }
}

impl From<crate::generation::GenerationError> for BookrecError {
    fn from(e: crate::generation::GenerationError) -> Self {
        BookrecError::Internal(e.to_string())
    }
}

impl BookrecError {
    /// Helper to create validation errors with field names
    pub fn validation(field: &str, message: &str) -> Self {
        BookrecError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }
}
