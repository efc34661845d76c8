use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No metadata found for entity `{entity}`")]
    UnknownEntity { entity: String },
    #[error("Failed to read catalog file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse catalog: {error}")]
    ConfigParseError { error: String },
    #[error("Catalog backend error: {message}")]
    Backend { message: String },
}

impl CatalogError {
    /// Create a backend error with context information
    pub fn backend_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        CatalogError::Backend {
            message: format!("{}\n  Context: {}", message.into(), context.into()),
        }
    }
}
