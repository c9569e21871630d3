use thiserror::Error;

/// Errors emitted while building layouts, packing or randomizing records.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Core(#[from] datagen_core::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("no layout built for record '{0}'")]
    LayoutNotBuilt(String),
    #[error("pack error: {0}")]
    Pack(String),
    #[error("randomization error: {0}")]
    Randomize(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;
