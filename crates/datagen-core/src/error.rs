use thiserror::Error;

/// Core error type shared across datagen crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A native type name is not registered in the scalar table.
    #[error("lookup error: no scalar kind for native type '{0}'")]
    Lookup(String),
    /// A field cannot be projected onto a native layout.
    #[error("schema error: {0}")]
    Schema(String),
    /// A record instance disagrees with its declared field types.
    #[error("validation error: {0}")]
    Validation(String),
    /// The schema document could not be parsed.
    #[error("invalid schema document: {0}")]
    Document(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results returned by datagen crates.
pub type Result<T> = std::result::Result<T, Error>;
