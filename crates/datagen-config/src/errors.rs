use thiserror::Error;

/// Errors raised while loading, projecting or dumping configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Core(#[from] datagen_core::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} is not registered with the loader; missing registration or misspelled in the configuration")]
    UnregisteredType(String),
    #[error("invalid configuration node: {0}")]
    InvalidNode(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
