mod artifacts;
mod logging;

pub use artifacts::{write_binary_artifacts, write_header_artifact};
pub use logging::init_run_logging;

use thiserror::Error;

/// Errors raised while writing run outputs.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("generation error: {0}")]
    Generation(#[from] datagen_generate::GenerationError),
    #[error("logging error: {0}")]
    Logging(String),
}

/// Result type for run operations.
pub type RunResult<T> = std::result::Result<T, RunError>;
