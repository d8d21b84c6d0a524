// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Source error chaining

use thiserror::Error;

/// Object detection errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("no foreground object found (segmentation produced zero contours)")]
    NoObjectFound,
}

/// Scale alignment errors
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("degenerate scale: reference diagonal {reference:.2}px, product diagonal {product:.2}px")]
    DegenerateScale { reference: f64, product: f64 },
}

/// Storage collaborator errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    #[error("invalid object key: {key}")]
    InvalidKey { key: String },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Archive packing errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip packing failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-record pipeline errors surfaced by the batch processor
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file name {0:?} matches neither reference nor product naming")]
    UnclassifiableFile(String),

    #[error("unreadable image: {0}")]
    UnreadableImage(String),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}
