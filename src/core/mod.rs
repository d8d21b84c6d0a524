pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    AlignError, ArchiveError, ConfigError, DetectionError, PipelineError, StorageError,
};
pub use types::{
    AlignedOutput, BatchId, EventOutcome, EventRecord, FileClass, Measurement, StorageEvent,
};
