// Library exports for the product photo alignment workflow

pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{AlignError, ArchiveError, ConfigError, DetectionError, PipelineError, StorageError},
    types::{
        AlignedOutput, BatchId, EventOutcome, EventRecord, FileClass, Measurement, StorageEvent,
    },
};

pub use orchestration::{BatchIndex, BatchProcessor, EventSummary};

pub use services::{LocalStore, ObjectDetector, ObjectStore, ScaleAligner};

pub use utils::{decode_rgb, encode_png, Metrics};
