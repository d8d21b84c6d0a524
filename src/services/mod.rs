pub mod alignment;
pub mod archive;
pub mod detection;
pub mod storage;

// Re-export commonly used services
pub use alignment::ScaleAligner;
pub use detection::ObjectDetector;
pub use storage::{LocalStore, ObjectStore};
