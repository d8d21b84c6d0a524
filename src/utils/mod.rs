pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{decode_rgb, encode_png};
pub use metrics::Metrics;
