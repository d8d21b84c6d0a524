// Core types shared across the alignment workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel batch identifier for object names without a separator.
pub const UNKNOWN_BATCH: &str = "unknown";

/// Size and position of the dominant foreground object in one image.
///
/// `diagonal` is the Euclidean diagonal of the minimum-area (rotated)
/// bounding rectangle around the dominant contour. `centroid` is the
/// first-moment centroid of the contour's enclosed mass, truncated to
/// integers, or `(0, 0)` when the contour has zero area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub diagonal: f64,
    pub centroid: (i64, i64),
}

/// Batch identifier derived structurally from an object's base name.
///
/// The identifier is the substring before the first `-`; names without
/// a separator fall back to the `"unknown"` sentinel. Never validated
/// against a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchId(String);

impl BatchId {
    pub fn from_object_name(name: &str) -> Self {
        let base = base_name(name);
        match base.split_once('-') {
            Some((id, _)) if !id.is_empty() => Self(id.to_string()),
            _ => Self(UNKNOWN_BATCH.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of an uploaded object by its base name.
///
/// Kept as an explicit tagged variant so the matching rule can be
/// swapped without touching orchestration logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Reference,
    Product,
    Unknown,
}

impl FileClass {
    /// Classify by substring match on the base name. Reference wins
    /// when a name somehow matches both patterns.
    pub fn classify(name: &str) -> Self {
        let base = base_name(name);
        if base.contains("reference") {
            Self::Reference
        } else if base.contains("product") {
            Self::Product
        } else {
            Self::Unknown
        }
    }
}

/// Base name of an object key (the part after the last `/`).
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Inbound file-arrival notification.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEvent {
    pub records: Vec<EventRecord>,
}

/// One newly-stored object within a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub container: String,
    pub key: String,
}

/// One aligned canvas, encoded and named for archival.
#[derive(Debug, Clone)]
pub struct AlignedOutput {
    pub entry_name: String,
    pub png: Vec<u8>,
}

/// Terminal state of processing one event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum EventOutcome {
    /// Reference copied to its canonical location.
    Stored,
    /// Product arrived before any reference; deferred without error.
    Skipped,
    /// Batch archive rebuilt and published.
    Archived { aligned: usize, skipped: usize },
}
