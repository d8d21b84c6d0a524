// Batch processor: per-arrival workflow coordinator
//
// Stateless across events: batch membership is re-queried from storage
// on every arrival, so concurrent arrivals for one batch race on the
// archive with last-writer-wins semantics.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::core::config::Config;
use crate::core::errors::{PipelineError, StorageError};
use crate::core::types::{
    base_name, AlignedOutput, BatchId, EventOutcome, FileClass, Measurement, StorageEvent,
};
use crate::services::alignment::ScaleAligner;
use crate::services::archive;
use crate::services::detection::ObjectDetector;
use crate::services::storage::ObjectStore;
use crate::utils::image_ops::{decode_rgb, encode_png};
use crate::utils::metrics::Metrics;

/// Partition of a batch's uploaded objects into reference and products.
///
/// No caching: every call re-queries the storage collaborator, which
/// keeps the processor stateless but means two listings are not
/// guaranteed to agree if files arrive in between.
pub struct BatchIndex<'a, S: ObjectStore> {
    store: &'a S,
    container: &'a str,
}

impl<'a, S: ObjectStore> BatchIndex<'a, S> {
    pub fn new(store: &'a S, container: &'a str) -> Self {
        Self { store, container }
    }

    /// First listed key under the batch prefix whose base name matches
    /// the reference pattern, if any.
    pub fn find_reference(&self, batch: &BatchId) -> Result<Option<String>, StorageError> {
        let keys = self.store.list(self.container, batch.as_str())?;
        Ok(keys
            .into_iter()
            .find(|k| FileClass::classify(k) == FileClass::Reference))
    }

    /// All keys under the batch prefix matching the product pattern,
    /// in listing order.
    pub fn list_products(&self, batch: &BatchId) -> Result<Vec<String>, StorageError> {
        let keys = self.store.list(self.container, batch.as_str())?;
        Ok(keys
            .into_iter()
            .filter(|k| FileClass::classify(k) == FileClass::Product)
            .collect())
    }
}

/// Per-event processing counts, returned to the notification sender.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct EventSummary {
    pub stored: usize,
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Coordinates the full reaction to file-arrival notifications.
///
/// The storage collaborator is an explicit constructor dependency so
/// tests can substitute a fake.
pub struct BatchProcessor<S: ObjectStore> {
    store: Arc<S>,
    detector: ObjectDetector,
    aligner: ScaleAligner,
    metrics: Metrics,
}

impl<S: ObjectStore> BatchProcessor<S> {
    pub fn new(config: Arc<Config>, store: Arc<S>, metrics: Metrics) -> Self {
        Self {
            store,
            detector: ObjectDetector::new(config),
            aligner: ScaleAligner::new(),
            metrics,
        }
    }

    /// Handle one notification. Records are independent: a failing
    /// record is logged and counted without aborting its siblings.
    pub fn handle_event(&self, event: &StorageEvent) -> EventSummary {
        self.metrics.record_event();
        let mut summary = EventSummary::default();

        for record in &event.records {
            match self.process_record(&record.container, &record.key) {
                Ok(EventOutcome::Stored) => summary.stored += 1,
                Ok(EventOutcome::Skipped) => summary.skipped += 1,
                Ok(EventOutcome::Archived { .. }) => summary.archived += 1,
                Err(err) => {
                    error!(container = %record.container, key = %record.key, %err,
                        "record processing failed");
                    self.metrics.record_failure();
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Run one record through the arrival state machine:
    /// classify, then either store the reference verbatim or rebuild
    /// the batch archive from all currently known products.
    pub fn process_record(
        &self,
        container: &str,
        key: &str,
    ) -> Result<EventOutcome, PipelineError> {
        let name = base_name(key);
        let batch = BatchId::from_object_name(name);

        match FileClass::classify(name) {
            FileClass::Unknown => Err(PipelineError::UnclassifiableFile(name.to_string())),
            FileClass::Reference => self.store_reference(container, key, &batch),
            FileClass::Product => self.align_batch(container, &batch),
        }
    }

    /// Copy an arriving reference to the batch's canonical location.
    /// No alignment happens on this path.
    fn store_reference(
        &self,
        container: &str,
        key: &str,
        batch: &BatchId,
    ) -> Result<EventOutcome, PipelineError> {
        let canonical = match Path::new(base_name(key)).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{batch}/reference.{ext}"),
            None => format!("{batch}/reference"),
        };
        let bytes = self.store.download(container, key)?;
        self.store.upload(container, &canonical, &bytes)?;
        info!(%batch, key, %canonical, "stored canonical reference");
        self.metrics.record_reference_stored();
        Ok(EventOutcome::Stored)
    }

    /// Re-run alignment over every product currently known for the
    /// batch and publish a fresh archive, overwriting any prior one.
    ///
    /// A failure to read or measure the reference aborts the whole
    /// pass; a single product's failure only skips that product.
    fn align_batch(&self, container: &str, batch: &BatchId) -> Result<EventOutcome, PipelineError> {
        let index = BatchIndex::new(self.store.as_ref(), container);

        let Some(ref_key) = index.find_reference(batch)? else {
            // Expected while uploads are still arriving; a later
            // product arrival will pick this batch up again.
            info!(%batch, "no reference uploaded yet, deferring batch");
            self.metrics.record_batch_skipped();
            return Ok(EventOutcome::Skipped);
        };

        let started = Instant::now();
        let ref_bytes = self.store.download(container, &ref_key)?;
        let ref_image =
            decode_rgb(&ref_bytes).map_err(|_| PipelineError::UnreadableImage(ref_key.clone()))?;
        let ref_measurement = self.detector.detect(&ref_image)?;
        let ref_dims = ref_image.dimensions();
        info!(%batch, %ref_key, diagonal = ref_measurement.diagonal, "measured reference");

        let products = index.list_products(batch)?;
        let mut outputs = Vec::with_capacity(products.len());
        let mut skipped = 0usize;
        for product_key in &products {
            match self.align_one(container, product_key, &ref_measurement, ref_dims) {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    warn!(%batch, %product_key, %err, "skipping product");
                    skipped += 1;
                }
            }
        }

        let archive_key = format!("{batch}/scaled/{batch}_scaled.zip");
        let archive_bytes = archive::pack(&outputs)?;
        self.store.upload(container, &archive_key, &archive_bytes)?;

        let aligned = outputs.len();
        info!(%batch, %archive_key, aligned, skipped, "published batch archive");
        self.metrics.record_batch_archived(aligned, skipped);
        self.metrics
            .record_align_latency(started.elapsed().as_millis() as u64);
        Ok(EventOutcome::Archived { aligned, skipped })
    }

    fn align_one(
        &self,
        container: &str,
        key: &str,
        reference: &Measurement,
        reference_dims: (u32, u32),
    ) -> Result<AlignedOutput, PipelineError> {
        let bytes = self.store.download(container, key)?;
        let image =
            decode_rgb(&bytes).map_err(|_| PipelineError::UnreadableImage(key.to_string()))?;
        let measurement = self.detector.detect(&image)?;
        let canvas = self
            .aligner
            .align(reference, reference_dims, &image, &measurement)?;
        let png = encode_png(&canvas).map_err(|_| PipelineError::UnreadableImage(key.to_string()))?;
        Ok(AlignedOutput {
            entry_name: format!("scaled_{}", base_name(key)),
            png,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EventRecord;
    use image::{Rgb, RgbImage};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use zip::ZipArchive;

    /// In-memory stand-in for the storage collaborator.
    #[derive(Default)]
    struct FakeStore {
        objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    }

    impl FakeStore {
        fn put(&self, container: &str, key: &str, bytes: Vec<u8>) {
            self.objects
                .lock()
                .insert((container.to_string(), key.to_string()), bytes);
        }

        fn contains(&self, container: &str, key: &str) -> bool {
            self.objects
                .lock()
                .contains_key(&(container.to_string(), key.to_string()))
        }
    }

    impl ObjectStore for FakeStore {
        fn download(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
            self.objects
                .lock()
                .get(&(container.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| StorageError::NotFound {
                    container: container.to_string(),
                    key: key.to_string(),
                })
        }

        fn upload(&self, container: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
            self.put(container, key, bytes.to_vec());
            Ok(())
        }

        fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
            Ok(self
                .objects
                .lock()
                .keys()
                .filter(|(c, k)| c == container && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect())
        }
    }

    fn processor(store: Arc<FakeStore>) -> BatchProcessor<FakeStore> {
        let config = Arc::new(Config::new().unwrap());
        BatchProcessor::new(config, store, Metrics::new())
    }

    /// Dark disc of radius `r` centered at `(cx, cy)` on a white image.
    fn disc_png(w: u32, h: u32, cx: i64, cy: i64, r: i64) -> Vec<u8> {
        let mut img = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
        for y in 0..h as i64 {
            for x in 0..w as i64 {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    img.put_pixel(x as u32, y as u32, Rgb([25, 25, 25]));
                }
            }
        }
        encode_png(&img).unwrap()
    }

    #[test]
    fn reference_arrival_is_stored_canonically() {
        let store = Arc::new(FakeStore::default());
        store.put("uploads", "B1-reference.png", disc_png(100, 100, 50, 50, 36));

        let outcome = processor(store.clone())
            .process_record("uploads", "B1-reference.png")
            .unwrap();

        assert_eq!(outcome, EventOutcome::Stored);
        assert!(store.contains("uploads", "B1/reference.png"));
    }

    #[test]
    fn product_without_reference_is_skipped() {
        let store = Arc::new(FakeStore::default());
        store.put("uploads", "B1-product-1.png", disc_png(60, 60, 30, 30, 18));

        let outcome = processor(store.clone())
            .process_record("uploads", "B1-product-1.png")
            .unwrap();

        assert_eq!(outcome, EventOutcome::Skipped);
        assert!(!store.contains("uploads", "B1/scaled/B1_scaled.zip"));
    }

    #[test]
    fn unclassifiable_name_fails_without_touching_storage() {
        let store = Arc::new(FakeStore::default());
        store.put("uploads", "B1-banner.png", vec![1, 2, 3]);

        let err = processor(store.clone())
            .process_record("uploads", "B1-banner.png")
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnclassifiableFile(_)));
    }

    #[test]
    fn product_arrival_builds_scaled_archive() {
        let store = Arc::new(FakeStore::default());
        store.put("uploads", "B1-reference.png", disc_png(100, 100, 50, 50, 36));
        store.put("uploads", "B1-product-1.png", disc_png(60, 60, 30, 30, 18));

        let proc = processor(store.clone());
        let outcome = proc.process_record("uploads", "B1-product-1.png").unwrap();
        assert_eq!(
            outcome,
            EventOutcome::Archived {
                aligned: 1,
                skipped: 0
            }
        );

        let zip_bytes = store.download("uploads", "B1/scaled/B1_scaled.zip").unwrap();
        let mut zip = ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
        assert_eq!(zip.len(), 1);

        let mut entry_bytes = Vec::new();
        std::io::Read::read_to_end(
            &mut zip.by_name("scaled_B1-product-1.png").unwrap(),
            &mut entry_bytes,
        )
        .unwrap();

        // The aligned output is reference-sized, and re-measuring it
        // reproduces the reference's object size and position.
        let aligned = decode_rgb(&entry_bytes).unwrap();
        assert_eq!(aligned.dimensions(), (100, 100));

        let config = Arc::new(Config::new().unwrap());
        let detector = ObjectDetector::new(config);
        let reference = detector
            .detect(&decode_rgb(&disc_png(100, 100, 50, 50, 36)).unwrap())
            .unwrap();
        let rescaled = detector.detect(&aligned).unwrap();
        assert!(
            (rescaled.diagonal - reference.diagonal).abs() / reference.diagonal < 0.1,
            "rescaled diagonal {} vs reference {}",
            rescaled.diagonal,
            reference.diagonal
        );
        assert!((rescaled.centroid.0 - 50).abs() <= 5);
        assert!((rescaled.centroid.1 - 50).abs() <= 5);
    }

    #[test]
    fn unreadable_product_is_skipped_and_siblings_archived() {
        let store = Arc::new(FakeStore::default());
        store.put("uploads", "B2-reference.png", disc_png(100, 100, 50, 50, 36));
        store.put("uploads", "B2-product-1.png", disc_png(60, 60, 30, 30, 18));
        store.put("uploads", "B2-product-2.png", b"definitely not a png".to_vec());
        store.put("uploads", "B2-product-3.png", disc_png(80, 80, 40, 40, 24));

        let outcome = processor(store.clone())
            .process_record("uploads", "B2-product-1.png")
            .unwrap();
        assert_eq!(
            outcome,
            EventOutcome::Archived {
                aligned: 2,
                skipped: 1
            }
        );

        let zip_bytes = store.download("uploads", "B2/scaled/B2_scaled.zip").unwrap();
        let mut zip = ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        assert!(zip.by_name("scaled_B2-product-1.png").is_ok());
        assert!(zip.by_name("scaled_B2-product-3.png").is_ok());
    }

    #[test]
    fn unreadable_reference_aborts_the_pass() {
        let store = Arc::new(FakeStore::default());
        store.put("uploads", "B3-reference.png", b"corrupt".to_vec());
        store.put("uploads", "B3-product-1.png", disc_png(60, 60, 30, 30, 18));

        let err = processor(store.clone())
            .process_record("uploads", "B3-product-1.png")
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableImage(_)));
        assert!(!store.contains("uploads", "B3/scaled/B3_scaled.zip"));
    }

    #[test]
    fn handle_event_isolates_record_failures() {
        let store = Arc::new(FakeStore::default());
        store.put("uploads", "B4-reference.png", disc_png(100, 100, 50, 50, 36));
        store.put("uploads", "B4-product-1.png", disc_png(60, 60, 30, 30, 18));
        store.put("uploads", "B4-mystery.png", vec![0]);

        let event = StorageEvent {
            records: vec![
                EventRecord {
                    container: "uploads".to_string(),
                    key: "B4-mystery.png".to_string(),
                },
                EventRecord {
                    container: "uploads".to_string(),
                    key: "B4-product-1.png".to_string(),
                },
            ],
        };

        let summary = processor(store.clone()).handle_event(&event);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.archived, 1);
        assert!(store.contains("uploads", "B4/scaled/B4_scaled.zip"));
    }

    #[test]
    fn index_partitions_batch_objects() {
        let store = FakeStore::default();
        store.put("uploads", "B5-reference.png", vec![]);
        store.put("uploads", "B5-product-1.png", vec![]);
        store.put("uploads", "B5-product-2.png", vec![]);
        store.put("uploads", "B6-product-1.png", vec![]);

        let index = BatchIndex::new(&store, "uploads");
        let batch = BatchId::from_object_name("B5-product-1.png");

        assert_eq!(
            index.find_reference(&batch).unwrap().as_deref(),
            Some("B5-reference.png")
        );
        assert_eq!(
            index.list_products(&batch).unwrap(),
            vec!["B5-product-1.png".to_string(), "B5-product-2.png".to_string()]
        );
    }
}
