use crate::annotate::Annotator;
use crate::config::StorageSettings;
use crate::detector::{Detector, DetectorError};
use crate::log_store::{DetectionLog, DetectionRecord, LogStoreError};
use chrono::{DateTime, Local};
use std::fs;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to decode uploaded image: {0}")]
    Decode(image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("failed to persist annotated image: {0}")]
    Persist(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("log store error: {0}")]
    LogStore(#[from] LogStoreError),
}

/// What `POST /upload` reports back for one processed image.
#[derive(Debug, Clone)]
pub struct DetectionSummary {
    pub detected_image: String,
    pub objects: Vec<String>,
    pub timestamp: String,
    pub time_display: String,
    pub date_display: String,
}

/// The three derived renderings of one instant. Captured exactly once per
/// request so time and date cannot drift across a midnight boundary.
#[derive(Debug, Clone)]
struct Timestamps {
    timestamp: String,
    time_display: String,
    date_display: String,
}

impl Timestamps {
    fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    fn from_datetime(instant: DateTime<Local>) -> Self {
        Self {
            timestamp: instant.format("%Y-%m-%d_%H-%M-%S").to_string(),
            time_display: instant.format("%I:%M %p").to_string(),
            date_display: instant.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Runs one upload end to end: persist the raw bytes, decode, detect,
/// annotate, persist the annotated image, append a [`DetectionRecord`].
///
/// Appends to the log go through `write_lock` so concurrent uploads cannot
/// lose records to the store's whole-file read-modify-write cycle. The
/// backing file itself is still rewritten in place, so a crash mid-write can
/// corrupt it.
pub struct DetectionPipeline {
    detector: Arc<dyn Detector>,
    annotator: Annotator,
    storage: StorageSettings,
    log: DetectionLog,
    write_lock: tokio::sync::Mutex<()>,
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        annotator: Annotator,
        storage: StorageSettings,
        log: DetectionLog,
    ) -> Self {
        Self {
            detector,
            annotator,
            storage,
            log,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn process(&self, raw: &[u8]) -> Result<DetectionSummary, PipelineError> {
        // The stored name is a generated id; the client filename is ignored.
        let upload_name = format!("{}.jpg", Uuid::new_v4().simple());
        let upload_path = self.storage.upload_dir().join(&upload_name);
        fs::write(&upload_path, raw)?;

        let image = image::load_from_memory(raw).map_err(PipelineError::Decode)?;

        let detections = self.detector.detect(&image)?;
        let objects: Vec<String> = detections.iter().map(|d| d.label.clone()).collect();

        let annotated = self.annotator.annotate(&image, &detections);

        let stamp = Timestamps::now();
        let output_name = format!("{}_{}", stamp.timestamp, upload_name);
        annotated.save(self.storage.detection_dir().join(&output_name))?;

        let record = DetectionRecord {
            filename: output_name.clone(),
            objects: objects.clone(),
            timestamp: stamp.timestamp.clone(),
            time_display: stamp.time_display.clone(),
            date_display: stamp.date_display.clone(),
        };

        {
            let _guard = self.write_lock.lock().await;
            self.log.append(&record)?;
        }

        tracing::info!(
            filename = %output_name,
            objects = ?objects,
            "processed upload"
        );

        Ok(DetectionSummary {
            detected_image: format!("/static/detections/{}", output_name),
            objects,
            timestamp: stamp.timestamp,
            time_display: stamp.time_display,
            date_display: stamp.date_display,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detection;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use tempfile::TempDir;

    struct FixedDetector(Vec<Detection>);

    impl Detector for FixedDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    fn detection(label: &str) -> Detection {
        Detection {
            class_id: 0,
            label: label.to_string(),
            confidence: 0.9,
            x1: 5,
            y1: 5,
            x2: 40,
            y2: 40,
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::new_rgb8(64, 64);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn pipeline(dir: &TempDir, detections: Vec<Detection>) -> DetectionPipeline {
        let storage = StorageSettings {
            root: dir.path().to_path_buf(),
        };
        storage.bootstrap().unwrap();
        let log = DetectionLog::new(storage.log_file());
        log.init().unwrap();
        DetectionPipeline::new(
            Arc::new(FixedDetector(detections)),
            Annotator::new().unwrap(),
            storage,
            log,
        )
    }

    #[tokio::test]
    async fn process_persists_annotates_and_logs() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir, vec![detection("person"), detection("car")]);

        let summary = pipeline.process(&png_bytes()).await.unwrap();

        assert_eq!(summary.objects, vec!["person", "car"]);
        assert!(summary.detected_image.starts_with("/static/detections/"));

        let uploads: Vec<_> = fs::read_dir(dir.path().join("uploads")).unwrap().collect();
        assert_eq!(uploads.len(), 1);
        let outputs: Vec<_> = fs::read_dir(dir.path().join("detections"))
            .unwrap()
            .collect();
        assert_eq!(outputs.len(), 1);

        let records = pipeline.log.read_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].objects, vec!["person", "car"]);
        assert!(records[0].filename.starts_with(&records[0].timestamp));
        assert_eq!(records[0].timestamp, summary.timestamp);
    }

    #[tokio::test]
    async fn empty_detection_list_still_logs_a_record() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir, vec![]);

        let summary = pipeline.process(&png_bytes()).await.unwrap();
        assert!(summary.objects.is_empty());

        let records = pipeline.log.read_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].detection_name(), "Unknown");
    }

    #[tokio::test]
    async fn undecodable_upload_logs_nothing() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir, vec![detection("person")]);

        let result = pipeline.process(b"not an image").await;
        assert!(matches!(result, Err(PipelineError::Decode(_))));

        // the raw upload is persisted before decoding is attempted
        let uploads: Vec<_> = fs::read_dir(dir.path().join("uploads")).unwrap().collect();
        assert_eq!(uploads.len(), 1);
        assert!(pipeline.log.read_all().is_empty());
    }

    #[test]
    fn timestamps_derive_from_a_single_instant() {
        use chrono::TimeZone;
        let instant = Local.with_ymd_and_hms(2024, 1, 1, 22, 5, 9).unwrap();

        let stamp = Timestamps::from_datetime(instant);

        assert_eq!(stamp.timestamp, "2024-01-01_22-05-09");
        assert_eq!(stamp.time_display, "10:05 PM");
        assert_eq!(stamp.date_display, "2024-01-01");
    }
}
