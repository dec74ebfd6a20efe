use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// One logged upload. `time_display` and `date_display` are redundant
/// renderings of the same instant as `timestamp` and are derived from it at
/// record-build time, never recomputed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub filename: String,
    pub objects: Vec<String>,
    pub timestamp: String,
    pub time_display: String,
    pub date_display: String,
}

impl DetectionRecord {
    /// Display name for the dashboard: comma-joined labels in detection
    /// order, or `"Unknown"` when the model found nothing.
    pub fn detection_name(&self) -> String {
        if self.objects.is_empty() {
            "Unknown".to_string()
        } else {
            self.objects.join(", ")
        }
    }
}

#[derive(Error, Debug)]
pub enum LogStoreError {
    #[error("failed to write detection log: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize detection log: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only detection history persisted as a single JSON array file.
///
/// `append` is a whole-file read-modify-write with no temp-file-and-rename
/// step: a crash mid-write can truncate the file, and two concurrent callers
/// can race (last writer wins over the whole array, losing a record). The
/// store itself takes no lock; the pipeline serializes its appends behind a
/// single-writer mutex, and any other writer must do the same.
#[derive(Debug, Clone)]
pub struct DetectionLog {
    path: PathBuf,
}

impl DetectionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates the backing file holding an empty array if it is absent.
    pub fn init(&self) -> Result<(), LogStoreError> {
        if !self.path.exists() {
            fs::write(&self.path, "[]")?;
        }
        Ok(())
    }

    /// Returns every record in append order. A missing, unreadable or
    /// malformed file is treated as an empty history; this fallback is
    /// deliberate and is never surfaced to the caller as an error.
    pub fn read_all(&self) -> Vec<DetectionRecord> {
        let Ok(bytes) = fs::read(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("malformed detection log, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Appends one record by rewriting the whole file.
    pub fn append(&self, record: &DetectionRecord) -> Result<(), LogStoreError> {
        let mut records = self.read_all();
        records.push(record.clone());
        let file = fs::File::create(&self.path)?;
        serde_json::to_writer(file, &records)?;
        Ok(())
    }
}
