mod labels;
mod ort_detector;

pub use labels::class_label;
pub use ort_detector::OrtDetector;

use image::DynamicImage;
use thiserror::Error;

/// One detected object, in pixel coordinates of the original image.
/// `x1 < x2` and `y1 < y2` as produced by the model; not re-validated here.
#[derive(Debug, Clone)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("failed to build onnx session: {0}")]
    Session(#[from] ort::Error),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid model output: {0}")]
    Output(String),
}

/// A pre-trained object detector. The production implementation is
/// [`OrtDetector`]; tests substitute a fixed-output fake.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;
}
