use super::{class_label, Detection, Detector, DetectorError};
use crate::config::ModelSettings;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, Axis, Ix3, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy)]
struct RawBox {
    class_id: usize,
    confidence: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

fn intersection(box1: &RawBox, box2: &RawBox) -> f32 {
    (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)) * (box1.y2.min(box2.y2) - box1.y1.max(box2.y1))
}

fn union(box1: &RawBox, box2: &RawBox) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn transform_image(image: &DynamicImage) -> (Array<f32, Ix4>, u32, u32) {
    let (img_width, img_height) = image.dimensions();
    let img = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    (input, img_height, img_width)
}

/// ONNX-backed YOLO detector. Keeps a small pool of sessions and hands
/// requests out round-robin so concurrent uploads do not serialize on a
/// single session mutex.
pub struct OrtDetector {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    min_probability: f32,
}

impl OrtDetector {
    pub fn new(model_settings: &ModelSettings) -> Result<Self, DetectorError> {
        ort::init().commit()?;

        let num_instances = model_settings.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_settings.get_model_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!("Created {} ONNX sessions", num_instances);

        Ok(Self {
            counter: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(sessions),
            min_probability: model_settings.min_probability,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ndarray::ArrayD<f32>, DetectorError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|e| DetectorError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectorError::Inference(format!("failed to build tensor: {}", e)))?;

        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session
            .run(input_tensor)
            .map_err(|e| DetectorError::Inference(format!("inference failed: {}", e)))?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Output(format!("failed to extract tensor: {}", e)))?;

        let ix = shape.to_ixdyn();
        let array = ndarray::ArrayD::from_shape_vec(ix, data.to_vec())
            .map_err(|e| DetectorError::Output(format!("invalid tensor shape: {}", e)))?;

        Ok(array)
    }

    /// Decode the `[1, 4 + classes, anchors]` output head: per anchor, take
    /// the best class, drop low-confidence rows, rescale from the model's
    /// 640x640 space back to the original image, then greedy NMS.
    fn postprocess(
        &self,
        outputs: ndarray::ArrayD<f32>,
        img_width: u32,
        img_height: u32,
    ) -> Result<Vec<RawBox>, DetectorError> {
        let outputs = outputs
            .into_dimensionality::<Ix3>()
            .map_err(|e| DetectorError::Output(format!("unexpected output rank: {}", e)))?;
        let output = outputs.index_axis(Axis(0), 0);

        let mut boxes = Vec::new();
        for anchor in output.axis_iter(Axis(1)) {
            let row: Vec<f32> = anchor.iter().copied().collect();
            let Some((class_id, prob)) = row
                .iter()
                .skip(4)
                .enumerate()
                .map(|(index, value)| (index, *value))
                .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
            else {
                return Err(DetectorError::Output("output row has no class scores".into()));
            };

            if prob < self.min_probability {
                continue;
            }

            let xc = row[0] / INPUT_SIZE as f32 * (img_width as f32);
            let yc = row[1] / INPUT_SIZE as f32 * (img_height as f32);
            let w = row[2] / INPUT_SIZE as f32 * (img_width as f32);
            let h = row[3] / INPUT_SIZE as f32 * (img_height as f32);

            boxes.push(RawBox {
                class_id,
                confidence: prob,
                x1: xc - w / 2.,
                y1: yc - h / 2.,
                x2: xc + w / 2.,
                y2: yc + h / 2.,
            });
        }

        boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
        let mut result = Vec::new();

        while !boxes.is_empty() {
            result.push(boxes[0]);
            boxes = boxes
                .iter()
                .filter(|box1| intersection(&boxes[0], box1) / union(&boxes[0], box1) < IOU_THRESHOLD)
                .cloned()
                .collect();
        }

        Ok(result)
    }
}

impl Detector for OrtDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let (input, img_height, img_width) = transform_image(image);
        let outputs = self.run_inference(&input)?;
        let boxes = self.postprocess(outputs, img_width, img_height)?;

        let detections = boxes
            .into_iter()
            .map(|bbox| Detection {
                class_id: bbox.class_id,
                label: class_label(bbox.class_id),
                confidence: bbox.confidence,
                x1: bbox.x1 as i32,
                y1: bbox.y1 as i32,
                x2: bbox.x2 as i32,
                y2: bbox.y2 as i32,
            })
            .collect();

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_transform_image() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 50, Rgb([255, 0, 0]));
        let image = DynamicImage::ImageRgb8(img);

        let (input, img_height, img_width) = transform_image(&image);

        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert_eq!(img_width, 100);
        assert_eq!(img_height, 50);
        // red everywhere after resize
        assert_eq!(input[[0, 0, 320, 320]], 1.0);
        assert_eq!(input[[0, 1, 320, 320]], 0.0);
    }

    #[test]
    fn overlapping_boxes_intersect() {
        let a = RawBox {
            class_id: 0,
            confidence: 0.9,
            x1: 0.,
            y1: 0.,
            x2: 10.,
            y2: 10.,
        };
        let b = RawBox { x1: 5., y1: 5., x2: 15., y2: 15., ..a };

        assert_eq!(intersection(&a, &b), 25.);
        assert_eq!(union(&a, &b), 175.);
    }
}
