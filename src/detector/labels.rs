/// COCO class labels for YOLOv8-family models, indexed by class id.
#[rustfmt::skip]
pub const CLASS_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat", "traffic light",
    "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog", "horse", "sheep", "cow",
    "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove", "skateboard", "surfboard",
    "tennis racket", "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard",
    "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase",
    "scissors", "teddy bear", "hair drier", "toothbrush",
];

pub fn class_label(class_id: usize) -> String {
    match CLASS_LABELS.get(class_id) {
        Some(label) => label.to_string(),
        None => format!("Unknown class {}", class_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve_to_names() {
        assert_eq!(class_label(0), "person");
        assert_eq!(class_label(2), "car");
        assert_eq!(class_label(79), "toothbrush");
    }

    #[test]
    fn out_of_range_id_gets_a_placeholder() {
        assert_eq!(class_label(80), "Unknown class 80");
    }
}
