/// Square input resolution of the gender/age classifier models.
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

pub const CLASSIFIER_CHANNELS: u8 = 3;

/// Per-channel normalization: `(raw_byte - mean) / std`.
pub const CLASSIFIER_MEAN: f32 = 0.0;
pub const CLASSIFIER_STD: f32 = 255.0;

/// Max ranked labels returned per classification.
pub const CLASSIFIER_MAX_RESULTS: usize = 3;

/// Minimum confidence for a label to be retained.
pub const CLASSIFIER_THRESHOLD: f32 = 0.4;

/// JPEG quality for preview-only detection (no per-face classification).
pub const JPEG_QUALITY_PREVIEW: u8 = 50;

/// JPEG quality for the crop-then-classify path. Compression artifacts
/// affect classifier accuracy, so this stays high.
pub const JPEG_QUALITY_CLASSIFY: u8 = 100;

/// Max frames a face track survives without a matching detection
/// (~1 second at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

pub const GENDER_MODEL_NAME: &str = "gender_model.onnx";
pub const GENDER_LABELS_NAME: &str = "gender_labels.txt";
pub const AGE_MODEL_NAME: &str = "age_model.onnx";
pub const AGE_LABELS_NAME: &str = "age_labels.txt";
pub const DETECTOR_MODEL_NAME: &str = "blazeface.onnx";
