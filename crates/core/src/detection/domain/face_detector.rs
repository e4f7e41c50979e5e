use crate::shared::frame::Frame;
use crate::shared::rect::BoundingBox;

/// Detection latency/quality trade-off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PerformanceMode {
    #[default]
    Fast,
    Accurate,
}

/// Detector configuration, fixed for the lifetime of a detector instance.
#[derive(Clone, Copy, Debug)]
pub struct DetectorOptions {
    pub performance: PerformanceMode,
    /// Whether to compute smile/eye-open/head-pose attributes at all.
    pub classify_attributes: bool,
    /// Whether to assign stable tracking ids across consecutive frames.
    pub enable_tracking: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            performance: PerformanceMode::Fast,
            classify_attributes: true,
            enable_tracking: true,
        }
    }
}

/// One face geometry returned by the detection engine, before cropping
/// and classification. Attribute fields the engine cannot provide stay
/// `None`; tracking ids are opaque and monotonic, not contiguous.
#[derive(Clone, Debug)]
pub struct FaceObservation {
    pub bounding_box: BoundingBox,
    pub score: f32,
    pub tracking_id: Option<i64>,
    pub smiling_probability: Option<f32>,
    pub left_eye_open_probability: Option<f32>,
    pub right_eye_open_probability: Option<f32>,
    pub head_euler_angle_x: Option<f32>,
    pub head_euler_angle_y: Option<f32>,
    pub head_euler_angle_z: Option<f32>,
}

impl FaceObservation {
    pub fn new(bounding_box: BoundingBox, score: f32) -> Self {
        Self {
            bounding_box,
            score,
            tracking_id: None,
            smiling_probability: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
            head_euler_angle_x: None,
            head_euler_angle_y: None,
            head_euler_angle_z: None,
        }
    }
}

/// Domain interface for the face detection engine.
///
/// The frame is expected upright (rotation already applied). May be
/// stateful for cross-frame tracking, hence `&mut self`. Implementations
/// must not retain the frame after returning.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>>;
}
