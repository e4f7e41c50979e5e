//! BlazeFace-style face detector backed by an ONNX Runtime session.
//!
//! Anchor-based decoding over the model's 16-value regressor rows
//! (box deltas plus six facial keypoints). The performance mode picks
//! between the short-range and full-range model variants.
use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::detection::domain::face_detector::{
    DetectorOptions, FaceDetector, FaceObservation, PerformanceMode,
};
use crate::detection::infrastructure::face_tracker::FaceTracker;
use crate::shared::constants::TRACKER_MAX_LOST;
use crate::shared::frame::Frame;
use crate::shared::rect::BoundingBox;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Anchor layout of one model variant: input resolution plus
/// `(stride, anchors_per_cell)` feature maps.
struct AnchorLayout {
    input_size: u32,
    cells: &'static [(usize, usize)],
}

/// Short-range model: 128px input, 16x16 and 8x8 maps, 896 anchors.
const SHORT_RANGE: AnchorLayout = AnchorLayout {
    input_size: 128,
    cells: &[(8, 2), (16, 6)],
};

/// Full-range model: 192px input, single 48x48 map, 2304 anchors.
const FULL_RANGE: AnchorLayout = AnchorLayout {
    input_size: 192,
    cells: &[(4, 1)],
};

pub struct OnnxFaceDetector {
    session: Session,
    options: DetectorOptions,
    confidence: f32,
    input_size: u32,
    anchors: Vec<[f32; 2]>,
    tracker: FaceTracker,
}

impl OnnxFaceDetector {
    /// Loads the model variant matching `options.performance`.
    pub fn new(
        model_path: &Path,
        options: DetectorOptions,
        confidence: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?;

        let layout = match options.performance {
            PerformanceMode::Fast => &SHORT_RANGE,
            PerformanceMode::Accurate => &FULL_RANGE,
        };

        Ok(Self {
            session,
            options,
            confidence,
            input_size: layout.input_size,
            anchors: generate_anchors(layout),
            tracker: FaceTracker::new(TRACKER_MAX_LOST),
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
        let fw = frame.width();
        let fh = frame.height();

        let input_tensor = preprocess(frame, self.input_size);
        let input_value = Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value]?)?;

        let regressors = outputs["regressors"].try_extract_tensor::<f32>()?;
        let scores = outputs["classificators"].try_extract_tensor::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("cannot get score slice")?;

        let mut raw_dets = Vec::new();
        let num_anchors = self.anchors.len().min(score_data.len());

        for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
            let score = sigmoid(raw_score);
            if score < self.confidence {
                continue;
            }

            let anchor = &self.anchors[i];
            let reg_offset = i * 16;
            if reg_offset + 16 > reg_data.len() {
                break;
            }
            let reg = &reg_data[reg_offset..reg_offset + 16];
            let scale = self.input_size as f32;

            // Box center + size relative to anchor, then to frame coordinates
            let cx = anchor[0] + reg[0] / scale;
            let cy = anchor[1] + reg[1] / scale;
            let w = reg[2] / scale;
            let h = reg[3] / scale;

            let x1 = ((cx - w / 2.0) * fw as f32).max(0.0);
            let y1 = ((cy - h / 2.0) * fh as f32).max(0.0);
            let x2 = ((cx + w / 2.0) * fw as f32).min(fw as f32);
            let y2 = ((cy + h / 2.0) * fh as f32).min(fh as f32);

            let roll = if self.options.classify_attributes {
                Some(head_roll_degrees(reg, anchor, scale))
            } else {
                None
            };

            raw_dets.push(RawDet {
                x1: x1 as f64,
                y1: y1 as f64,
                x2: x2 as f64,
                y2: y2 as f64,
                score,
                roll,
            });
        }

        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);

        let boxes: Vec<BoundingBox> = kept
            .iter()
            .map(|d| {
                let x = d.x1 as i32;
                let y = d.y1 as i32;
                BoundingBox::new(x, y, (d.x2 - d.x1) as i32, (d.y2 - d.y1) as i32)
            })
            .collect();

        let ids: Vec<Option<i64>> = if self.options.enable_tracking {
            self.tracker.assign(&boxes).into_iter().map(Some).collect()
        } else {
            vec![None; boxes.len()]
        };

        Ok(kept
            .iter()
            .zip(boxes)
            .zip(ids)
            .map(|((det, bbox), tracking_id)| {
                let mut obs = FaceObservation::new(bbox, det.score);
                obs.tracking_id = tracking_id;
                obs.head_euler_angle_z = det.roll;
                obs
            })
            .collect())
    }
}

/// Roll estimate from the inter-eye keypoint segment, in degrees.
/// Positive means the head is tilted toward its left shoulder.
fn head_roll_degrees(reg: &[f32], anchor: &[f32; 2], scale: f32) -> f32 {
    // Keypoints 0 and 1 are right and left eye (x, y) pairs after the box.
    let rx = anchor[0] + reg[4] / scale;
    let ry = anchor[1] + reg[5] / scale;
    let lx = anchor[0] + reg[6] / scale;
    let ly = anchor[1] + reg[7] / scale;
    -(ly - ry).atan2(lx - rx).to_degrees()
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size x size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

// ---------------------------------------------------------------------------
// Anchors
// ---------------------------------------------------------------------------

fn generate_anchors(layout: &AnchorLayout) -> Vec<[f32; 2]> {
    let mut anchors = Vec::new();
    for &(stride, num) in layout.cells {
        let grid_size = layout.input_size as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDet {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f32,
    roll: Option<f32>,
}

fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && raw_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn raw_iou(a: &RawDet, b: &RawDet) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
