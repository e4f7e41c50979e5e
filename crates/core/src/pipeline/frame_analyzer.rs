use crate::classification::domain::classifier::{ClassField, Classifier};
use crate::conversion::sensor_frame::SensorFrame;
use crate::conversion::yuv;
use crate::detection::domain::face_crop::crop_face;
use crate::detection::domain::face_detector::{FaceDetector, FaceObservation};
use crate::shared::constants::JPEG_QUALITY_CLASSIFY;
use crate::shared::face::{DetectedFace, FaceRecord};
use crate::shared::frame::Frame;

/// Per-run classification switches, as requested by the host.
#[derive(Clone, Copy, Debug)]
pub struct DetectionOptions {
    pub detect_gender: bool,
    pub detect_age_range: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            detect_gender: true,
            detect_age_range: true,
        }
    }
}

/// Runs the per-frame stage sequence:
/// convert -> decode -> rotate -> detect -> crop -> classify -> records.
///
/// Exactly one frame is in flight at a time; the analyzer is owned by
/// the worker thread while the pipeline runs and handed back once the
/// worker drains after a stop.
/// Every per-frame and per-face failure is contained here: nothing in
/// this path is fatal to the pipeline.
pub struct FrameAnalyzer {
    detector: Box<dyn FaceDetector>,
    gender_classifier: Classifier,
    age_classifier: Classifier,
    jpeg_quality: u8,
}

impl FrameAnalyzer {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        gender_classifier: Classifier,
        age_classifier: Classifier,
        jpeg_quality: Option<u8>,
    ) -> Self {
        Self {
            detector,
            gender_classifier,
            age_classifier,
            jpeg_quality: jpeg_quality.unwrap_or(JPEG_QUALITY_CLASSIFY),
        }
    }

    /// Analyzes one sensor frame.
    ///
    /// Returns `None` when the frame itself was unusable (skipped, no
    /// emission); otherwise the records to emit, possibly empty. The
    /// frame's buffers are released on every exit path once this
    /// returns, since the analyzer retains nothing.
    pub fn analyze(&mut self, frame: &SensorFrame, options: &DetectionOptions) -> Option<Vec<FaceRecord>> {
        let decoded = match yuv::convert(frame, self.jpeg_quality) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("skipping frame {}: {e}", frame.index);
                return None;
            }
        };
        let upright = decoded.rotated(frame.rotation);

        let observations = match self.detector.detect(&upright) {
            Ok(observations) => observations,
            Err(e) => {
                // Detection failure means no faces this frame, never a crash.
                log::error!("face detection failed on frame {}: {e}", frame.index);
                Vec::new()
            }
        };

        let faces: Vec<DetectedFace> = observations
            .into_iter()
            .filter_map(|obs| match crop_face(&upright, &obs.bounding_box) {
                Ok(crop) => Some(to_face(obs, crop)),
                Err(e) => {
                    log::debug!("dropping face on frame {}: {e}", frame.index);
                    None
                }
            })
            .collect();

        // Gender first, then age, matching the reference chain; the
        // fields are disjoint so only the within-frame order is fixed.
        let faces = self
            .gender_classifier
            .classify_batch(faces, ClassField::Gender, options.detect_gender);
        let faces = self
            .age_classifier
            .classify_batch(faces, ClassField::AgeRange, options.detect_age_range);

        Some(faces.into_iter().map(DetectedFace::into_record).collect())
    }
}

fn to_face(obs: FaceObservation, crop: Frame) -> DetectedFace {
    let mut face = DetectedFace::new(obs.tracking_id, obs.bounding_box, crop);
    face.smiling_probability = obs.smiling_probability;
    face.left_eye_open_probability = obs.left_eye_open_probability;
    face.right_eye_open_probability = obs.right_eye_open_probability;
    face.head_euler_angle_x = obs.head_euler_angle_x;
    face.head_euler_angle_y = obs.head_euler_angle_y;
    face.head_euler_angle_z = obs.head_euler_angle_z;
    face
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::classifier::{ClassifierModel, InferenceBackend};
    use crate::shared::frame::Rotation;
    use crate::shared::rect::BoundingBox;
    use ndarray::Array3;

    struct StubDetector {
        observations: Vec<FaceObservation>,
        fail: bool,
    }

    impl FaceDetector for StubDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
            if self.fail {
                return Err("engine unavailable".into());
            }
            Ok(self.observations.clone())
        }
    }

    struct FixedBackend(Vec<f32>);

    impl InferenceBackend for FixedBackend {
        fn infer(
            &self,
            _input: &Array3<f32>,
        ) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(self.0.clone())
        }
    }

    /// Fails on bright crops, succeeds on dark ones.
    struct BrightnessSensitiveBackend(Vec<f32>);

    impl InferenceBackend for BrightnessSensitiveBackend {
        fn infer(
            &self,
            input: &Array3<f32>,
        ) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
            if input[[0, 0, 0]] > 0.5 {
                return Err("tensor out of range".into());
            }
            Ok(self.0.clone())
        }
    }

    fn observation(id: i64, bbox: BoundingBox) -> FaceObservation {
        let mut obs = FaceObservation::new(bbox, 0.9);
        obs.tracking_id = Some(id);
        obs
    }

    fn gender_classifier(backend: impl InferenceBackend + 'static) -> Classifier {
        Classifier::new(
            ClassifierModel::with_labels(vec!["male".into(), "female".into()]),
            Box::new(backend),
        )
    }

    fn age_classifier(backend: impl InferenceBackend + 'static) -> Classifier {
        Classifier::new(
            ClassifierModel::with_labels(vec!["(25, 32)".into(), "(60, 100)".into()]),
            Box::new(backend),
        )
    }

    /// 32x16 frame, left half black, right half white.
    fn split_sensor_frame() -> SensorFrame {
        let mut data = Vec::with_capacity(32 * 16 * 3);
        for _y in 0..16 {
            for x in 0..32 {
                let v = if x < 16 { 0u8 } else { 255u8 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        SensorFrame::from_rgb(&Frame::new(data, 32, 16, 3, 0), Rotation::Deg0)
    }

    fn analyzer(detector: StubDetector) -> FrameAnalyzer {
        FrameAnalyzer::new(
            Box::new(detector),
            gender_classifier(FixedBackend(vec![0.7, 0.3])),
            age_classifier(FixedBackend(vec![0.9, 0.1])),
            None,
        )
    }

    #[test]
    fn test_zero_faces_emits_empty_sequence() {
        let mut analyzer = analyzer(StubDetector {
            observations: vec![],
            fail: false,
        });
        let records = analyzer.analyze(&split_sensor_frame(), &DetectionOptions::default());
        assert_eq!(records, Some(vec![]));
    }

    #[test]
    fn test_detection_failure_degrades_to_empty_emission() {
        let mut analyzer = analyzer(StubDetector {
            observations: vec![],
            fail: true,
        });
        let records = analyzer.analyze(&split_sensor_frame(), &DetectionOptions::default());
        assert_eq!(records, Some(vec![]));
    }

    #[test]
    fn test_malformed_frame_is_skipped_without_emission() {
        let mut analyzer = analyzer(StubDetector {
            observations: vec![],
            fail: false,
        });
        let mut frame = split_sensor_frame();
        frame.y.data.truncate(10);
        assert_eq!(analyzer.analyze(&frame, &DetectionOptions::default()), None);
    }

    #[test]
    fn test_happy_path_populates_both_labels() {
        let mut analyzer = analyzer(StubDetector {
            observations: vec![observation(1, BoundingBox::new(2, 2, 8, 8))],
            fail: false,
        });
        let records = analyzer
            .analyze(&split_sensor_frame(), &DetectionOptions::default())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tracking_id, Some(1));
        assert_eq!(records[0].gender, "male");
        assert_eq!(records[0].age_range, "(25, 32)");
    }

    #[test]
    fn test_degenerate_box_drops_face_but_keeps_frame() {
        let mut analyzer = analyzer(StubDetector {
            observations: vec![
                observation(1, BoundingBox::new(2, 2, 8, 8)),
                observation(2, BoundingBox::new(500, 500, 10, 10)),
            ],
            fail: false,
        });
        let records = analyzer
            .analyze(&split_sensor_frame(), &DetectionOptions::default())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tracking_id, Some(1));
    }

    #[test]
    fn test_age_failure_for_one_face_leaves_other_intact() {
        // Face 1 sits in the dark half, face 2 in the bright half; the
        // age backend rejects bright crops.
        let detector = StubDetector {
            observations: vec![
                observation(1, BoundingBox::new(2, 4, 8, 8)),
                observation(2, BoundingBox::new(20, 4, 8, 8)),
            ],
            fail: false,
        };
        let mut analyzer = FrameAnalyzer::new(
            Box::new(detector),
            gender_classifier(FixedBackend(vec![0.7, 0.3])),
            age_classifier(BrightnessSensitiveBackend(vec![0.9, 0.1])),
            None,
        );

        let records = analyzer
            .analyze(&split_sensor_frame(), &DetectionOptions::default())
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].gender, "male");
        assert_eq!(records[0].age_range, "(25, 32)");
        assert_eq!(records[1].gender, "male");
        assert_eq!(records[1].age_range, "unknown");
    }

    #[test]
    fn test_disabled_classifiers_emit_unknown() {
        let mut analyzer = analyzer(StubDetector {
            observations: vec![observation(1, BoundingBox::new(2, 2, 8, 8))],
            fail: false,
        });
        let options = DetectionOptions {
            detect_gender: false,
            detect_age_range: false,
        };
        let records = analyzer.analyze(&split_sensor_frame(), &options).unwrap();
        assert_eq!(records[0].gender, "unknown");
        assert_eq!(records[0].age_range, "unknown");
    }

    #[test]
    fn test_rotated_frame_detects_in_upright_space() {
        // A 32x16 sensor frame rotated 90 degrees becomes 16x32 upright;
        // a box valid only in upright space must survive the crop.
        let detector = StubDetector {
            observations: vec![observation(1, BoundingBox::new(4, 20, 8, 8))],
            fail: false,
        };
        let mut analyzer = FrameAnalyzer::new(
            Box::new(detector),
            gender_classifier(FixedBackend(vec![0.7, 0.3])),
            age_classifier(FixedBackend(vec![0.9, 0.1])),
            None,
        );
        let mut frame = split_sensor_frame();
        frame.rotation = Rotation::Deg90;

        let records = analyzer.analyze(&frame, &DetectionOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
    }
}
