use serde::Serialize;

use crate::shared::frame::Frame;
use crate::shared::rect::BoundingBox;

/// Label substituted for a classifier field that was never computed.
pub const UNKNOWN_LABEL: &str = "unknown";

/// One tracked face within a single frame.
///
/// Carries its own cropped image buffer while classification runs;
/// the buffer is released when the face is turned into a [`FaceRecord`].
/// `gender` / `age_range` are write-once: the first label sticks.
#[derive(Clone, Debug)]
pub struct DetectedFace {
    pub tracking_id: Option<i64>,
    pub bounding_box: BoundingBox,
    pub smiling_probability: Option<f32>,
    pub left_eye_open_probability: Option<f32>,
    pub right_eye_open_probability: Option<f32>,
    pub head_euler_angle_x: Option<f32>,
    pub head_euler_angle_y: Option<f32>,
    pub head_euler_angle_z: Option<f32>,
    crop: Frame,
    gender: Option<String>,
    age_range: Option<String>,
}

impl DetectedFace {
    pub fn new(tracking_id: Option<i64>, bounding_box: BoundingBox, crop: Frame) -> Self {
        Self {
            tracking_id,
            bounding_box,
            smiling_probability: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
            head_euler_angle_x: None,
            head_euler_angle_y: None,
            head_euler_angle_z: None,
            crop,
            gender: None,
            age_range: None,
        }
    }

    pub fn crop(&self) -> &Frame {
        &self.crop
    }

    pub fn gender(&self) -> Option<&str> {
        self.gender.as_deref()
    }

    pub fn age_range(&self) -> Option<&str> {
        self.age_range.as_deref()
    }

    /// Sets the gender label unless one was already written.
    pub fn set_gender(&mut self, label: String) {
        self.gender.get_or_insert(label);
    }

    /// Sets the age-range label unless one was already written.
    pub fn set_age_range(&mut self, label: String) {
        self.age_range.get_or_insert(label);
    }

    /// Finalizes the face for emission, releasing the crop buffer.
    pub fn into_record(self) -> FaceRecord {
        FaceRecord {
            smiling_probability: self.smiling_probability,
            left_eye_open_probability: self.left_eye_open_probability,
            right_eye_open_probability: self.right_eye_open_probability,
            head_euler_angle_x: self.head_euler_angle_x,
            head_euler_angle_y: self.head_euler_angle_y,
            head_euler_angle_z: self.head_euler_angle_z,
            tracking_id: self.tracking_id,
            gender: self.gender.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            age_range: self.age_range.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        }
    }
}

/// The per-face record pushed to event-stream subscribers.
///
/// Immutable once emitted; unset labels are mapped to `"unknown"`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceRecord {
    pub smiling_probability: Option<f32>,
    pub left_eye_open_probability: Option<f32>,
    pub right_eye_open_probability: Option<f32>,
    pub head_euler_angle_x: Option<f32>,
    pub head_euler_angle_y: Option<f32>,
    pub head_euler_angle_z: Option<f32>,
    pub tracking_id: Option<i64>,
    pub gender: String,
    pub age_range: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> DetectedFace {
        let crop = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, 0);
        DetectedFace::new(Some(7), BoundingBox::new(1, 2, 4, 4), crop)
    }

    #[test]
    fn test_labels_start_unset() {
        let f = face();
        assert_eq!(f.gender(), None);
        assert_eq!(f.age_range(), None);
    }

    #[test]
    fn test_labels_are_write_once() {
        let mut f = face();
        f.set_gender("female".to_string());
        f.set_gender("male".to_string());
        f.set_age_range("25-32".to_string());
        f.set_age_range("60+".to_string());
        assert_eq!(f.gender(), Some("female"));
        assert_eq!(f.age_range(), Some("25-32"));
    }

    #[test]
    fn test_record_maps_unset_labels_to_unknown() {
        let record = face().into_record();
        assert_eq!(record.gender, "unknown");
        assert_eq!(record.age_range, "unknown");
        assert_eq!(record.tracking_id, Some(7));
    }

    #[test]
    fn test_record_keeps_set_labels() {
        let mut f = face();
        f.set_gender("male".to_string());
        let record = f.into_record();
        assert_eq!(record.gender, "male");
        assert_eq!(record.age_range, "unknown");
    }

    #[test]
    fn test_record_serializes_with_wire_field_names() {
        let json = serde_json::to_value(face().into_record()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "smilingProbability",
            "leftEyeOpenProbability",
            "rightEyeOpenProbability",
            "headEulerAngleX",
            "headEulerAngleY",
            "headEulerAngleZ",
            "trackingId",
            "gender",
            "ageRange",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
    }
}
