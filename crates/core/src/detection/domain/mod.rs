pub mod face_crop;
pub mod face_detector;
