pub mod face_tracker;
pub mod onnx_face_detector;
