pub mod assets;
pub mod ort_classifier;
