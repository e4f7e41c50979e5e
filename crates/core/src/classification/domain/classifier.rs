use ndarray::Array3;
use thiserror::Error;

use crate::classification::domain::ranking::{top_ranked, ClassificationResult};
use crate::shared::constants::{
    CLASSIFIER_INPUT_SIZE, CLASSIFIER_MAX_RESULTS, CLASSIFIER_MEAN, CLASSIFIER_STD,
    CLASSIFIER_THRESHOLD,
};
use crate::shared::face::DetectedFace;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("classifier input frame is empty")]
    EmptyInput,
    #[error("inference failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Inference engine seam: a normalized HWC tensor goes in, one
/// probability per class comes out. Implementations are read-only
/// after load and shared across concurrent classification calls.
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: &Array3<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Immutable model description: ordered labels (index = class id),
/// fixed square input size, and normalization constants. Loaded once
/// per classifier instance at pipeline activation.
#[derive(Clone, Debug)]
pub struct ClassifierModel {
    pub labels: Vec<String>,
    pub input_size: u32,
    pub mean: f32,
    pub std: f32,
    pub max_results: usize,
    pub threshold: f32,
}

impl ClassifierModel {
    pub fn with_labels(labels: Vec<String>) -> Self {
        Self {
            labels,
            input_size: CLASSIFIER_INPUT_SIZE,
            mean: CLASSIFIER_MEAN,
            std: CLASSIFIER_STD,
            max_results: CLASSIFIER_MAX_RESULTS,
            threshold: CLASSIFIER_THRESHOLD,
        }
    }
}

/// Which write-once face field a batch classification populates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassField {
    Gender,
    AgeRange,
}

/// Wraps one loaded model+labels pair and runs ranked classification.
///
/// Read-only after construction; a single instance serves all frames
/// for the lifetime of the pipeline.
pub struct Classifier {
    model: ClassifierModel,
    backend: Box<dyn InferenceBackend>,
}

impl Classifier {
    pub fn new(model: ClassifierModel, backend: Box<dyn InferenceBackend>) -> Self {
        Self { model, backend }
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    /// Resizes, normalizes, infers, and ranks.
    pub fn classify(&self, image: &Frame) -> Result<Vec<ClassificationResult>, InferenceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(InferenceError::EmptyInput);
        }
        let input = preprocess(image, self.model.input_size, self.model.mean, self.model.std);
        let probabilities = self.backend.infer(&input).map_err(InferenceError::Backend)?;
        Ok(top_ranked(
            &probabilities,
            &self.model.labels,
            self.model.max_results,
            self.model.threshold,
        ))
    }

    /// Classifies every face's crop and writes the top label into the
    /// designated field.
    ///
    /// `enabled: false` is an explicit opt-out: faces come back
    /// untouched and no inference runs. A failure for one face leaves
    /// that face's field unset and never aborts the batch. Faces are
    /// independent, so the batch fans out across scoped threads; output
    /// order matches input order.
    pub fn classify_batch(
        &self,
        faces: Vec<DetectedFace>,
        field: ClassField,
        enabled: bool,
    ) -> Vec<DetectedFace> {
        if !enabled || faces.is_empty() {
            return faces;
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = faces
                .into_iter()
                .map(|face| scope.spawn(move || self.classify_one(face, field)))
                .collect();
            handles
                .into_iter()
                .filter_map(|h| match h.join() {
                    Ok(face) => Some(face),
                    Err(_) => {
                        log::error!("classification thread panicked, face dropped");
                        None
                    }
                })
                .collect()
        })
    }

    fn classify_one(&self, mut face: DetectedFace, field: ClassField) -> DetectedFace {
        // A panicking backend must not take the analyzer worker down
        // with it; the face just keeps its field unset.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.classify(face.crop())
        }));
        match outcome {
            Ok(Ok(results)) => {
                if let Some(top) = results.first() {
                    match field {
                        ClassField::Gender => face.set_gender(top.label.clone()),
                        ClassField::AgeRange => face.set_age_range(top.label.clone()),
                    }
                }
            }
            Ok(Err(e)) => {
                log::warn!(
                    "classification failed for face {:?}: {e}",
                    face.tracking_id
                );
            }
            Err(_) => {
                log::warn!("classification panicked for face {:?}", face.tracking_id);
            }
        }
        face
    }
}

/// Deterministic nearest-neighbour resize to `size x size`, then
/// per-channel `(raw_byte - mean) / std` into an HWC float tensor.
fn preprocess(frame: &Frame, size: u32, mean: f32, std: f32) -> Array3<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = Array3::<f32>::zeros((s, s, 3));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[y, x, c]] = (src[[src_y, src_x, c]] as f32 - mean) / std;
            }
        }
    }
    tensor
}
