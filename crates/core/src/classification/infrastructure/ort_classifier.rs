use std::path::Path;

use ndarray::{Array3, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::classification::domain::classifier::InferenceBackend;

/// Interpreter thread count, matching the classifier models' tuning.
const INTRA_THREADS: usize = 5;

/// ONNX Runtime inference backend for the gender/age classifiers.
///
/// The session is immutable after load and safe to share across the
/// per-face classification threads; each model gets its own session.
pub struct OrtClassifierBackend {
    session: Session,
}

impl OrtClassifierBackend {
    pub fn load(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(INTRA_THREADS)?
            .commit_from_file(model_path)?;
        Ok(Self { session })
    }
}

impl InferenceBackend for OrtClassifierBackend {
    fn infer(
        &self,
        input: &Array3<f32>,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
        // HWC -> NCHW
        let nchw = input
            .view()
            .permuted_axes([2, 0, 1])
            .insert_axis(Axis(0))
            .to_owned();
        let tensor = Tensor::from_array(nchw)?;
        let outputs = self.session.run(ort::inputs![tensor]?)?;
        let probabilities = outputs[0].try_extract_tensor::<f32>()?;
        Ok(probabilities.iter().copied().collect())
    }
}
