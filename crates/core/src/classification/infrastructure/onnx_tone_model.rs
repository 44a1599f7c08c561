use std::path::Path;

use crate::classification::domain::tone_model::ToneModel;
use crate::normalization::region_normalizer::NormalizedImage;
use crate::shared::onnx_session::load_session;

/// Skin-tone classifier exported to ONNX.
///
/// Expects one NHWC float input `[1, 64, 64, 3]` and produces one row of
/// class probabilities.
pub struct OnnxToneModel {
    session: ort::session::Session,
}

impl OnnxToneModel {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        log::info!("Loaded tone model from {}", model_path.display());
        Ok(Self { session })
    }
}

impl ToneModel for OnnxToneModel {
    fn infer(&mut self, image: &NormalizedImage) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(image.tensor().clone())?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Tone model produced no outputs".into());
        }

        let scores = outputs[0].try_extract_array::<f32>()?;
        Ok(scores.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_fails() {
        let result = OnnxToneModel::new(Path::new("/nonexistent/tone.onnx"));
        assert!(result.is_err());
    }
}
