use crate::normalization::region_normalizer::NormalizedImage;

/// Black-box skin-tone model: one normalized image in, one score per class
/// out.
pub trait ToneModel: Send {
    fn infer(&mut self, image: &NormalizedImage) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
