use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::classification::domain::tone_model::ToneModel;
use crate::normalization::region_normalizer::NormalizedImage;
use crate::shared::constants::CLASSIFIER_INPUT_SIZE;
use crate::shared::labels::{LabelError, LabelSet};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model inference failed: {0}")]
    Inference(String),
    #[error("model returned {got} scores for {expected} labels")]
    MalformedOutput { expected: usize, got: usize },
    #[error("model returned a non-finite score")]
    NonFinite,
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// One frame's verdict.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationSample {
    pub label: String,
    pub probabilities: Vec<f32>,
}

pub type SharedToneClassifier = Arc<Mutex<ToneClassifier>>;

/// Maps a normalized image to a label from a fixed set.
pub struct ToneClassifier {
    model: Box<dyn ToneModel>,
    labels: LabelSet,
}

impl ToneClassifier {
    /// Wraps `model` and checks it once on a blank image.
    ///
    /// A model that cannot run, or that disagrees with `labels` about the
    /// number of classes, is rejected here rather than on the first request.
    pub fn new(model: Box<dyn ToneModel>, labels: LabelSet) -> Result<Self, ClassifierError> {
        let mut classifier = Self { model, labels };
        let probe = classifier.classify(&NormalizedImage::blank(CLASSIFIER_INPUT_SIZE))?;
        log::debug!("Tone model probe: {} {:?}", probe.label, probe.probabilities);
        Ok(classifier)
    }

    pub fn shared(self) -> SharedToneClassifier {
        Arc::new(Mutex::new(self))
    }

    pub fn classify(&mut self, image: &NormalizedImage) -> Result<ClassificationSample, ClassifierError> {
        let probabilities = self
            .model
            .infer(image)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        if probabilities.len() != self.labels.len() {
            return Err(ClassifierError::MalformedOutput {
                expected: self.labels.len(),
                got: probabilities.len(),
            });
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(ClassifierError::NonFinite);
        }

        let index = argmax(&probabilities);
        let label = self.labels.name(index)?.to_string();
        Ok(ClassificationSample {
            label,
            probabilities,
        })
    }
}

/// Index of the largest score; the lowest index wins a tie.
fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::TONE_LABELS;
    use rstest::rstest;

    /// Returns the same scores for every image.
    struct StubModel {
        scores: Vec<f32>,
    }

    impl ToneModel for StubModel {
        fn infer(&mut self, _image: &NormalizedImage) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            Ok(self.scores.clone())
        }
    }

    /// Succeeds on the probe, then fails.
    struct FlakyModel {
        calls: usize,
    }

    impl ToneModel for FlakyModel {
        fn infer(&mut self, _image: &NormalizedImage) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            self.calls += 1;
            if self.calls > 1 {
                return Err("device lost".into());
            }
            Ok(vec![0.25; 4])
        }
    }

    fn labels() -> LabelSet {
        LabelSet::new(TONE_LABELS.iter().copied()).unwrap()
    }

    fn classifier(scores: Vec<f32>) -> ToneClassifier {
        ToneClassifier::new(Box::new(StubModel { scores }), labels()).unwrap()
    }

    #[rstest]
    #[case::dark(vec![0.7, 0.1, 0.1, 0.1], "dark")]
    #[case::mid_dark(vec![0.1, 0.6, 0.2, 0.1], "mid-dark")]
    #[case::mid_light(vec![0.1, 0.2, 0.6, 0.1], "mid-light")]
    #[case::light(vec![0.0, 0.0, 0.1, 0.9], "light")]
    fn test_classify_picks_argmax(#[case] scores: Vec<f32>, #[case] expected: &str) {
        let sample = classifier(scores.clone())
            .classify(&NormalizedImage::blank(64))
            .unwrap();
        assert_eq!(sample.label, expected);
        assert_eq!(sample.probabilities, scores);
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let sample = classifier(vec![0.1, 0.4, 0.4, 0.1])
            .classify(&NormalizedImage::blank(64))
            .unwrap();
        assert_eq!(sample.label, "mid-dark");
    }

    #[test]
    fn test_wrong_output_length_is_rejected_at_construction() {
        let model = StubModel {
            scores: vec![0.5, 0.5],
        };
        let err = ToneClassifier::new(Box::new(model), labels()).err().unwrap();
        assert!(matches!(
            err,
            ClassifierError::MalformedOutput {
                expected: 4,
                got: 2
            }
        ));
    }

    #[test]
    fn test_non_finite_output_is_rejected() {
        let model = StubModel {
            scores: vec![f32::NAN, 0.1, 0.1, 0.1],
        };
        assert!(matches!(
            ToneClassifier::new(Box::new(model), labels()),
            Err(ClassifierError::NonFinite)
        ));
    }

    #[test]
    fn test_runtime_inference_failure_is_reported() {
        let mut classifier = ToneClassifier::new(Box::new(FlakyModel { calls: 0 }), labels()).unwrap();
        let err = classifier.classify(&NormalizedImage::blank(64)).unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(msg) if msg == "device lost"));
    }

    #[test]
    fn test_argmax_single_element() {
        assert_eq!(argmax(&[0.3]), 0);
    }
}
