use thiserror::Error;

use crate::camera::domain::frame_source::FrameSource;
use crate::classification::domain::tone_classifier::{ClassifierError, SharedToneClassifier};
use crate::detection::domain::face_locator::SharedFaceLocator;
use crate::normalization::region_normalizer::RegionNormalizer;
use crate::shared::labels::EstimatedLabel;

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

/// Classifies several consecutive frames and reports the majority label.
pub struct StabilizedEstimator {
    locator: SharedFaceLocator,
    normalizer: RegionNormalizer,
    classifier: SharedToneClassifier,
}

impl StabilizedEstimator {
    pub fn new(
        locator: SharedFaceLocator,
        normalizer: RegionNormalizer,
        classifier: SharedToneClassifier,
    ) -> Self {
        Self {
            locator,
            normalizer,
            classifier,
        }
    }

    /// Reads up to `frame_count` frames from `source` and votes.
    ///
    /// A frame the source cannot deliver, or the detector chokes on, is
    /// skipped. Classifier failures abort the estimate.
    pub fn estimate(
        &self,
        source: &mut dyn FrameSource,
        frame_count: usize,
    ) -> Result<EstimatedLabel, EstimationError> {
        let mut predictions = Vec::with_capacity(frame_count);

        for attempt in 0..frame_count {
            let frame = match source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Skipping frame {attempt}: {e}");
                    continue;
                }
            };

            let face = {
                let mut locator = self
                    .locator
                    .lock()
                    .map_err(|_| EstimationError::Poisoned("face locator"))?;
                match locator.locate(&frame) {
                    Ok(face) => face,
                    Err(e) => {
                        log::warn!("Skipping frame {attempt}: face detection failed: {e}");
                        continue;
                    }
                }
            };

            let image = self.normalizer.normalize(&frame, face.as_ref());
            let sample = self
                .classifier
                .lock()
                .map_err(|_| EstimationError::Poisoned("tone classifier"))?
                .classify(&image)?;

            log::debug!(
                "Frame {attempt}: {} {:?} (face: {})",
                sample.label,
                sample.probabilities,
                face.is_some()
            );
            predictions.push(sample.label);
        }

        let result = majority_vote(&predictions);
        log::info!(
            "Estimated tone '{result}' from {}/{frame_count} frames",
            predictions.len()
        );
        Ok(result)
    }
}

/// Most frequent label, or `Unknown` for an empty slice.
///
/// Ties go to whichever tied label appears first in `labels`.
pub fn majority_vote(labels: &[String]) -> EstimatedLabel {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        match tally.iter_mut().find(|(name, _)| *name == label.as_str()) {
            Some((_, count)) => *count += 1,
            None => tally.push((label.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((name, count));
        }
    }
    best.map_or(EstimatedLabel::Unknown, |(name, _)| {
        EstimatedLabel::Known(name.to_string())
    })
}
