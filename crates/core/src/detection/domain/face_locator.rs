use std::sync::{Arc, Mutex};

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Face locator shared between the estimator and every live stream.
pub type SharedFaceLocator = Arc<Mutex<FaceLocator>>;

/// Reduces a detector's output to at most one primary face.
///
/// When several faces are reported the first wins. That is a simplification
/// for a single-user kiosk, not a guarantee that the right face was picked.
pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
}

impl FaceLocator {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    pub fn shared(self) -> SharedFaceLocator {
        Arc::new(Mutex::new(self))
    }

    /// Returns the primary face clamped to frame bounds, or `None`.
    pub fn locate(&mut self, frame: &Frame) -> Result<Option<Detection>, Box<dyn std::error::Error>> {
        let detections = self.detector.detect(frame)?;
        Ok(detections.first().map(Detection::clamped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct StubDetector {
        detections: Vec<Detection>,
        fail: bool,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            if self.fail {
                return Err("inference failed".into());
            }
            Ok(self.detections.clone())
        }
    }

    fn detection(x: f64, confidence: f64) -> Detection {
        Detection {
            x,
            y: 0.1,
            width: 0.2,
            height: 0.2,
            confidence,
        }
    }

    fn locator(detections: Vec<Detection>) -> FaceLocator {
        FaceLocator::new(Box::new(StubDetector {
            detections,
            fail: false,
        }))
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, 0)
    }

    #[test]
    fn test_no_faces_is_none() {
        assert!(locator(vec![]).locate(&frame()).unwrap().is_none());
    }

    #[test]
    fn test_first_detection_wins() {
        let mut loc = locator(vec![detection(0.1, 0.7), detection(0.5, 0.9)]);
        let found = loc.locate(&frame()).unwrap().unwrap();
        assert_relative_eq!(found.x, 0.1);
        assert_relative_eq!(found.confidence, 0.7);
    }

    #[test]
    fn test_out_of_bounds_detection_is_clamped() {
        let mut loc = locator(vec![Detection {
            x: 0.9,
            y: -0.1,
            width: 0.3,
            height: 0.3,
            confidence: 0.8,
        }]);
        let found = loc.locate(&frame()).unwrap().unwrap();
        assert!(found.x + found.width <= 1.0);
        assert!(found.y >= 0.0);
        assert_relative_eq!(found.height, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_detector_error_propagates() {
        let mut loc = FaceLocator::new(Box::new(StubDetector {
            detections: vec![],
            fail: true,
        }));
        assert!(loc.locate(&frame()).is_err());
    }
}
