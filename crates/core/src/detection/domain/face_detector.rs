use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Capability interface for face detection backends.
///
/// Backends apply their own confidence threshold and return detections in
/// their preferred order; the first one is treated as the primary face.
/// `&mut self` because inference sessions need exclusive access.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
