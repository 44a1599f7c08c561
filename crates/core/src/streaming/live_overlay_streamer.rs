use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::camera::domain::frame_source::FrameSource;
use crate::detection::domain::face_locator::SharedFaceLocator;
use crate::shared::constants::DEFAULT_JPEG_QUALITY;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;
use crate::streaming::mjpeg::{encode_jpeg, multipart_chunk};
use crate::streaming::overlay::annotate;

/// Stops a running stream from outside. Cloneable and thread-safe.
#[derive(Clone, Debug, Default)]
pub struct StreamHandle {
    stopped: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    Stopped,
}

/// Lazy sequence of annotated JPEG parts, one per camera frame.
///
/// Ends for good on the first acquisition failure or once its handle is
/// stopped; a finished streamer never yields again.
pub struct LiveOverlayStreamer {
    source: Box<dyn FrameSource>,
    locator: SharedFaceLocator,
    jpeg_quality: u8,
    handle: StreamHandle,
    state: StreamState,
    frames_sent: usize,
}

impl LiveOverlayStreamer {
    pub fn new(source: Box<dyn FrameSource>, locator: SharedFaceLocator) -> Self {
        Self {
            source,
            locator,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            handle: StreamHandle::default(),
            state: StreamState::Streaming,
            frames_sent: 0,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn stop(&mut self, reason: &str) {
        if self.state == StreamState::Streaming {
            log::info!(
                "Live stream stopped after {} frames: {reason}",
                self.frames_sent
            );
        }
        self.state = StreamState::Stopped;
    }

    fn locate(&self, frame: &Frame) -> Option<Detection> {
        let mut locator = match self.locator.lock() {
            Ok(locator) => locator,
            Err(_) => {
                log::warn!("Face locator lock poisoned; drawing frame without a box");
                return None;
            }
        };
        locator.locate(frame).unwrap_or_else(|e| {
            log::warn!("Face detection failed on frame {}: {e}", frame.index());
            None
        })
    }

    fn render(&self, frame: &Frame) -> Result<Vec<u8>, String> {
        let face = self.locate(frame);
        let mut img = frame
            .to_rgb_image()
            .ok_or_else(|| format!("unsupported frame with {} channels", frame.channels()))?;
        annotate(&mut img, face.as_ref());
        let jpeg = encode_jpeg(&img, self.jpeg_quality).map_err(|e| e.to_string())?;
        Ok(multipart_chunk(&jpeg))
    }
}

impl Iterator for LiveOverlayStreamer {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.state == StreamState::Stopped {
            return None;
        }
        if self.handle.is_stopped() {
            self.stop("cancelled");
            return None;
        }

        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.stop(&format!("camera read failed: {e}"));
                return None;
            }
        };

        match self.render(&frame) {
            Ok(chunk) => {
                self.frames_sent += 1;
                Some(chunk)
            }
            Err(e) => {
                self.stop(&format!("could not encode frame: {e}"));
                None
            }
        }
    }
}
