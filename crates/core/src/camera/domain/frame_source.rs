use std::time::Duration;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquireError {
    #[error("frame source exhausted")]
    Exhausted,
    #[error("camera read failed: {0}")]
    Device(String),
    #[error("no frame within {0:?}")]
    Timeout(Duration),
    #[error("camera is no longer available")]
    Disconnected,
}

/// Blocking supplier of camera frames.
///
/// Each call suspends the caller until a frame is available or the source
/// fails. Only one read may be in flight per source.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Frame, AcquireError>;
}
