use std::time::Instant;

use crate::camera::domain::frame_source::{AcquireError, FrameSource};
use crate::shared::frame::Frame;

/// Passes through only frames captured at or after `since`.
///
/// Older frames are read and discarded, so whatever was already in flight
/// when a request arrived never reaches its analysis.
pub struct FreshFrames<S> {
    inner: S,
    since: Instant,
}

impl<S: FrameSource> FreshFrames<S> {
    pub fn new(inner: S, since: Instant) -> Self {
        Self { inner, since }
    }
}

impl<S: FrameSource> FrameSource for FreshFrames<S> {
    fn read_frame(&mut self) -> Result<Frame, AcquireError> {
        loop {
            let frame = self.inner.read_frame()?;
            if frame.captured_at() >= self.since {
                return Ok(frame);
            }
            log::debug!("Dropping frame {} captured before the request", frame.index());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedSource {
        script: VecDeque<Result<Frame, AcquireError>>,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Frame, AcquireError> {
            self.script.pop_front().unwrap_or(Err(AcquireError::Exhausted))
        }
    }

    fn frame_at(index: usize, at: Instant) -> Frame {
        Frame::new(vec![0u8; 3], 1, 1, 3, index).with_captured_at(at)
    }

    #[test]
    fn test_frames_before_cutoff_are_skipped() {
        let since = Instant::now();
        let early = since - Duration::from_millis(500);
        let late = since + Duration::from_millis(10);
        let mut source = FreshFrames::new(
            ScriptedSource {
                script: vec![Ok(frame_at(0, early)), Ok(frame_at(1, early)), Ok(frame_at(2, late))]
                    .into(),
            },
            since,
        );
        assert_eq!(source.read_frame().unwrap().index(), 2);
        assert_eq!(source.read_frame().unwrap_err(), AcquireError::Exhausted);
    }

    #[test]
    fn test_errors_pass_through() {
        let since = Instant::now();
        let mut source = FreshFrames::new(
            ScriptedSource {
                script: vec![
                    Err(AcquireError::Device("glitch".into())),
                    Ok(frame_at(4, since)),
                ]
                .into(),
            },
            since,
        );
        assert_eq!(
            source.read_frame().unwrap_err(),
            AcquireError::Device("glitch".into())
        );
        assert_eq!(source.read_frame().unwrap().index(), 4);
    }
}
