use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::domain::frame_source::{AcquireError, FrameSource};
use crate::shared::frame::Frame;

/// Replays one still image as if it were a camera running at `fps`.
///
/// Lets the server run on machines without a capture device (kiosk
/// rehearsals, CI smoke runs). An optional frame limit makes the source
/// exhaust like an unplugged camera.
pub struct StillImageSource {
    image: Frame,
    interval: Duration,
    limit: Option<usize>,
    delivered: usize,
    next_due: Option<Instant>,
}

impl StillImageSource {
    pub fn open(path: &Path, fps: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let img = image::open(path)
            .map_err(|e| format!("Cannot read image {}: {e}", path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Self::from_frame(
            Frame::new(img.into_raw(), width, height, 3, 0),
            fps,
        ))
    }

    pub fn from_frame(image: Frame, fps: f64) -> Self {
        let interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Self {
            image,
            interval,
            limit: None,
            delivered: 0,
            next_due: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl FrameSource for StillImageSource {
    fn read_frame(&mut self) -> Result<Frame, AcquireError> {
        if self.limit.is_some_and(|limit| self.delivered >= limit) {
            return Err(AcquireError::Exhausted);
        }

        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.unwrap_or(now).max(now) + self.interval);

        let frame = Frame::new(
            self.image.data().to_vec(),
            self.image.width(),
            self.image.height(),
            self.image.channels(),
            self.delivered,
        );
        self.delivered += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, v: u8) -> Frame {
        Frame::new(vec![v; (width * height * 3) as usize], width, height, 3, 0)
    }

    #[test]
    fn test_replays_image_with_increasing_index() {
        let mut source = StillImageSource::from_frame(gray(4, 2, 77), 0.0);
        let a = source.read_frame().unwrap();
        let b = source.read_frame().unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(b.width(), 4);
        assert!(b.data().iter().all(|&p| p == 77));
    }

    #[test]
    fn test_limit_exhausts_source() {
        let mut source = StillImageSource::from_frame(gray(2, 2, 0), 0.0).with_limit(2);
        assert!(source.read_frame().is_ok());
        assert!(source.read_frame().is_ok());
        assert_eq!(source.read_frame().unwrap_err(), AcquireError::Exhausted);
    }

    #[test]
    fn test_paces_reads_at_fps() {
        let mut source = StillImageSource::from_frame(gray(2, 2, 0), 50.0);
        let start = Instant::now();
        for _ in 0..3 {
            source.read_frame().unwrap();
        }
        // First frame is immediate, the next two wait one interval each
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[test]
    fn test_open_decodes_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbImage::from_pixel(6, 3, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut source = StillImageSource::open(&path, 0.0).unwrap();
        let frame = source.read_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (6, 3));
        assert_eq!(&frame.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(StillImageSource::open(Path::new("/nonexistent/face.png"), 30.0).is_err());
    }
}
