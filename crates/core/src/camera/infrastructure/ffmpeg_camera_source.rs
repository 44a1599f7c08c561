use std::thread;
use std::time::Duration;

use crate::camera::domain::frame_source::{AcquireError, FrameSource};
use crate::shared::frame::Frame;

/// Pause before polling again when the device has no packet ready.
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Capture device settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// Device URL as libavdevice expects it, e.g. `/dev/video0` (v4l2),
    /// `0` (avfoundation) or `video=Integrated Camera` (dshow).
    pub device: String,
    /// libavdevice input format name.
    pub format: String,
    /// Requested capture size as `WIDTHxHEIGHT`; the driver default when unset.
    pub video_size: Option<String>,
    pub framerate: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: default_device().to_string(),
            format: default_format().to_string(),
            video_size: None,
            framerate: None,
        }
    }
}

pub fn default_device() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "0"
    }
    #[cfg(target_os = "windows")]
    {
        "video=Integrated Camera"
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        "/dev/video0"
    }
}

pub fn default_format() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "avfoundation"
    }
    #[cfg(target_os = "windows")]
    {
        "dshow"
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        "v4l2"
    }
}

/// Reads a live camera through libavdevice via ffmpeg-next.
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`].
pub struct FfmpegCameraSource {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    frame_index: usize,
}

// Safety: FfmpegCameraSource is owned by the frame hub thread and never
// shared. The raw pointers inside ffmpeg types are not aliased.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    /// Opens the capture device. Failure here means the camera is unusable.
    pub fn open(config: &CameraConfig) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let input_format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == config.format)
            .ok_or_else(|| format!("Capture format '{}' is not available", config.format))?;

        let mut options = ffmpeg_next::Dictionary::new();
        if let Some(size) = &config.video_size {
            options.set("video_size", size);
        }
        if let Some(fps) = config.framerate {
            options.set("framerate", &fps.to_string());
        }

        let ictx = ffmpeg_next::format::open_with(
            &config.device,
            &ffmpeg_next::format::Format::Input(input_format),
            options,
        )
        .map_err(|e| format!("Cannot open camera '{}': {e}", config.device))?
        .input();

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("Camera exposes no video stream")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "Opened camera {} ({}) at {width}x{height}",
            config.device,
            config.format
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
            frame_index: 0,
        })
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, AcquireError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| AcquireError::Device(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

impl FrameSource for FfmpegCameraSource {
    fn read_frame(&mut self) -> Result<Frame, AcquireError> {
        if let Some(frame) = self.try_receive()? {
            return Ok(frame);
        }

        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            if let Err(e) = packet.read(&mut self.ictx) {
                match read_failure(e) {
                    ReadFailure::NotReady => {
                        thread::sleep(RETRY_BACKOFF);
                        continue;
                    }
                    ReadFailure::Fatal(e) => return Err(e),
                }
            }

            if packet.stream() != self.video_stream_index {
                continue;
            }

            self.decoder
                .send_packet(&packet)
                .map_err(|e| AcquireError::Device(e.to_string()))?;

            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }
        }
    }
}

enum ReadFailure {
    /// Nothing buffered yet; poll again after [`RETRY_BACKOFF`].
    NotReady,
    Fatal(AcquireError),
}

fn read_failure(error: ffmpeg_next::Error) -> ReadFailure {
    match error {
        ffmpeg_next::Error::Other { errno } if errno == ffmpeg_next::error::EAGAIN => {
            ReadFailure::NotReady
        }
        ffmpeg_next::Error::Eof => ReadFailure::Fatal(AcquireError::Exhausted),
        e => ReadFailure::Fatal(AcquireError::Device(e.to_string())),
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
