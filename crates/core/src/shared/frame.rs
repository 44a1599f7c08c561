use std::time::Instant;

use ndarray::ArrayView3;

/// A single camera capture: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens in the frame source; everything past it
/// works on tightly-packed RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            captured_at: Instant::now(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Sequence number assigned by the source, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// When the source produced the frame.
    ///
    /// Camera backends stamp frames as they come out of the decoder, so a
    /// frame the driver buffered while nobody was reading carries the time
    /// it was decoded, not the time the sensor exposed it.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn with_captured_at(mut self, at: Instant) -> Self {
        self.captured_at = at;
        self
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the `width × height` block at `(x, y)` into a new frame.
    ///
    /// The caller guarantees the block lies inside the frame.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Frame {
        debug_assert!(x + width <= self.width && y + height <= self.height);
        let channels = self.channels as usize;
        let row_len = width as usize * channels;
        let stride = self.width as usize * channels;

        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in y as usize..(y + height) as usize {
            let start = row * stride + x as usize * channels;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Frame {
            data,
            width,
            height,
            channels: self.channels,
            index: self.index,
            captured_at: self.captured_at,
        }
    }

    /// Copies the pixels into an [`image::RgbImage`]. `None` unless RGB24.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.channels != 3 {
            return None;
        }
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
