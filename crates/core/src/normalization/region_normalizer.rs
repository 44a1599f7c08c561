use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

use crate::normalization::histogram::equalize_value_channel;
use crate::shared::constants::CLASSIFIER_INPUT_SIZE;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Classifier input: one `size × size` RGB image as `[1, H, W, 3]` floats in
/// `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedImage {
    tensor: Array4<f32>,
}

impl NormalizedImage {
    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    /// Side length in pixels.
    pub fn size(&self) -> usize {
        self.tensor.shape()[1]
    }

    /// Mid-gray input of the given size, used to probe a model.
    pub fn blank(size: u32) -> Self {
        let s = size as usize;
        Self {
            tensor: Array4::from_elem((1, s, s, 3), 0.5),
        }
    }

    /// Back to 8-bit RGB.
    pub fn to_frame(&self) -> Frame {
        let size = self.size() as u32;
        let data = self
            .tensor
            .iter()
            .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        Frame::new(data, size, size, 3, 0)
    }
}

/// Turns a frame plus an optional face box into classifier input.
///
/// Crops to the face (the whole frame when the box is missing or empty),
/// equalizes brightness, resizes and scales to `[0, 1]`.
pub struct RegionNormalizer {
    input_size: u32,
}

impl Default for RegionNormalizer {
    fn default() -> Self {
        Self::new(CLASSIFIER_INPUT_SIZE)
    }
}

impl RegionNormalizer {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size: input_size.max(1),
        }
    }

    pub fn normalize(&self, frame: &Frame, face: Option<&Detection>) -> NormalizedImage {
        let mut region = face_region(frame, face);
        equalize_value_channel(&mut region);
        let resized = self.resize(region);

        let size = self.input_size as usize;
        let data: Vec<f32> = resized.iter().map(|&b| b as f32 / 255.0).collect();
        let tensor = Array4::from_shape_vec((1, size, size, 3), data)
            .unwrap_or_else(|_| Array4::zeros((1, size, size, 3)));
        NormalizedImage { tensor }
    }

    fn resize(&self, region: Frame) -> Vec<u8> {
        let (w, h) = (region.width(), region.height());
        if w == self.input_size && h == self.input_size {
            return region.into_data();
        }
        let Some(img) = RgbImage::from_raw(w, h, to_rgb(region)) else {
            return vec![0; (self.input_size * self.input_size * 3) as usize];
        };
        imageops::resize(&img, self.input_size, self.input_size, FilterType::Triangle).into_raw()
    }
}

/// The pixels inside `face`, or the whole frame when there is no usable box.
pub fn face_region(frame: &Frame, face: Option<&Detection>) -> Frame {
    let rect = face.and_then(|d| d.to_pixel_rect(frame.width(), frame.height()));
    let region = match rect {
        Some(r) => frame.crop(r.x, r.y, r.width, r.height),
        None => frame.clone(),
    };
    if region.channels() == 3 {
        region
    } else {
        let (w, h, index) = (region.width(), region.height(), region.index());
        Frame::new(to_rgb(region), w, h, 3, index)
    }
}

fn to_rgb(frame: Frame) -> Vec<u8> {
    let channels = frame.channels() as usize;
    if channels == 3 {
        return frame.into_data();
    }
    frame
        .data()
        .chunks_exact(channels.max(1))
        .flat_map(|px| match px.len() {
            1 | 2 => [px[0], px[0], px[0]],
            _ => [px[0], px[1], px[2]],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 3) as u8, (y * 2) as u8, ((x + y) % 256) as u8]);
            }
        }
        Frame::new(data, width, height, 3, 0)
    }

    /// 64x64 gray ramp with every level present 16 times: already equalized.
    fn uniform_ramp() -> Frame {
        let data = (0..64 * 64u32)
            .flat_map(|k| {
                let v = (k / 16) as u8;
                [v, v, v]
            })
            .collect();
        Frame::new(data, 64, 64, 3, 0)
    }

    fn face(x: f64, y: f64, w: f64, h: f64) -> Detection {
        Detection {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_output_shape_and_range() {
        let out = RegionNormalizer::default().normalize(&gradient_frame(160, 120), None);
        assert_eq!(out.tensor().shape(), &[1, 64, 64, 3]);
        assert!(out.tensor().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_output_shape_with_face() {
        let detection = face(0.25, 0.25, 0.5, 0.5);
        let out = RegionNormalizer::default().normalize(&gradient_frame(160, 120), Some(&detection));
        assert_eq!(out.tensor().shape(), &[1, 64, 64, 3]);
    }

    #[test]
    fn test_custom_input_size() {
        let out = RegionNormalizer::new(32).normalize(&gradient_frame(50, 40), None);
        assert_eq!(out.size(), 32);
        assert_eq!(out.tensor().shape(), &[1, 32, 32, 3]);
    }

    #[test]
    fn test_face_region_crops_to_box() {
        let frame = gradient_frame(80, 40);
        let region = face_region(&frame, Some(&face(0.125, 0.25, 0.5, 0.5)));
        assert_eq!(region.width(), 40);
        assert_eq!(region.height(), 20);
        // Top-left pixel of the crop is pixel (10, 10) of the frame
        assert_eq!(&region.data()[0..3], &[30, 20, 20]);
    }

    #[test]
    fn test_face_region_clamps_spilling_box() {
        let frame = gradient_frame(100, 40);
        let region = face_region(&frame, Some(&face(0.75, -0.25, 0.5, 0.75)));
        assert_eq!(region.width(), 25);
        assert_eq!(region.height(), 20);
    }

    #[test]
    fn test_empty_box_falls_back_to_whole_frame() {
        let frame = gradient_frame(100, 50);
        let region = face_region(&frame, Some(&face(1.2, 1.2, 0.3, 0.3)));
        assert_eq!(region.width(), 100);
        assert_eq!(region.height(), 50);
    }

    #[test]
    fn test_missing_face_matches_full_frame_box() {
        let frame = gradient_frame(80, 60);
        let normalizer = RegionNormalizer::default();
        let without = normalizer.normalize(&frame, None);
        let full = normalizer.normalize(&frame, Some(&face(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(without, full);
    }

    #[test]
    fn test_uniform_ramp_passes_through_unchanged() {
        let ramp = uniform_ramp();
        let out = RegionNormalizer::default().normalize(&ramp, None);
        assert_eq!(out.to_frame().data(), ramp.data());
    }

    #[test]
    fn test_normalizing_twice_is_stable() {
        // Four warm stripes of 1024 pixels each
        let data = (0..64 * 64u32)
            .flat_map(|k| {
                let v = (40 + (k / 1024) * 40) as u8;
                [v, v / 2, v / 4]
            })
            .collect();
        let frame = Frame::new(data, 64, 64, 3, 0);

        let normalizer = RegionNormalizer::default();
        let once = normalizer.normalize(&frame, None);
        let twice = normalizer.normalize(&once.to_frame(), None);
        for (a, b) in once.tensor().iter().zip(twice.tensor().iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_blank_is_mid_gray() {
        let blank = NormalizedImage::blank(8);
        assert_eq!(blank.tensor().shape(), &[1, 8, 8, 3]);
        assert!(blank.tensor().iter().all(|&v| v == 0.5));
    }
}
