//! Brightness equalization on the HSV value channel.

use crate::shared::frame::Frame;

/// Lookup table for histogram equalization of 8-bit values.
///
/// The lowest occupied bin maps to 0 and the rest follow the cumulative
/// histogram scaled to 255. A single-valued histogram gives the identity.
pub fn equalization_lut(hist: &[u32; 256]) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = i as u8;
    }

    let total: u64 = hist.iter().map(|&c| c as u64).sum();
    let Some(first) = hist.iter().position(|&c| c > 0) else {
        return lut;
    };
    if hist[first] as u64 == total {
        return lut;
    }

    let scale = 255.0 / (total - hist[first] as u64) as f64;
    let mut sum: u64 = 0;
    lut[first] = 0;
    for j in first + 1..256 {
        sum += hist[j] as u64;
        lut[j] = (sum as f64 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Equalizes the value (brightness) channel of an RGB frame in place.
///
/// In HSV, changing V with H and S fixed scales all three RGB channels by
/// `v' / v`, so the conversion round-trip reduces to that scaling. Hue and
/// saturation are untouched.
pub fn equalize_value_channel(frame: &mut Frame) {
    let channels = frame.channels() as usize;
    if channels < 3 {
        return;
    }

    let mut hist = [0u32; 256];
    for px in frame.data().chunks_exact(channels) {
        hist[value_of(px) as usize] += 1;
    }
    let lut = equalization_lut(&hist);

    for px in frame.data_mut().chunks_exact_mut(channels) {
        let v = value_of(px);
        let target = lut[v as usize];
        if v == 0 {
            px[..3].fill(target);
            continue;
        }
        if target == v {
            continue;
        }
        for c in &mut px[..3] {
            *c = (*c as f32 * target as f32 / v as f32).round().min(255.0) as u8;
        }
    }
}

fn value_of(px: &[u8]) -> u8 {
    px[0].max(px[1]).max(px[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from_pixels(pixels: &[[u8; 3]], width: u32) -> Frame {
        let height = pixels.len() as u32 / width;
        Frame::new(pixels.concat(), width, height, 3, 0)
    }

    #[test]
    fn test_lut_constant_histogram_is_identity() {
        let mut hist = [0u32; 256];
        hist[100] = 50;
        let lut = equalization_lut(&hist);
        assert_eq!(lut[100], 100);
    }

    #[test]
    fn test_lut_empty_histogram_is_identity() {
        let lut = equalization_lut(&[0u32; 256]);
        assert_eq!(lut[42], 42);
    }

    #[test]
    fn test_lut_two_levels_stretch_to_full_range() {
        let mut hist = [0u32; 256];
        hist[100] = 10;
        hist[120] = 10;
        let lut = equalization_lut(&hist);
        assert_eq!(lut[100], 0);
        assert_eq!(lut[120], 255);
    }

    #[test]
    fn test_lut_uniform_histogram_is_identity() {
        let hist = [16u32; 256];
        let lut = equalization_lut(&hist);
        for (i, &v) in lut.iter().enumerate() {
            assert_eq!(v as usize, i);
        }
    }

    #[test]
    fn test_lut_is_monotonic() {
        let mut hist = [0u32; 256];
        for (i, h) in hist.iter_mut().enumerate() {
            *h = ((i * 7919) % 13) as u32;
        }
        let lut = equalization_lut(&hist);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_equalize_preserves_hue_ratio() {
        // Dim orange and bright orange: same hue and saturation
        let mut frame = frame_from_pixels(&[[100, 50, 0], [200, 100, 0]], 2);
        equalize_value_channel(&mut frame);
        let px = frame.data();
        // Dim pixel becomes black, bright pixel is pushed to full value
        assert_eq!(&px[0..3], &[0, 0, 0]);
        assert_eq!(&px[3..6], &[255, 128, 0]);
    }

    #[test]
    fn test_equalize_gray_stays_gray() {
        let mut frame = frame_from_pixels(&[[10, 10, 10], [20, 20, 20], [30, 30, 30]], 3);
        equalize_value_channel(&mut frame);
        for px in frame.data().chunks(3) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }

    #[test]
    fn test_equalize_twice_is_stable() {
        let mut pixels = Vec::new();
        for i in 0..64u32 {
            let v = (i * i / 20) as u8;
            pixels.push([v, v / 2, v / 3]);
        }
        let mut frame = frame_from_pixels(&pixels, 8);
        equalize_value_channel(&mut frame);
        let once = frame.data().to_vec();
        equalize_value_channel(&mut frame);
        assert_eq!(frame.data(), &once[..]);
    }
}
