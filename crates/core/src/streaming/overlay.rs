//! Drawing primitives for the live preview.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::shared::detection::{Detection, PixelRect};

pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
pub const BOX_THICKNESS: u32 = 2;
pub const NO_FACE_COLOR: [u8; 3] = [255, 0, 0];
pub const NO_FACE_TEXT: &str = "NO FACE DETECTED";
pub const NO_FACE_ORIGIN: (u32, u32) = (20, 40);

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;

/// Marks the face box, or writes the no-face notice when there is none.
pub fn annotate(img: &mut RgbImage, face: Option<&Detection>) {
    let rect = face.and_then(|d| d.to_pixel_rect(img.width(), img.height()));
    match rect {
        Some(rect) => draw_box(img, rect, BOX_THICKNESS, BOX_COLOR),
        None => {
            let scale = text_scale(img.width());
            // Baseline at the origin, like a typical text renderer.
            let top = NO_FACE_ORIGIN.1.saturating_sub(GLYPH_HEIGHT * scale);
            draw_text(img, NO_FACE_ORIGIN.0, top, NO_FACE_TEXT, scale, NO_FACE_COLOR);
        }
    }
}

/// Glyph pixel size that keeps the notice legible on `width`-wide frames.
pub fn text_scale(width: u32) -> u32 {
    (width / 160).max(1)
}

/// Outlines `rect` with lines `thickness` pixels wide, drawn inward so the
/// outline never leaves the rectangle.
pub fn draw_box(img: &mut RgbImage, rect: PixelRect, thickness: u32, color: [u8; 3]) {
    for inset in 0..thickness.max(1) {
        let width = rect.width.saturating_sub(2 * inset);
        let height = rect.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let ring = Rect::at((rect.x + inset) as i32, (rect.y + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(img, ring, Rgb(color));
    }
}

/// Writes `text` with a 3×5 bitmap font. Lowercase is drawn as uppercase;
/// characters without a glyph leave a gap.
pub fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, scale: u32, color: [u8; 3]) {
    let advance = (GLYPH_WIDTH + 1) * scale;
    let mut cursor_x = x;
    for ch in text.chars() {
        draw_char(img, cursor_x, y, ch, scale, color);
        cursor_x = cursor_x.saturating_add(advance);
    }
}

fn draw_char(img: &mut RgbImage, x: u32, y: u32, ch: char, scale: u32, color: [u8; 3]) {
    let Some(bitmap) = glyph(ch) else {
        return;
    };
    for (row, bits) in bitmap.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + col * scale + dx;
                    let py = y + row as u32 * scale + dy;
                    if px < img.width() && py < img.height() {
                        img.put_pixel(px, py, Rgb(color));
                    }
                }
            }
        }
    }
}

fn glyph(ch: char) -> Option<[u8; 5]> {
    let bitmap = match ch.to_ascii_uppercase() {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => return None,
    };
    Some(bitmap)
}
