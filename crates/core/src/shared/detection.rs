/// A located face, expressed as fractions of the frame dimensions.
///
/// `x`/`y` is the top-left corner. Backends may report boxes that spill over
/// the frame edge; [`Detection::clamped`] pulls them back into `[0,1]×[0,1]`
/// and every consumer works on the clamped form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

/// Integer pixel rectangle guaranteed to lie inside its frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Detection {
    /// Builds a detection from pixel corners `(x1, y1)`–`(x2, y2)`.
    pub fn from_corners(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        frame_width: u32,
        frame_height: u32,
        confidence: f64,
    ) -> Self {
        let fw = frame_width.max(1) as f64;
        let fh = frame_height.max(1) as f64;
        Self {
            x: x1 / fw,
            y: y1 / fh,
            width: (x2 - x1) / fw,
            height: (y2 - y1) / fh,
            confidence,
        }
        .clamped()
    }

    /// Intersects the box with the unit square.
    ///
    /// Non-finite coordinates collapse to an empty box at the origin.
    pub fn clamped(&self) -> Self {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        let x1 = finite(self.x).clamp(0.0, 1.0);
        let y1 = finite(self.y).clamp(0.0, 1.0);
        let x2 = finite(self.x + self.width).clamp(0.0, 1.0).max(x1);
        let y2 = finite(self.y + self.height).clamp(0.0, 1.0).max(y1);
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: self.confidence,
        }
    }

    /// Pixel-space box of the clamped detection.
    ///
    /// Returns `None` when the box covers no whole pixel.
    pub fn to_pixel_rect(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let d = self.clamped();
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let x1 = ((d.x * fw) as u32).min(frame_width);
        let y1 = ((d.y * fh) as u32).min(frame_height);
        let x2 = (((d.x + d.width) * fw) as u32).min(frame_width);
        let y2 = (((d.y + d.height) * fh) as u32).min(frame_height);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}
