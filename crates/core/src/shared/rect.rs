/// A face bounding box in frame pixel coordinates.
///
/// Detector-reported boxes can extend past the sensor frame edge, so
/// coordinates are signed and consumers clamp before cropping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersects the box with `frame_width` x `frame_height`.
    ///
    /// Returns `None` when the clamped box is degenerate (non-positive
    /// width or height), including boxes entirely outside the frame.
    pub fn clamped_to(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.x.saturating_add(self.width).min(frame_width as i32);
        let y2 = self.y.saturating_add(self.height).min(frame_height as i32);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width as f64 * self.height as f64;
        let area_b = other.width as f64 * other.height as f64;
        inter / (area_a + area_b - inter)
    }
}
