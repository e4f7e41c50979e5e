use crate::shared::frame::{Frame, Rotation};

/// One plane of a sensor frame.
///
/// `row_stride` may exceed the nominal row width (padding); `pixel_stride`
/// is the byte distance between horizontally adjacent samples, which is
/// 2 for interleaved (semi-planar) chroma and 1 for planar chroma.
#[derive(Clone, Debug)]
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }
}

/// A raw 4:2:0 sensor frame as delivered by the camera subsystem:
/// full-resolution luma plus half-resolution chroma planes, with
/// rotation metadata describing how far from upright the sensor sits.
#[derive(Clone, Debug)]
pub struct SensorFrame {
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub index: usize,
}

impl SensorFrame {
    /// Builds a planar (I420-layout) sensor frame from a decoded RGB frame.
    ///
    /// Used by hosts that feed the pipeline from stills, and by tests.
    /// Chroma is averaged over each 2x2 block (BT.601 full range).
    pub fn from_rgb(frame: &Frame, rotation: Rotation) -> SensorFrame {
        let w = frame.width() as usize;
        let h = frame.height() as usize;
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);
        let data = frame.data();

        let mut y_plane = vec![0u8; w * h];
        for row in 0..h {
            for col in 0..w {
                let p = (row * w + col) * 3;
                let (r, g, b) = (data[p] as f32, data[p + 1] as f32, data[p + 2] as f32);
                y_plane[row * w + col] = (0.299 * r + 0.587 * g + 0.114 * b)
                    .round()
                    .clamp(0.0, 255.0) as u8;
            }
        }

        let mut u_plane = vec![0u8; cw * ch];
        let mut v_plane = vec![0u8; cw * ch];
        for crow in 0..ch {
            for ccol in 0..cw {
                let (mut r_sum, mut g_sum, mut b_sum, mut n) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
                for dy in 0..2 {
                    for dx in 0..2 {
                        let row = crow * 2 + dy;
                        let col = ccol * 2 + dx;
                        if row < h && col < w {
                            let p = (row * w + col) * 3;
                            r_sum += data[p] as f32;
                            g_sum += data[p + 1] as f32;
                            b_sum += data[p + 2] as f32;
                            n += 1.0;
                        }
                    }
                }
                let (r, g, b) = (r_sum / n, g_sum / n, b_sum / n);
                let u = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
                let v = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
                u_plane[crow * cw + ccol] = u.round().clamp(0.0, 255.0) as u8;
                v_plane[crow * cw + ccol] = v.round().clamp(0.0, 255.0) as u8;
            }
        }

        SensorFrame {
            y: Plane::new(y_plane, w, 1),
            u: Plane::new(u_plane, cw, 1),
            v: Plane::new(v_plane, cw, 1),
            width: frame.width(),
            height: frame.height(),
            rotation,
            index: frame.index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(r: u8, g: u8, b: u8, w: u32, h: u32) -> Frame {
        let data: Vec<u8> = (0..w * h).flat_map(|_| [r, g, b]).collect();
        Frame::new(data, w, h, 3, 0)
    }

    #[test]
    fn test_from_rgb_plane_dimensions() {
        let sensor = SensorFrame::from_rgb(&solid_frame(10, 20, 30, 6, 4), Rotation::Deg0);
        assert_eq!(sensor.y.data.len(), 24);
        assert_eq!(sensor.u.data.len(), 6); // 3x2 chroma
        assert_eq!(sensor.v.data.len(), 6);
        assert_eq!(sensor.y.row_stride, 6);
        assert_eq!(sensor.u.row_stride, 3);
    }

    #[test]
    fn test_from_rgb_odd_dimensions_round_chroma_up() {
        let sensor = SensorFrame::from_rgb(&solid_frame(0, 0, 0, 5, 3), Rotation::Deg0);
        assert_eq!(sensor.u.data.len(), 3 * 2);
    }

    #[test]
    fn test_from_rgb_grey_is_neutral_chroma() {
        let sensor = SensorFrame::from_rgb(&solid_frame(128, 128, 128, 4, 4), Rotation::Deg0);
        assert!(sensor.y.data.iter().all(|&y| y == 128));
        assert!(sensor.u.data.iter().all(|&u| u == 128));
        assert!(sensor.v.data.iter().all(|&v| v == 128));
    }

    #[test]
    fn test_from_rgb_red_has_high_v() {
        let sensor = SensorFrame::from_rgb(&solid_frame(255, 0, 0, 4, 4), Rotation::Deg0);
        assert!(sensor.v.data[0] > 200);
        assert!(sensor.u.data[0] < 128);
    }
}
