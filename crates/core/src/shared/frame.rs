use ndarray::ArrayView3;

/// A decoded camera frame: contiguous RGB bytes in row-major order.
///
/// Pixel-format conversion happens at the sensor boundary only; the
/// pipeline stages treat pixel data as opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
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
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
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

    /// Capture-order frame number, carried through the pipeline for logging.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Returns a copy rotated clockwise so the image is upright.
    ///
    /// Sensor orientation rarely matches display orientation; detection
    /// runs on the upright image so boxes come back in upright space.
    pub fn rotated(&self, rotation: Rotation) -> Frame {
        if rotation == Rotation::Deg0 {
            return self.clone();
        }

        let w = self.width as usize;
        let h = self.height as usize;
        let c = self.channels as usize;
        let (dst_w, dst_h) = match rotation {
            Rotation::Deg90 | Rotation::Deg270 => (h, w),
            _ => (w, h),
        };

        let mut data = vec![0u8; self.data.len()];
        for y in 0..dst_h {
            for x in 0..dst_w {
                let (sy, sx) = match rotation {
                    Rotation::Deg90 => (h - 1 - x, y),
                    Rotation::Deg180 => (h - 1 - y, w - 1 - x),
                    Rotation::Deg270 => (x, w - 1 - y),
                    Rotation::Deg0 => unreachable!(),
                };
                let src = (sy * w + sx) * c;
                let dst = (y * dst_w + x) * c;
                data[dst..dst + c].copy_from_slice(&self.data[src..src + c]);
            }
        }

        Frame::new(data, dst_w as u32, dst_h as u32, self.channels, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

/// Clockwise rotation needed to bring a sensor frame upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parses rotation metadata in degrees; non-quarter turns are rejected.
    pub fn from_degrees(degrees: i32) -> Option<Rotation> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}
