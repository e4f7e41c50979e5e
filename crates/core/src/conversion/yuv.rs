use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

use crate::conversion::sensor_frame::{Plane, SensorFrame};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("frame has zero dimension ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("{plane} plane holds {actual} bytes, needs at least {required} for {width}x{height}")]
    PlaneTooSmall {
        plane: &'static str,
        required: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
    #[error("{plane} plane has zero pixel stride")]
    ZeroPixelStride { plane: &'static str },
    #[error("jpeg encode failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error("jpeg decode failed: {0}")]
    Decode(#[source] image::ImageError),
}

/// Converts a raw 4:2:0 sensor frame into an encoded JPEG buffer.
///
/// Tolerates row padding (`row_stride` > width) and both planar and
/// interleaved chroma layouts via the chroma planes' `pixel_stride`.
pub fn encode_jpeg(frame: &SensorFrame, quality: u8) -> Result<Vec<u8>, FormatError> {
    let rgb = planes_to_rgb(frame)?;

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(FormatError::Encode)?;
    Ok(out)
}

/// Decodes an encoded image buffer back into a pixel-addressable frame.
pub fn decode_jpeg(bytes: &[u8], index: usize) -> Result<Frame, FormatError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(FormatError::Decode)?
        .to_rgb8();
    let (width, height) = decoded.dimensions();
    Ok(Frame::new(decoded.into_raw(), width, height, 3, index))
}

/// Full converter stage: sensor planes in, decoded RGB frame out.
pub fn convert(frame: &SensorFrame, quality: u8) -> Result<Frame, FormatError> {
    let encoded = encode_jpeg(frame, quality)?;
    decode_jpeg(&encoded, frame.index)
}

fn planes_to_rgb(frame: &SensorFrame) -> Result<Vec<u8>, FormatError> {
    let w = frame.width as usize;
    let h = frame.height as usize;
    if w == 0 || h == 0 {
        return Err(FormatError::ZeroDimensions {
            width: frame.width,
            height: frame.height,
        });
    }

    validate_plane("luma", &frame.y, w, h, frame.width, frame.height)?;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    validate_plane("u", &frame.u, cw, ch, frame.width, frame.height)?;
    validate_plane("v", &frame.v, cw, ch, frame.width, frame.height)?;

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        for col in 0..w {
            let y = frame.y.data[row * frame.y.row_stride + col * frame.y.pixel_stride] as f32;
            let u = chroma_sample(&frame.u, row, col) as f32 - 128.0;
            let v = chroma_sample(&frame.v, row, col) as f32 - 128.0;

            // BT.601 full range
            let r = y + 1.402 * v;
            let g = y - 0.344_136 * u - 0.714_136 * v;
            let b = y + 1.772 * u;
            rgb.push(r.round().clamp(0.0, 255.0) as u8);
            rgb.push(g.round().clamp(0.0, 255.0) as u8);
            rgb.push(b.round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

fn chroma_sample(plane: &Plane, row: usize, col: usize) -> u8 {
    plane.data[(row / 2) * plane.row_stride + (col / 2) * plane.pixel_stride]
}

fn validate_plane(
    name: &'static str,
    plane: &Plane,
    cols: usize,
    rows: usize,
    width: u32,
    height: u32,
) -> Result<(), FormatError> {
    if plane.pixel_stride == 0 {
        return Err(FormatError::ZeroPixelStride { plane: name });
    }
    // Last addressable sample; trailing row padding is not required.
    let required = plane.row_stride * (rows - 1) + plane.pixel_stride * (cols - 1) + 1;
    if plane.data.len() < required {
        return Err(FormatError::PlaneTooSmall {
            plane: name,
            required,
            actual: plane.data.len(),
            width,
            height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::Rotation;
    use rstest::rstest;

    fn solid_sensor(r: u8, g: u8, b: u8, w: u32, h: u32) -> SensorFrame {
        let data: Vec<u8> = (0..w * h).flat_map(|_| [r, g, b]).collect();
        SensorFrame::from_rgb(&Frame::new(data, w, h, 3, 3), Rotation::Deg0)
    }

    #[test]
    fn test_convert_round_trip_dimensions() {
        let frame = convert(&solid_sensor(200, 60, 90, 32, 24), 100).unwrap();
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 24);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 3);
    }

    #[test]
    fn test_convert_round_trip_color_close() {
        let frame = convert(&solid_sensor(200, 60, 90, 32, 32), 100).unwrap();
        let center = ((16 * 32 + 16) * 3) as usize;
        let px = &frame.data()[center..center + 3];
        assert!((px[0] as i32 - 200).abs() < 16, "r drifted: {}", px[0]);
        assert!((px[1] as i32 - 60).abs() < 16, "g drifted: {}", px[1]);
        assert!((px[2] as i32 - 90).abs() < 16, "b drifted: {}", px[2]);
    }

    #[test]
    fn test_padded_rows_are_tolerated() {
        // Rebuild the luma plane with 4 bytes of padding per row.
        let mut sensor = solid_sensor(128, 128, 128, 8, 8);
        let stride = 12;
        let mut padded = vec![0u8; stride * 8];
        for row in 0..8 {
            padded[row * stride..row * stride + 8]
                .copy_from_slice(&sensor.y.data[row * 8..row * 8 + 8]);
        }
        sensor.y = Plane::new(padded, stride, 1);

        let frame = convert(&sensor, 100).unwrap();
        assert_eq!(frame.width(), 8);
        // Padding bytes must not bleed into the image.
        assert!(frame.data().iter().all(|&px| (px as i32 - 128).abs() < 8));
    }

    #[test]
    fn test_interleaved_chroma_matches_planar() {
        // Semi-planar layout: U and V share an interleaved buffer with
        // pixel stride 2, as delivered by NV12-style sensors.
        let planar = solid_sensor(90, 160, 40, 8, 8);
        let mut interleaved = Vec::new();
        for i in 0..planar.u.data.len() {
            interleaved.push(planar.u.data[i]);
            interleaved.push(planar.v.data[i]);
        }
        let mut semi = planar.clone();
        semi.u = Plane::new(interleaved.clone(), 8, 2);
        semi.v = Plane::new(interleaved[1..].to_vec(), 8, 2);

        assert_eq!(
            planes_to_rgb(&planar).unwrap(),
            planes_to_rgb(&semi).unwrap()
        );
    }

    #[test]
    fn test_undersized_luma_plane_rejected() {
        let mut sensor = solid_sensor(0, 0, 0, 8, 8);
        sensor.y.data.truncate(40);
        match convert(&sensor, 100) {
            Err(FormatError::PlaneTooSmall { plane, .. }) => assert_eq!(plane, "luma"),
            other => panic!("expected PlaneTooSmall, got {other:?}"),
        }
    }

    #[test]
    fn test_undersized_chroma_plane_rejected() {
        let mut sensor = solid_sensor(0, 0, 0, 8, 8);
        sensor.v.data.truncate(2);
        assert!(matches!(
            convert(&sensor, 100),
            Err(FormatError::PlaneTooSmall { plane: "v", .. })
        ));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut sensor = solid_sensor(0, 0, 0, 8, 8);
        sensor.width = 0;
        assert!(matches!(
            convert(&sensor, 100),
            Err(FormatError::ZeroDimensions { .. })
        ));
    }

    #[rstest]
    #[case::preview_quality(50)]
    #[case::classify_quality(100)]
    fn test_quality_parameter_produces_decodable_output(#[case] quality: u8) {
        let encoded = encode_jpeg(&solid_sensor(10, 200, 10, 16, 16), quality).unwrap();
        let frame = decode_jpeg(&encoded, 0).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 16));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_jpeg(&[0xde, 0xad, 0xbe, 0xef], 0),
            Err(FormatError::Decode(_))
        ));
    }
}
