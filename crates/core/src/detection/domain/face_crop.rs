use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::rect::BoundingBox;

#[derive(Error, Debug)]
#[error(
    "bounding box {x},{y} {width}x{height} is degenerate after clamping to {frame_width}x{frame_height}"
)]
pub struct CropError {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Extracts the pixels inside `bbox` into a new buffer at local origin.
///
/// Boxes partially outside the frame are clamped; a box that clamps to
/// nothing yields a [`CropError`] and the face is dropped upstream.
pub fn crop_face(frame: &Frame, bbox: &BoundingBox) -> Result<Frame, CropError> {
    let clamped = bbox
        .clamped_to(frame.width(), frame.height())
        .ok_or(CropError {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            frame_width: frame.width(),
            frame_height: frame.height(),
        })?;

    let channels = frame.channels() as usize;
    let src_row_len = frame.width() as usize * channels;
    let (x, y) = (clamped.x as usize, clamped.y as usize);
    let (w, h) = (clamped.width as usize, clamped.height as usize);

    let mut data = Vec::with_capacity(w * h * channels);
    for row in y..y + h {
        let start = row * src_row_len + x * channels;
        data.extend_from_slice(&frame.data()[start..start + w * channels]);
    }

    Ok(Frame::new(
        data,
        clamped.width as u32,
        clamped.height as u32,
        frame.channels(),
        frame.index(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// 8x8 frame where pixel (x, y) is (x, y, 0).
    fn coordinate_frame() -> Frame {
        let mut data = Vec::with_capacity(8 * 8 * 3);
        for y in 0..8u8 {
            for x in 0..8u8 {
                data.extend_from_slice(&[x, y, 0]);
            }
        }
        Frame::new(data, 8, 8, 3, 1)
    }

    #[test]
    fn test_interior_box_crops_exact_dimensions() {
        let frame = coordinate_frame();
        let crop = crop_face(&frame, &BoundingBox::new(2, 3, 4, 2)).unwrap();
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 2);
        // Top-left of the crop is source pixel (2, 3)
        assert_eq!(&crop.data()[..3], &[2, 3, 0]);
        assert_eq!(crop.index(), frame.index());
    }

    #[test]
    fn test_crop_translates_to_local_origin() {
        let frame = coordinate_frame();
        let crop = crop_face(&frame, &BoundingBox::new(5, 5, 3, 3)).unwrap();
        // Bottom-right of crop is source pixel (7, 7)
        let last = crop.data().len() - 3;
        assert_eq!(&crop.data()[last..], &[7, 7, 0]);
    }

    #[test]
    fn test_overhanging_box_is_clamped() {
        let frame = coordinate_frame();
        let crop = crop_face(&frame, &BoundingBox::new(6, -2, 5, 5)).unwrap();
        assert_eq!(crop.width(), 2); // 6..8
        assert_eq!(crop.height(), 3); // 0..3
        assert_eq!(&crop.data()[..3], &[6, 0, 0]);
    }

    #[rstest]
    #[case::fully_outside(BoundingBox::new(20, 20, 4, 4))]
    #[case::zero_area(BoundingBox::new(2, 2, 0, 4))]
    #[case::negative_size(BoundingBox::new(2, 2, -1, 4))]
    fn test_degenerate_box_is_an_error(#[case] bbox: BoundingBox) {
        let frame = coordinate_frame();
        assert!(crop_face(&frame, &bbox).is_err());
    }

    #[test]
    fn test_full_frame_crop_is_identity() {
        let frame = coordinate_frame();
        let crop = crop_face(&frame, &BoundingBox::new(0, 0, 8, 8)).unwrap();
        assert_eq!(crop.data(), frame.data());
    }
}
