use ndarray::{Array2, ArrayView3};

/// One captured camera frame: contiguous RGB bytes in row-major order.
///
/// `sequence` is the number the video source assigned when it produced the
/// frame; it only increases for a given source.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
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
            sequence,
        }
    }

    /// Builds an RGB frame from an `image` buffer.
    pub fn from_rgb_image(image: image::RgbImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, sequence)
    }

    /// Same pixels, renumbered.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
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

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Crops `[x1, y1, x2, y2)` (clamped to the frame) and resamples it to a
    /// `size` x `size` grayscale patch with nearest-neighbor lookup.
    ///
    /// Luma uses the ITU-R BT.601 weights. Returns `None` when the clamped
    /// box is empty.
    pub fn gray_patch(&self, bbox: [f64; 4], size: usize) -> Option<Array2<f32>> {
        let fw = self.width as f64;
        let fh = self.height as f64;
        let x1 = bbox[0].clamp(0.0, fw);
        let y1 = bbox[1].clamp(0.0, fh);
        let x2 = bbox[2].clamp(0.0, fw);
        let y2 = bbox[3].clamp(0.0, fh);
        if x2 - x1 < 1.0 || y2 - y1 < 1.0 || size == 0 {
            return None;
        }

        let src = self.as_ndarray();
        let max_x = self.width as usize - 1;
        let max_y = self.height as usize - 1;
        let step_x = (x2 - x1) / size as f64;
        let step_y = (y2 - y1) / size as f64;

        let mut patch = Array2::<f32>::zeros((size, size));
        for row in 0..size {
            let sy = ((y1 + (row as f64 + 0.5) * step_y) as usize).min(max_y);
            for col in 0..size {
                let sx = ((x1 + (col as f64 + 0.5) * step_x) as usize).min(max_x);
                patch[[row, col]] = if self.channels >= 3 {
                    0.299 * src[[sy, sx, 0]] as f32
                        + 0.587 * src[[sy, sx, 1]] as f32
                        + 0.114 * src[[sy, sx, 2]] as f32
                } else {
                    src[[sy, sx, 0]] as f32
                };
            }
        }
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.sequence(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_from_rgb_image_keeps_dimensions() {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3]));
        let frame = Frame::from_rgb_image(img, 9);
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(frame.sequence(), 9);
        assert_eq!(frame.as_ndarray()[[2, 3, 2]], 3);
    }

    #[test]
    fn test_with_sequence_renumbers_only() {
        let frame = solid(2, 2, [7, 8, 9]).with_sequence(42);
        assert_eq!(frame.sequence(), 42);
        assert_eq!(&frame.data()[..3], &[7, 8, 9]);
    }

    #[test]
    fn test_gray_patch_of_white_frame_is_white() {
        let frame = solid(10, 10, [255, 255, 255]);
        let patch = frame.gray_patch([0.0, 0.0, 10.0, 10.0], 4).unwrap();
        assert_eq!(patch.shape(), &[4, 4]);
        for v in patch.iter() {
            assert_relative_eq!(*v, 255.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_gray_patch_uses_luma_weights() {
        let frame = solid(4, 4, [255, 0, 0]);
        let patch = frame.gray_patch([0.0, 0.0, 4.0, 4.0], 2).unwrap();
        assert_relative_eq!(patch[[0, 0]], 0.299 * 255.0, epsilon = 1e-3);
    }

    #[test]
    fn test_gray_patch_clamps_box_to_frame() {
        let frame = solid(8, 8, [10, 10, 10]);
        let patch = frame.gray_patch([-20.0, -20.0, 100.0, 100.0], 3).unwrap();
        assert_eq!(patch.shape(), &[3, 3]);
    }

    #[test]
    fn test_gray_patch_empty_box_is_none() {
        let frame = solid(8, 8, [10, 10, 10]);
        assert!(frame.gray_patch([5.0, 5.0, 5.0, 9.0], 4).is_none());
        assert!(frame.gray_patch([20.0, 20.0, 30.0, 30.0], 4).is_none());
    }
}
