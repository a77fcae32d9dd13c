use ndarray::{ArrayView3, ArrayViewMut3};

/// A single camera frame: contiguous pixel bytes in row-major order.
///
/// Three-channel frames are RGB, single-channel frames are grayscale.
/// Format conversion happens at the capture and encode boundaries; the
/// domain layer only cares about the shape.
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

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
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

    /// Capture sequence number assigned by the camera.
    pub fn index(&self) -> usize {
        self.index
    }

    /// True when the frame holds no pixels (a camera returned nothing usable).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Converts into an `image` buffer for encoding. `None` for unsupported
    /// channel counts.
    pub fn to_image(&self) -> Option<image::DynamicImage> {
        match self.channels {
            1 => image::GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(image::DynamicImage::ImageLuma8),
            3 => image::RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(image::DynamicImage::ImageRgb8),
            _ => None,
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_zero_sized_frame_is_empty() {
        let frame = Frame::new(Vec::new(), 0, 0, 3, 0);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let data = vec![100u8; 12];
        let frame = Frame::new(data, 2, 2, 3, 0);
        let mut cloned = frame.clone();
        cloned.data_mut()[0] = 0;
        assert_eq!(frame.data()[0], 100);
        assert_eq!(cloned.data()[0], 0);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        let data = vec![0u8; 10];
        Frame::new(data, 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape_is_height_width_channels() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 3, 0);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]);
    }

    #[test]
    fn test_as_ndarray_mut_modification() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        frame.as_ndarray_mut()[[0, 1, 2]] = 128;
        assert_eq!(frame.as_ndarray()[[0, 1, 2]], 128);
    }

    #[test]
    fn test_to_image_rgb_and_gray() {
        let rgb = Frame::new(vec![7u8; 12], 2, 2, 3, 0);
        let img = rgb.to_image().unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.color(), image::ColorType::Rgb8);

        let gray = Frame::new(vec![7u8; 4], 2, 2, 1, 0);
        assert_eq!(gray.to_image().unwrap().color(), image::ColorType::L8);
    }

    #[test]
    fn test_to_image_rejects_unknown_channel_count() {
        let rgba = Frame::new(vec![0u8; 16], 2, 2, 4, 0);
        assert!(rgba.to_image().is_none());
    }
}
