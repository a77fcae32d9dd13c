use crate::shared::frame::Frame;

/// Converts an RGB frame to single-channel luma (ITU-R BT.601 weights).
///
/// Grayscale frames are returned as a copy.
pub fn to_grayscale(frame: &Frame) -> Frame {
    let channels = frame.channels() as usize;
    if channels == 1 {
        return frame.clone();
    }

    let gray: Vec<u8> = frame
        .data()
        .chunks_exact(channels)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect();
    Frame::new(gray, frame.width(), frame.height(), 1, frame.index())
}

pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Histogram equalisation of a single-channel frame, in place.
///
/// Spreads the cumulative histogram over the full 0..=255 range. A constant
/// image is left untouched.
pub fn equalize_histogram(frame: &mut Frame) {
    debug_assert_eq!(frame.channels(), 1, "histogram equalisation needs grayscale");

    let mut hist = [0usize; 256];
    for &v in frame.data() {
        hist[v as usize] += 1;
    }

    let total = frame.data().len();
    let Some(first) = hist.iter().position(|&count| count > 0) else {
        return;
    };
    if hist[first] == total {
        return;
    }

    let cdf_min = hist[first];
    let scale = 255.0 / (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0usize;
    for (value, &count) in hist.iter().enumerate() {
        cumulative += count;
        if value < first {
            continue;
        }
        lut[value] = ((cumulative - cdf_min) as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }

    for v in frame.data_mut() {
        *v = lut[*v as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale_weights() {
        let frame = Frame::new(vec![255, 0, 0, 0, 255, 0, 0, 0, 255], 3, 1, 3, 4);
        let gray = to_grayscale(&frame);
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.index(), 4);
        assert_eq!(gray.data(), &[76, 150, 29]);
    }

    #[test]
    fn test_grayscale_of_gray_is_copy() {
        let frame = Frame::new(vec![1, 2, 3, 4], 2, 2, 1, 0);
        assert_eq!(to_grayscale(&frame), frame);
    }

    #[test]
    fn test_equalize_stretches_to_full_range() {
        let mut frame = Frame::new(vec![100, 100, 110, 120], 4, 1, 1, 0);
        equalize_histogram(&mut frame);
        let data = frame.data();
        assert_eq!(data[0], 0);
        assert_eq!(data[3], 255);
        assert!(data[2] > data[0] && data[2] < data[3]);
    }

    #[test]
    fn test_equalize_constant_image_unchanged() {
        let mut frame = Frame::new(vec![77; 9], 3, 3, 1, 0);
        equalize_histogram(&mut frame);
        assert!(frame.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_equalize_preserves_order() {
        let mut frame = Frame::new(vec![10, 50, 50, 200, 30, 10], 6, 1, 1, 0);
        equalize_histogram(&mut frame);
        let d = frame.data();
        assert!(d[0] < d[4]);
        assert!(d[4] < d[1]);
        assert_eq!(d[1], d[2]);
        assert!(d[2] < d[3]);
        assert_eq!(d[0], d[5]);
    }
}
