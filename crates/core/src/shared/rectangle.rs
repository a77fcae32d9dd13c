/// An axis-aligned detection rectangle in frame pixel coordinates.
///
/// `(x, y)` is the top-left corner; the bottom-right corner `(right, bottom)`
/// is exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the rectangle is non-empty and lies fully inside a
    /// `frame_width × frame_height` frame.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        !self.is_empty()
            && (self.x as u64 + self.width as u64) <= frame_width as u64
            && (self.y as u64 + self.height as u64) <= frame_height as u64
    }

    /// Builds a rectangle from floating-point corners, clamped to the frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn from_corners_clamped(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let left = x1.min(x2).clamp(0.0, fw).round() as u32;
        let top = y1.min(y2).clamp(0.0, fh).round() as u32;
        let right = x1.max(x2).clamp(0.0, fw).round() as u32;
        let bottom = y1.max(y2).clamp(0.0, fh).round() as u32;
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self::new(left, top, right - left, bottom - top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_corners() {
        let r = Rectangle::new(50, 40, 100, 80);
        assert_eq!(r.right(), 150);
        assert_eq!(r.bottom(), 120);
    }

    #[rstest]
    #[case(Rectangle::new(0, 0, 10, 10), true)]
    #[case(Rectangle::new(90, 90, 10, 10), true)]
    #[case(Rectangle::new(91, 90, 10, 10), false)]
    #[case(Rectangle::new(0, 95, 10, 10), false)]
    #[case(Rectangle::new(5, 5, 0, 10), false)]
    fn test_fits_within_100x100(#[case] rect: Rectangle, #[case] expected: bool) {
        assert_eq!(rect.fits_within(100, 100), expected);
    }

    #[test]
    fn test_from_corners_clamps_to_frame() {
        let r = Rectangle::from_corners_clamped(-10.0, 20.0, 60.4, 250.0, 100, 200).unwrap();
        assert_eq!(r, Rectangle::new(0, 20, 60, 180));
    }

    #[test]
    fn test_from_corners_outside_frame_is_none() {
        assert!(Rectangle::from_corners_clamped(120.0, 0.0, 150.0, 10.0, 100, 100).is_none());
    }
}
