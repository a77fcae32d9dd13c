use crate::imaging::grayscale::luma;
use crate::shared::constants::{ANNOTATION_COLOR, ANNOTATION_THICKNESS};
use crate::shared::frame::Frame;
use crate::shared::rectangle::Rectangle;

/// Draws detection outlines onto preview frames.
///
/// Outlines run from the top-left corner `(x, y)` to the bottom-right
/// corner `(x + w, y + h)` with the stroke centred on those edges, clipped
/// to the frame. Overlapping outlines simply overdraw.
#[derive(Clone, Debug)]
pub struct FrameAnnotator {
    color: [u8; 3],
    thickness: u32,
}

impl FrameAnnotator {
    pub fn new(color: [u8; 3], thickness: u32) -> Self {
        Self {
            color,
            thickness: thickness.max(1),
        }
    }

    pub fn annotate(&self, mut frame: Frame, faces: &[Rectangle]) -> Frame {
        for face in faces {
            self.draw_outline(&mut frame, face);
        }
        frame
    }

    fn draw_outline(&self, frame: &mut Frame, r: &Rectangle) {
        let half = (self.thickness / 2) as i64;
        let extra = (self.thickness as i64 - 1) - half;
        let (x1, y1) = (r.x as i64, r.y as i64);
        let (x2, y2) = (r.right() as i64, r.bottom() as i64);

        // top, bottom, left, right bands
        self.fill(frame, x1 - half, y1 - half, x2 + extra, y1 + extra);
        self.fill(frame, x1 - half, y2 - half, x2 + extra, y2 + extra);
        self.fill(frame, x1 - half, y1 - half, x1 + extra, y2 + extra);
        self.fill(frame, x2 - half, y1 - half, x2 + extra, y2 + extra);
    }

    /// Fills the inclusive box `[x0, x1] × [y0, y1]`, clipped to the frame.
    fn fill(&self, frame: &mut Frame, x0: i64, y0: i64, x1: i64, y1: i64) {
        let fw = frame.width() as i64;
        let fh = frame.height() as i64;
        let x0 = x0.max(0);
        let y0 = y0.max(0);
        let x1 = x1.min(fw - 1);
        let y1 = y1.min(fh - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }

        let channels = frame.channels() as usize;
        let gray = luma(self.color[0], self.color[1], self.color[2]);
        let stride = fw as usize * channels;
        let data = frame.data_mut();
        for y in y0 as usize..=y1 as usize {
            for x in x0 as usize..=x1 as usize {
                let offset = y * stride + x * channels;
                if channels >= 3 {
                    data[offset..offset + 3].copy_from_slice(&self.color);
                } else {
                    data[offset] = gray;
                }
            }
        }
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(ANNOTATION_COLOR, ANNOTATION_THICKNESS)
    }
}
