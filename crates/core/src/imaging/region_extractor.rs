use ndarray::s;
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::rectangle::Rectangle;

#[derive(Error, Debug, PartialEq)]
pub enum RegionError {
    #[error("region {rect:?} is outside the {frame_width}x{frame_height} frame")]
    OutOfBounds {
        rect: Rectangle,
        frame_width: u32,
        frame_height: u32,
    },
}

/// Crops detected regions out of a source frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegionExtractor;

impl RegionExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Copies the pixels bounded exactly by `rect` into a new frame.
    ///
    /// The rectangle must be non-empty and lie inside the frame; detectors
    /// guarantee this, so a violation is reported rather than clamped.
    pub fn extract(&self, frame: &Frame, rect: &Rectangle) -> Result<Frame, RegionError> {
        if !rect.fits_within(frame.width(), frame.height()) {
            return Err(RegionError::OutOfBounds {
                rect: *rect,
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }

        let view = frame.as_ndarray();
        let (x, y) = (rect.x as usize, rect.y as usize);
        let (w, h) = (rect.width as usize, rect.height as usize);
        let data: Vec<u8> = view.slice(s![y..y + h, x..x + w, ..]).iter().copied().collect();

        Ok(Frame::new(
            data,
            rect.width,
            rect.height,
            frame.channels(),
            frame.index(),
        ))
    }
}
