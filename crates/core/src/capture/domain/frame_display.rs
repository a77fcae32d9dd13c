use std::thread;

use crossbeam_channel::Receiver;

use crate::shared::frame::Frame;

/// Rendering surface for annotated preview frames.
///
/// Always driven from the rendering thread returned by [`spawn_display`];
/// the capture side never calls it directly.
pub trait FrameDisplay: Send {
    fn display(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}

/// Starts the rendering thread. It drains `frames` until every sender is
/// dropped, then returns the display.
pub fn spawn_display(
    frames: Receiver<Frame>,
    mut display: Box<dyn FrameDisplay>,
) -> thread::JoinHandle<Box<dyn FrameDisplay>> {
    thread::spawn(move || {
        for frame in frames {
            if let Err(e) = display.display(&frame) {
                log::warn!("Failed to display frame {}: {e}", frame.index());
            }
        }
        display
    })
}
