use std::path::PathBuf;

use crate::capture::domain::frame_display::FrameDisplay;
use crate::shared::frame::Frame;

/// Headless preview surface: writes every `every_nth` frame to a PNG file,
/// overwriting the previous snapshot.
///
/// The file is written to a sibling `.part` path and renamed so viewers
/// never see a half-written image.
pub struct SnapshotDisplay {
    path: PathBuf,
    every_nth: usize,
    seen: usize,
}

impl SnapshotDisplay {
    pub fn new(path: impl Into<PathBuf>, every_nth: usize) -> Self {
        Self {
            path: path.into(),
            every_nth: every_nth.max(1),
            seen: 0,
        }
    }
}

impl FrameDisplay for SnapshotDisplay {
    fn display(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let due = self.seen % self.every_nth == 0;
        self.seen += 1;
        if !due {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let img = frame
            .to_image()
            .ok_or("Failed to create image from frame data")?;

        let temp_path = self.path.with_extension("part");
        img.save_with_format(&temp_path, image::ImageFormat::Png)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
