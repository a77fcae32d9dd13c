use std::path::{Path, PathBuf};

use crate::capture::domain::camera::Camera;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Replays the still images of a directory as if they came from a camera.
///
/// Files are read in name order. With `looping` the sequence restarts after
/// the last image; otherwise further reads return `Ok(None)`.
pub struct ImageSequenceCamera {
    dir: PathBuf,
    looping: bool,
    files: Vec<PathBuf>,
    position: usize,
    next_index: usize,
    opened: bool,
}

impl ImageSequenceCamera {
    pub fn new(dir: impl Into<PathBuf>, looping: bool) -> Self {
        Self {
            dir: dir.into(),
            looping,
            files: Vec::new(),
            position: 0,
            next_index: 0,
            opened: false,
        }
    }
}

impl Camera for ImageSequenceCamera {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.opened {
            return Ok(());
        }
        let files = list_images(&self.dir)?;
        if files.is_empty() {
            return Err(format!("No images found in {}", self.dir.display()).into());
        }
        log::info!(
            "Image sequence {} opened ({} images)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if !self.opened {
            return Err("ImageSequenceCamera: not opened".into());
        }
        if self.position >= self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }

        let path = &self.files[self.position];
        self.position += 1;

        let img = image::open(path)?.to_rgb8();
        let (w, h) = img.dimensions();
        let frame = Frame::new(img.into_raw(), w, h, 3, self.next_index);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.opened = false;
        self.files.clear();
        self.position = 0;
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
