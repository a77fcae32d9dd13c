use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;

use crate::shared::constants::{REGION_FILE_EXTENSION, REGION_FILE_PREFIX};
use crate::shared::frame::Frame;
use crate::upload::domain::uploader::UploadError;

/// An extracted face written to disk for the duration of one upload.
///
/// The file is removed when the value is dropped, so it cannot outlive the
/// upload whether that succeeds, fails or unwinds.
pub struct RegionFile {
    file: NamedTempFile,
}

impl RegionFile {
    /// Encodes `region` as PNG into `dir` under a unique
    /// `temp_<millis>_<random>.png` name.
    pub fn write(dir: &Path, region: &Frame) -> Result<Self, UploadError> {
        let image = region.to_image().ok_or_else(|| {
            UploadError::Encode(
                format!("unsupported channel count {}", region.channels()).into(),
            )
        })?;
        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, image::ImageFormat::Png)
            .map_err(|e| UploadError::Encode(Box::new(e)))?;

        fs::create_dir_all(dir)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{REGION_FILE_PREFIX}{millis}_"))
            .suffix(&format!(".{REGION_FILE_EXTENSION}"))
            .tempfile_in(dir)?;
        file.write_all(encoded.get_ref())?;
        file.flush()?;

        log::debug!(
            "Wrote {}x{} region to {}",
            region.width(),
            region.height(),
            file.path().display()
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, UploadError> {
        Ok(fs::read(self.path())?)
    }

    /// Removes the file now, logging instead of failing if that goes wrong.
    pub fn delete(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.file.close() {
            log::warn!("Failed to delete region file {}: {e}", path.display());
        }
    }
}
