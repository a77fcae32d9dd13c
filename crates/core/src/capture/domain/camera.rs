use crate::shared::frame::Frame;

/// A live frame source (webcam, capture device, stream).
///
/// The capture scheduler is the only owner; it opens the camera on start
/// and releases it on stop, so implementations need not be thread-safe
/// beyond `Send`.
pub trait Camera: Send {
    /// Opens the underlying device. Opening an already open camera is a no-op.
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    fn is_opened(&self) -> bool;

    /// Reads the next frame. `Ok(None)` means the device produced nothing
    /// this time (empty grab) and is not an error.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the device. Safe to call when already released.
    fn release(&mut self);
}
