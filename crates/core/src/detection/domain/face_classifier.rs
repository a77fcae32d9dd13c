use crate::shared::frame::Frame;
use crate::shared::rectangle::Rectangle;

/// Pretrained multiscale face classifier, loaded once at startup.
///
/// `min_size` discards candidates smaller than that many pixels on either
/// side. `min_neighbors` is the number of overlapping raw candidates a
/// detection needs to be kept (0 = no grouping). Implementations accept
/// one- and three-channel frames and may be stateful, hence `&mut self`.
pub trait FaceClassifier: Send {
    fn detect_multi_scale(
        &mut self,
        image: &Frame,
        min_size: u32,
        min_neighbors: u32,
    ) -> Result<Vec<Rectangle>, Box<dyn std::error::Error>>;
}
