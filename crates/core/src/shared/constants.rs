pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Grab a frame every 33 ms (~30 frames/sec).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 33;

/// Fixed minimum face size in pixels; not scaled to the frame resolution.
pub const DEFAULT_MIN_FACE_SIZE: u32 = 240;

/// Neighbour threshold for the live preview (robustness over precision).
pub const PREVIEW_MIN_NEIGHBORS: u32 = 1;

/// Neighbour threshold for the save/check path (precision over robustness).
pub const UPLOAD_MIN_NEIGHBORS: u32 = 2;

/// Outline colour for preview rectangles (RGB).
pub const ANNOTATION_COLOR: [u8; 3] = [0, 255, 0];
pub const ANNOTATION_THICKNESS: u32 = 3;

/// Preview frames buffered between capture and display before dropping.
pub const PREVIEW_CHANNEL_CAPACITY: usize = 2;

/// Multipart field name the upload server expects.
pub const UPLOAD_FIELD_NAME: &str = "file";

pub const REGION_FILE_PREFIX: &str = "temp_";
pub const REGION_FILE_EXTENSION: &str = "png";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
