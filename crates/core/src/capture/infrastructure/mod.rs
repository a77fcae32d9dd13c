pub mod ffmpeg_camera;
pub mod image_sequence_camera;
pub mod snapshot_display;
