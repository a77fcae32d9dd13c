pub mod http_multipart_uploader;
pub mod multipart;
pub mod region_file;
