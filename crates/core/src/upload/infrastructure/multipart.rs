//! Hand-built `multipart/form-data` bodies with a single file part.

use rand::distr::Alphanumeric;
use rand::Rng;

const BOUNDARY_MARKER: &str = "----FaceCheckBoundary";
const BOUNDARY_RANDOM_LEN: usize = 24;
const CRLF: &[u8] = b"\r\n";

/// One file field ready to be written as a request body.
#[derive(Debug, Clone)]
pub struct MultipartRequest<'a> {
    boundary: String,
    field_name: &'a str,
    file_name: String,
    content_type: &'static str,
    content: &'a [u8],
}

impl<'a> MultipartRequest<'a> {
    /// Picks a random boundary that does not occur in `content`.
    pub fn new(field_name: &'a str, file_name: &str, content: &'a [u8]) -> Self {
        Self::with_boundary_source(random_boundary, field_name, file_name, content)
    }

    /// Draws boundaries from `next` until one whose delimiter line is
    /// absent from `content`.
    pub fn with_boundary_source(
        mut next: impl FnMut() -> String,
        field_name: &'a str,
        file_name: &str,
        content: &'a [u8],
    ) -> Self {
        let mut boundary = next();
        while contains(content, format!("--{boundary}").as_bytes()) {
            log::debug!("Multipart boundary {boundary} occurs in content; drawing another");
            boundary = next();
        }
        Self::with_boundary(boundary, field_name, file_name, content)
    }

    pub fn with_boundary(
        boundary: String,
        field_name: &'a str,
        file_name: &str,
        content: &'a [u8],
    ) -> Self {
        Self {
            boundary,
            field_name,
            file_name: sanitize_file_name(file_name),
            content_type: guess_mime(file_name),
            content,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type_header(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let header = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file}\"\r\n\
             Content-Type: {mime}\r\n\
             \r\n",
            b = self.boundary,
            field = self.field_name,
            file = self.file_name,
            mime = self.content_type,
        );
        let trailer = format!("--{}--\r\n", self.boundary);

        let mut body =
            Vec::with_capacity(header.len() + self.content.len() + CRLF.len() + trailer.len());
        body.extend_from_slice(header.as_bytes());
        body.extend_from_slice(self.content);
        body.extend_from_slice(CRLF);
        body.extend_from_slice(trailer.as_bytes());
        body
    }
}

/// MIME type from the file extension, `application/octet-stream` if unknown.
pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn random_boundary() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{BOUNDARY_MARKER}{suffix}")
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .replace('"', "%22")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}
