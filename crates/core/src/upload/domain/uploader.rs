use thiserror::Error;

use super::endpoint::UploadEndpoint;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to encode region image: {0}")]
    Encode(#[source] BoxError),
    #[error("region file error: {0}")]
    TempFile(#[from] std::io::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Sends one file to an endpoint and returns the response body as lines.
///
/// One call is one attempt. A failure never carries partial lines.
pub trait Uploader: Send + Sync {
    fn upload(
        &self,
        endpoint: &UploadEndpoint,
        file_bytes: &[u8],
        file_name: &str,
    ) -> Result<Vec<String>, UploadError>;
}

/// Splits a response body into lines on `\n`, `\r\n` or a lone `\r`.
///
/// A trailing terminator does not produce an empty last line. Invalid
/// UTF-8 is replaced rather than rejected; servers answer in plain ASCII
/// and a stray byte should not hide the rest of the reply.
pub fn decode_lines(body: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(body);
    let mut lines = Vec::new();
    let mut rest: &str = &text;
    while !rest.is_empty() {
        let Some(end) = rest.find(['\r', '\n']) else {
            lines.push(rest.to_owned());
            break;
        };
        lines.push(rest[..end].to_owned());
        let terminator = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[end + terminator..];
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"OK\nMATCH=true", &["OK", "MATCH=true"])]
    #[case(b"OK\r\nMATCH=true\r\n", &["OK", "MATCH=true"])]
    #[case(b"single", &["single"])]
    #[case(b"", &[])]
    #[case(b"a\n\nb", &["a", "", "b"])]
    #[case(b"OK\rMATCH=true", &["OK", "MATCH=true"])]
    #[case(b"OK\r\rMATCH=true\r", &["OK", "", "MATCH=true"])]
    #[case(b"\n", &[""])]
    fn test_decode_lines(#[case] body: &[u8], #[case] expected: &[&str]) {
        assert_eq!(decode_lines(body), expected);
    }

    #[test]
    fn test_decode_lines_replaces_invalid_utf8() {
        let lines = decode_lines(b"ok\xff\nnext");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ok"));
        assert_eq!(lines[1], "next");
    }
}
