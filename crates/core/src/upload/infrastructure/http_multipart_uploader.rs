use std::time::Duration;

use reqwest::header::{CONNECTION, CONTENT_TYPE};

use crate::shared::constants::UPLOAD_FIELD_NAME;
use crate::upload::domain::endpoint::UploadEndpoint;
use crate::upload::domain::uploader::{decode_lines, UploadError, Uploader};

use super::multipart::MultipartRequest;

/// Posts a single-file multipart body with a blocking `reqwest` client.
pub struct HttpMultipartUploader {
    client: reqwest::blocking::Client,
}

impl HttpMultipartUploader {
    /// `timeout` of `None` keeps the client's default.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Uploader for HttpMultipartUploader {
    fn upload(
        &self,
        endpoint: &UploadEndpoint,
        file_bytes: &[u8],
        file_name: &str,
    ) -> Result<Vec<String>, UploadError> {
        let request = MultipartRequest::new(UPLOAD_FIELD_NAME, file_name, file_bytes);
        let transport = |e: reqwest::Error| UploadError::Transport {
            url: endpoint.url().to_string(),
            source: Box::new(e),
        };

        log::debug!(
            "POST {} bytes as {file_name} to {endpoint}",
            file_bytes.len()
        );
        let response = self
            .client
            .post(endpoint.url())
            .header(CONTENT_TYPE, request.content_type_header())
            .header(CONNECTION, "Keep-Alive")
            .body(request.encode())
            .send()
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                url: endpoint.url().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(transport)?;
        Ok(decode_lines(&body))
    }
}
