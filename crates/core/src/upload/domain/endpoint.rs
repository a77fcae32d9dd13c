use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointLabel {
    Save,
    Check,
}

impl fmt::Display for EndpointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointLabel::Save => f.write_str("Save"),
            EndpointLabel::Check => f.write_str("Check"),
        }
    }
}

/// A server endpoint that accepts a single-file multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadEndpoint {
    label: EndpointLabel,
    url: String,
}

impl UploadEndpoint {
    pub fn new(label: EndpointLabel, url: impl Into<String>) -> Self {
        Self {
            label,
            url: url.into(),
        }
    }

    pub fn save(url: impl Into<String>) -> Self {
        Self::new(EndpointLabel::Save, url)
    }

    pub fn check(url: impl Into<String>) -> Self {
        Self::new(EndpointLabel::Check, url)
    }

    pub fn label(&self) -> EndpointLabel {
        self.label
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for UploadEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.url)
    }
}
