//! 目标 URL 校验
//!
//! 只接受 http/https，拒绝脚本类协议

use url::Url;

use crate::errors::LinkShortenerError;

#[derive(Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    EmptyUrl,
    InvalidProtocol(String),
    DangerousProtocol(String),
    InvalidFormat(String),
    MissingHost,
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUrl => write!(f, "URL cannot be empty"),
            Self::InvalidProtocol(proto) => write!(
                f,
                "Invalid protocol: {}. Only http:// and https:// are allowed",
                proto
            ),
            Self::DangerousProtocol(proto) => write!(f, "Dangerous protocol blocked: {}", proto),
            Self::InvalidFormat(msg) => write!(f, "Invalid URL format: {}", msg),
            Self::MissingHost => write!(f, "URL has no host"),
        }
    }
}

impl std::error::Error for UrlValidationError {}

impl From<UrlValidationError> for LinkShortenerError {
    fn from(err: UrlValidationError) -> Self {
        LinkShortenerError::Validation(err.to_string())
    }
}

const DANGEROUS_PROTOCOLS: &[&str] = &[
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
    "about:",
    "blob:",
];

/// Validate a link target and return it trimmed.
pub fn validate_url(url: &str) -> Result<String, UrlValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(UrlValidationError::EmptyUrl);
    }

    let lower = url.to_lowercase();
    if let Some(proto) = DANGEROUS_PROTOCOLS.iter().find(|p| lower.starts_with(*p)) {
        return Err(UrlValidationError::DangerousProtocol(proto.to_string()));
    }

    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        let proto = lower.split(':').next().unwrap_or_default();
        return Err(UrlValidationError::InvalidProtocol(format!("{}:", proto)));
    }

    let parsed = Url::parse(url).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url.to_string())
}
