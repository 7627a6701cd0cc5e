use http::StatusCode;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// The proxy answered with a non-success status
    #[error("{message}")]
    Proxy { status: StatusCode, message: String },
    #[error("Failed to fetch products: {}", .0.as_u16())]
    ProductsStatus(StatusCode),
    #[error("HTTP client error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid JSON in response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Proxy { status, .. } | ClientError::ProductsStatus(status) => {
                Some(*status)
            }
            ClientError::Request(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Proxy { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("could not (de)serialize cache entry: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),
}
