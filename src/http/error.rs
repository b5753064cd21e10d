use reqwest::StatusCode;
use serde::Deserialize;

/// Payload rejected while validating it at the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {entity} id: {value}")]
    InvalidId { entity: &'static str, value: i64 },
    #[error("media {0} has an empty url")]
    EmptyMediaUrl(i64),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

impl ApiError {
    /// Build an error from a non-success response body.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .map(|body| body.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());

        if status == StatusCode::UNAUTHORIZED {
            return Self::Unauthorized(message);
        }

        Self::Status {
            status: status.as_u16(),
            message,
        }
    }

    /// Whether retrying the same call later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Unauthorized(_) | Self::Parse(_) | Self::InvalidUrl(_) => false,
        }
    }
}
