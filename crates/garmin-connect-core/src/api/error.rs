use reqwest::{Method, StatusCode};
use thiserror::Error;

use crate::auth::ScrapeError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No credentials set")]
    NoCredentials,

    #[error("Username and/or password not recognized")]
    WrongCredentials,

    #[error("Client is not authenticated")]
    NotAuthenticated,

    #[error("Session expired and automatic renewal is disabled")]
    SessionExpired,

    #[error("Bad request")]
    BadRequest,

    #[error("Forbidden")]
    Forbidden,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found")]
    NotFound,

    #[error("Garmin SSO returned \"{0}\"")]
    SignInRejected(StatusCode),

    #[error("HTTP {method} returned {status} ({expected} expected)")]
    UnexpectedStatus {
        method: Method,
        status: StatusCode,
        expected: StatusCode,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected page content: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Best-effort shape of the JSON body Garmin sends with a 403.
/// The envelope also carries an `error` class name which is not surfaced.
#[derive(Debug, Default, serde::Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Map a 403 body to an error, surfacing the server's message if it sent one.
    pub fn from_forbidden(body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) if !envelope.message.is_empty() => {
                ApiError::AccessDenied(envelope.message)
            }
            _ => ApiError::Forbidden,
        }
    }

    /// Classify a status code that callers should never see as a response.
    ///
    /// 403 is handled by [`ApiError::from_forbidden`] since it needs the body.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::BAD_REQUEST => Some(ApiError::BadRequest),
            StatusCode::NOT_FOUND => Some(ApiError::NotFound),
            _ => None,
        }
    }
}
