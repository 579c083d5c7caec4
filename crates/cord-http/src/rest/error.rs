//! REST error types

use cord_core::events::TooManyRequests;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::ratelimit::RateLimitHeaderError;

pub type RestResult<T> = Result<T, RestError>;

/// REST executor errors
#[derive(Debug, Error)]
pub enum RestError {
    /// Transport failure, no response received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    RateLimitHeader(#[from] RateLimitHeaderError),

    /// 502 persisted past the configured retry count
    #[error("Exceeded max retries HTTP {status}, {body}")]
    MaxRetries { status: StatusCode, body: String },

    /// 429 with automatic retry disabled
    #[error("Rate limited on {url}, retry after {:?}", .too_many_requests.retry_after)]
    RateLimited {
        url: String,
        too_many_requests: TooManyRequests,
    },

    /// Any other unsuccessful status
    #[error(transparent)]
    Status(Box<StatusError>),
}

impl RestError {
    /// Server-requested delay for a surfaced 429
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                too_many_requests, ..
            } => Some(too_many_requests.retry_after),
            _ => None,
        }
    }

    /// Response status, when a response was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::MaxRetries { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Status(err) => Some(err.status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl From<StatusError> for RestError {
    fn from(err: StatusError) -> Self {
        Self::Status(Box::new(err))
    }
}

/// Error object the API puts in failure bodies
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorMessage {
    pub code: i64,
    pub message: String,
}

/// Unsuccessful response with its full request and response context
#[derive(Debug)]
pub struct StatusError {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Parsed from `body` when it holds an API error object
    pub api_message: Option<ApiErrorMessage>,
    /// Set on 401 when the token lacks the `Bot ` prefix
    pub token_prefix_hint: bool,
}

impl StatusError {
    pub fn new(
        method: Method,
        url: impl Into<String>,
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Self {
        let api_message = serde_json::from_slice(&body).ok();
        Self {
            method,
            url: url.into(),
            status,
            headers,
            body,
            api_message,
            token_prefix_hint: false,
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}, {}", self.status, self.body_text())
    }
}

impl std::error::Error for StatusError {}
