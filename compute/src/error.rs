use std::time;

use http::StatusCode;
use thiserror::Error;

use crate::retry::is_retryable_status;

/// Enumeration of errors returned by the disks client.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("the client connection is closed")]
    Closed,
    #[error("{0} cannot be used as an endpoint")]
    InvalidEndpoint(String),
    #[error("invalid client info header: {0}")]
    ClientInfo(#[from] http::header::InvalidHeaderValue),
    #[error("error parsing url: {0}")]
    Url(#[from] url::ParseError),
    #[error("a request could not be delivered: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        retry_after: Option<time::Duration>,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ComputeError {
    /// Whether sending the same request again later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ComputeError::Request(e) => e.is_connect() || e.is_timeout(),
            ComputeError::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<time::Duration> {
        match self {
            ComputeError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ComputeError::Status { status, .. } => Some(*status),
            ComputeError::Request(e) => e.status(),
            _ => None,
        }
    }
}
