use thiserror::Error;

use crate::server_timing::ServerTimingError;

/// Enumeration of errors returned by the session-pool telemetry helpers.
///
/// None of these should ever change the outcome of the RPC being instrumented:
/// callers are expected to log them and move on.
#[derive(Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("a different view with the same name is already registered: {name}")]
    Registration { name: String },
    #[error("failed to parse server-timing header: {0}")]
    Parse(#[from] ServerTimingError),
    #[error("invalid value {value:?} for tag {key}")]
    InvalidTagValue { key: &'static str, value: String },
}
