use std::num::ParseIntError;

use http::HeaderMap;
use thiserror::Error;

/// Response header carrying the GFE timing.
pub const SERVER_TIMING_HEADER: &str = "server-timing";

/// Every GFE timing value starts with this, followed by an integer in milliseconds.
pub const GFE_TIMING_PREFIX: &str = "gfet4t7; dur=";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServerTimingError {
    #[error("server-timing value is not visible ASCII")]
    NotAscii,
    #[error("server-timing value {0:?} is not a GFE timing")]
    MissingPrefix(String),
    #[error("invalid GFE duration {value:?}: {source}")]
    InvalidDuration {
        value: String,
        source: ParseIntError,
    },
}

/// Extract the GFE latency, in milliseconds, from response metadata.
///
/// Returns `Ok(None)` when there is no `server-timing` header at all. Only the
/// first value of the header is considered.
pub fn parse_gfe_latency(metadata: &HeaderMap) -> Result<Option<i64>, ServerTimingError> {
    let server_timing = match metadata.get(SERVER_TIMING_HEADER) {
        Some(value) => value.to_str().map_err(|_| ServerTimingError::NotAscii)?,
        None => return Ok(None),
    };

    let duration = server_timing
        .strip_prefix(GFE_TIMING_PREFIX)
        .ok_or_else(|| ServerTimingError::MissingPrefix(server_timing.to_owned()))?;

    duration
        .parse::<i64>()
        .map(Some)
        .map_err(|source| ServerTimingError::InvalidDuration {
            value: duration.to_owned(),
            source,
        })
}
