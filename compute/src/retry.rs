use std::time;

use http::{HeaderMap, StatusCode};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Exponential backoff used between attempts of a retried call.
pub struct RetryPolicy {
    /// Coefficient to multiply initial_interval with for every past retry.
    backoff_coefficient: u32,
    /// The backoff interval for the first retry.
    initial_interval: time::Duration,
    /// The maximum possible backoff between retries.
    maximum_interval: Option<time::Duration>,
}

impl RetryPolicy {
    pub fn new(
        backoff_coefficient: u32,
        initial_interval: time::Duration,
        maximum_interval: Option<time::Duration>,
    ) -> Self {
        Self {
            backoff_coefficient,
            initial_interval,
            maximum_interval,
        }
    }

    /// Calculate the time to wait before the retry following `attempt` (0 for the first retry).
    ///
    /// A server-provided `preferred_retry_interval` wins over the computed backoff
    /// when it is longer, but never beyond `maximum_interval`.
    pub fn time_until_next_retry(
        &self,
        attempt: u32,
        preferred_retry_interval: Option<time::Duration>,
    ) -> time::Duration {
        let candidate_interval = self
            .initial_interval
            .saturating_mul(self.backoff_coefficient.saturating_pow(attempt));

        match (preferred_retry_interval, self.maximum_interval) {
            (Some(duration), Some(max_interval)) => std::cmp::min(
                std::cmp::max(std::cmp::min(candidate_interval, max_interval), duration),
                max_interval,
            ),
            (Some(duration), None) => std::cmp::max(candidate_interval, duration),
            (None, Some(max_interval)) => std::cmp::min(candidate_interval, max_interval),
            (None, None) => candidate_interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_coefficient: 2,
            initial_interval: time::Duration::from_millis(100),
            maximum_interval: Some(time::Duration::from_secs(60)),
        }
    }
}

/// Too many requests and server errors are worth retrying; other statuses won't change.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Attempt to parse a duration from a Retry-After header, returning None if not possible.
/// Retry-After header can specify a date in RFC2822 or a number of seconds; we try to parse both.
pub fn parse_retry_after_header(header_map: &HeaderMap) -> Option<time::Duration> {
    let retry_after = header_map
        .get(http::header::RETRY_AFTER)?
        .to_str()
        .ok()?;

    if let Ok(u) = retry_after.parse::<u64>() {
        return Some(time::Duration::from_secs(u));
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(retry_after) {
        let duration =
            chrono::DateTime::<chrono::offset::Utc>::from(dt) - chrono::offset::Utc::now();

        // This can only fail when negative, in which case we return None.
        return duration.to_std().ok();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_retry_interval() {
        let retry_policy = RetryPolicy::new(1, time::Duration::from_secs(2), None);
        let first_interval = retry_policy.time_until_next_retry(0, None);
        let second_interval = retry_policy.time_until_next_retry(1, None);
        let third_interval = retry_policy.time_until_next_retry(2, None);

        assert_eq!(first_interval, time::Duration::from_secs(2));
        assert_eq!(second_interval, time::Duration::from_secs(2));
        assert_eq!(third_interval, time::Duration::from_secs(2));
    }

    #[test]
    fn test_exponential_retry_interval_with_max() {
        let retry_policy = RetryPolicy::new(
            2,
            time::Duration::from_secs(1),
            Some(time::Duration::from_secs(4)),
        );

        assert_eq!(
            retry_policy.time_until_next_retry(0, None),
            time::Duration::from_secs(1)
        );
        assert_eq!(
            retry_policy.time_until_next_retry(1, None),
            time::Duration::from_secs(2)
        );
        assert_eq!(
            retry_policy.time_until_next_retry(2, None),
            time::Duration::from_secs(4)
        );
        assert_eq!(
            retry_policy.time_until_next_retry(40, None),
            time::Duration::from_secs(4)
        );
    }

    #[test]
    fn test_retry_interval_honours_preferred_up_to_max() {
        let retry_policy = RetryPolicy::new(
            2,
            time::Duration::from_secs(1),
            Some(time::Duration::from_secs(10)),
        );

        assert_eq!(
            retry_policy.time_until_next_retry(0, Some(time::Duration::from_secs(5))),
            time::Duration::from_secs(5)
        );
        assert_eq!(
            retry_policy.time_until_next_retry(0, Some(time::Duration::from_secs(120))),
            time::Duration::from_secs(10)
        );

        let unbounded = RetryPolicy::new(2, time::Duration::from_secs(1), None);
        assert_eq!(
            unbounded.time_until_next_retry(3, Some(time::Duration::from_secs(2))),
            time::Duration::from_secs(8)
        );
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn test_parse_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, "120".parse().unwrap());

        let duration = parse_retry_after_header(&headers).unwrap();
        assert_eq!(duration, time::Duration::from_secs(120));

        headers.remove(http::header::RETRY_AFTER);
        assert_eq!(parse_retry_after_header(&headers), None);

        // Dates in the past can't be waited for.
        headers.insert(
            http::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after_header(&headers), None);

        headers.insert(http::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after_header(&headers), None);
    }
}
