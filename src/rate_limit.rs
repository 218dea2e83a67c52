//! Rate limit headers attached to error responses.
//!
//! Planning Center meters requests per credential over a rolling period and
//! reports the window on every response. The client never waits or retries on
//! its own; it only parses these headers so callers that receive
//! [`ErrorKind::TooManyRequests`](crate::ErrorKind::TooManyRequests) can decide
//! what to do.

use http::HeaderMap;
use std::time::{Duration, SystemTime};

const RATE_COUNT: &str = "x-pco-api-request-rate-count";
const RATE_LIMIT: &str = "x-pco-api-request-rate-limit";
const RATE_PERIOD: &str = "x-pco-api-request-rate-period";

/// Information extracted from rate limit headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// How long to wait before retrying (from `Retry-After`).
    pub retry_after: Option<Duration>,

    /// Requests made in the current period (`X-PCO-API-Request-Rate-Count`).
    pub count: Option<u64>,

    /// Requests allowed per period (`X-PCO-API-Request-Rate-Limit`).
    pub limit: Option<u64>,

    /// Length of the period (`X-PCO-API-Request-Rate-Period`, in seconds).
    pub period: Option<Duration>,
}

impl RateLimitInfo {
    /// Extracts rate limit information from HTTP response headers.
    ///
    /// `Retry-After` is accepted both as delay-seconds and as an HTTP date.
    ///
    /// # Examples
    ///
    /// ```
    /// use pco_api::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "20".parse().unwrap());
    /// headers.insert("x-pco-api-request-rate-count", "100".parse().unwrap());
    /// headers.insert("x-pco-api-request-rate-limit", "100".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.retry_after, Some(Duration::from_secs(20)));
    /// assert_eq!(info.remaining(), Some(0));
    /// assert!(info.is_rate_limited());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            retry_after: parse_retry_after(headers),
            count: parse_u64(headers, RATE_COUNT),
            limit: parse_u64(headers, RATE_LIMIT),
            period: parse_u64(headers, RATE_PERIOD).map(Duration::from_secs),
        }
    }

    /// Requests left in the current period, when both count and limit are known.
    pub fn remaining(&self) -> Option<u64> {
        Some(self.limit?.saturating_sub(self.count?))
    }

    /// Returns `true` if the headers describe an exhausted window.
    ///
    /// That is the case when `Retry-After` is present or no requests remain.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining() == Some(0)
    }
}

/// Parses the Retry-After header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;

    if let Ok(seconds) = header.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date_time = httpdate::parse_http_date(header).ok()?;
    Some(
        date_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

fn parse_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));

        let delay = parse_retry_after(&headers);
        assert_eq!(delay, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let mut headers = HeaderMap::new();
        let date = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(120));
        headers.insert("retry-after", HeaderValue::from_str(&date).unwrap());

        let delay = parse_retry_after(&headers).unwrap();
        assert!(delay > Duration::from_secs(100) && delay <= Duration::from_secs(120));
    }

    #[test]
    fn test_retry_after_in_the_past_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        assert_eq!(parse_retry_after(&headers), Some(Duration::ZERO));
    }

    #[test]
    fn test_rate_window_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(RATE_COUNT, HeaderValue::from_static("12"));
        headers.insert(RATE_LIMIT, HeaderValue::from_static("100"));
        headers.insert(RATE_PERIOD, HeaderValue::from_static("20"));

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.count, Some(12));
        assert_eq!(info.limit, Some(100));
        assert_eq!(info.period, Some(Duration::from_secs(20)));
        assert_eq!(info.remaining(), Some(88));
        assert!(!info.is_rate_limited());
    }

    #[test]
    fn test_missing_headers() {
        let info = RateLimitInfo::from_headers(&HeaderMap::new());
        assert_eq!(info, RateLimitInfo::default());
        assert_eq!(info.remaining(), None);
        assert!(!info.is_rate_limited());
    }
}
