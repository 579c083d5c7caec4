//! Rate-limit response headers

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;
use thiserror::Error;

pub const REMAINING: &str = "x-ratelimit-remaining";
pub const LIMIT: &str = "x-ratelimit-limit";
pub const RESET: &str = "x-ratelimit-reset";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const RETRY_AFTER: &str = "retry-after";
pub const DATE: &str = "date";

/// A header was present but unparseable
#[derive(Debug, Error)]
#[error("malformed {header} header: {value:?}")]
pub struct RateLimitHeaderError {
    pub header: &'static str,
    pub value: String,
}

/// Rate-limit state reported by one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub remaining: Option<i64>,
    pub limit: Option<i64>,
    /// Epoch seconds at which the bucket refills
    pub reset: Option<f64>,
    /// Relative wait, from `Retry-After` or `X-RateLimit-Reset-After`
    pub retry_after: Option<Duration>,
    pub global: bool,
    /// Server clock at response time
    pub date: Option<DateTime<Utc>>,
}

impl RateLimitHeaders {
    /// Parse the rate-limit headers of a response
    ///
    /// Absent headers are `None`; present but malformed headers are errors.
    pub fn parse(headers: &HeaderMap) -> Result<Self, RateLimitHeaderError> {
        let retry_after = match header_str(headers, RETRY_AFTER)? {
            Some(raw) => Some(parse_seconds(RETRY_AFTER, raw)?),
            None => match header_str(headers, RESET_AFTER)? {
                Some(raw) => Some(parse_seconds(RESET_AFTER, raw)?),
                None => None,
            },
        };

        let date = match header_str(headers, DATE)? {
            Some(raw) => Some(
                DateTime::parse_from_rfc2822(raw)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|_| malformed(DATE, raw))?,
            ),
            None => None,
        };

        Ok(Self {
            remaining: parse_number(headers, REMAINING)?,
            limit: parse_number(headers, LIMIT)?,
            reset: parse_number(headers, RESET)?,
            retry_after,
            global: header_str(headers, GLOBAL)?.is_some(),
            date,
        })
    }

    /// Time from the server's `Date` until the reset timestamp, plus `margin`
    ///
    /// Uses the server clock rather than the local one so local clock skew
    /// cannot shorten the wait. Falls back to the local clock when the
    /// response carries no `Date`. Never negative.
    pub fn reset_delay(&self, margin: Duration) -> Option<Duration> {
        let reset = self.reset?;
        let now = self.date.unwrap_or_else(Utc::now);
        let now_secs = now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0;
        let delta = Duration::try_from_secs_f64(reset - now_secs).unwrap_or(Duration::ZERO);
        Some(delta + margin)
    }
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<Option<&'a str>, RateLimitHeaderError> {
    match headers.get(name) {
        Some(value) => value.to_str().map(Some).map_err(|_| RateLimitHeaderError {
            header: name,
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        }),
        None => Ok(None),
    }
}

fn parse_number<T: std::str::FromStr>(
    headers: &HeaderMap,
    name: &'static str,
) -> Result<Option<T>, RateLimitHeaderError> {
    match header_str(headers, name)? {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| malformed(name, raw)),
        None => Ok(None),
    }
}

fn parse_seconds(name: &'static str, raw: &str) -> Result<Duration, RateLimitHeaderError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| malformed(name, raw))
}

fn malformed(header: &'static str, raw: &str) -> RateLimitHeaderError {
    RateLimitHeaderError {
        header,
        value: raw.to_string(),
    }
}
