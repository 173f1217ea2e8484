//! Rate-limit window extraction and the post-call delay decision

use crate::config::SchedulerConfig;
use crate::traits::RawResponse;
use std::time::Duration;

/// Calls allowed per window
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Calls left in the current window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Unix time (seconds) at which the window resets
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// HTTP status signalling an exhausted window
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Rate-limit state observed on a single response
///
/// Each field is `None` when its header was missing or malformed. A missing
/// `remaining` means no pressure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Calls allowed per window (informational)
    pub limit: Option<u32>,
    /// Calls left in the current window
    pub remaining: Option<u32>,
    /// Unix time (seconds) when the window resets
    pub reset_epoch_seconds: Option<i64>,
    /// HTTP status of the response that produced this window
    pub status_code: u16,
}

impl RateWindow {
    /// Extract the window from response headers
    pub fn from_response(response: &RawResponse) -> Self {
        Self {
            limit: parse_count(response.header(RATE_LIMIT_LIMIT_HEADER)),
            remaining: parse_count(response.header(RATE_LIMIT_REMAINING_HEADER)),
            reset_epoch_seconds: response
                .header(RATE_LIMIT_RESET_HEADER)
                .and_then(|v| v.trim().parse::<i64>().ok()),
            status_code: response.status_code,
        }
    }

    /// Whether the next call should wait for the window to reset
    pub fn is_under_pressure(&self) -> bool {
        self.status_code == TOO_MANY_REQUESTS || matches!(self.remaining, Some(r) if r <= 1)
    }

    /// Reset time in Unix milliseconds
    pub fn reset_at_millis(&self) -> Option<i64> {
        self.reset_epoch_seconds.map(|s| s.saturating_mul(1000))
    }
}

// Counts below zero are read as zero.
fn parse_count(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| v.clamp(0, u32::MAX as i64) as u32)
}

/// Delay applied after a call before control returns to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// Pressure detected: wait until the window resets, plus padding
    Backoff(Duration),
    /// No pressure: the configured spacing between calls
    Interval(Duration),
    /// Return immediately
    None,
}

impl Throttle {
    /// How long to sleep
    pub fn duration(&self) -> Duration {
        match self {
            Throttle::Backoff(d) | Throttle::Interval(d) => *d,
            Throttle::None => Duration::ZERO,
        }
    }
}

/// Decide the post-call delay from the freshest window
///
/// Under pressure the wait is `reset * 1000 + reset_pad_ms - now`, clamped
/// to zero. A pressured window without a reset header waits `reset_pad_ms`.
pub fn plan_delay(window: &RateWindow, now_millis: i64, config: &SchedulerConfig) -> Throttle {
    let pad = i64::try_from(config.reset_pad_ms).unwrap_or(i64::MAX);

    if window.is_under_pressure() {
        let wait_ms = match window.reset_at_millis() {
            Some(reset) => reset.saturating_add(pad).saturating_sub(now_millis),
            None => pad,
        };
        return Throttle::Backoff(Duration::from_millis(wait_ms.max(0) as u64));
    }

    if config.min_interval_ms > 0 {
        Throttle::Interval(Duration::from_millis(config.min_interval_ms))
    } else {
        Throttle::None
    }
}
