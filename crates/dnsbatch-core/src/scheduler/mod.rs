//! Rate-limit aware remote call scheduler
//!
//! Every provider call goes through [`RemoteCallScheduler::execute`]. After a
//! response arrives the scheduler reads the rate-limit headers and sleeps
//! before handing the result back:
//!
//! ```text
//! execute(request)
//!   ├─ provider.send(request) ──── no response ──▶ Err(Transport)
//!   ├─ RateWindow::from_response
//!   ├─ plan_delay(window, now)
//!   │    ├─ remaining <= 1 or 429 ─▶ Backoff(reset*1000 + pad - now)
//!   │    ├─ min_interval_ms > 0 ───▶ Interval(min_interval_ms)
//!   │    └─ otherwise ─────────────▶ None
//!   ├─ sleep
//!   └─ Ok(RemoteResult)
//! ```
//!
//! The sleep happens while the scheduler's lock is held, so every later call
//! through the same scheduler waits behind it. The result itself is never
//! dropped or retried, including 429 responses.

pub mod window;

pub use window::{RateWindow, Throttle, plan_delay};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::traits::{ApiRequest, Clock, DnsProvider, SystemClock};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one scheduled call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResult {
    /// Response body
    pub body: serde_json::Value,
    /// HTTP status code
    pub status_code: u16,
    /// Reason phrase for the status
    pub status_message: String,
    /// Rate-limit state carried by the response
    pub rate_window: RateWindow,
}

impl RemoteResult {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Bookkeeping shared by every call through one scheduler
#[derive(Debug, Default)]
struct SchedulerState {
    last_window: Option<RateWindow>,
    last_call_at: Option<Instant>,
    calls: u64,
}

/// Issues provider calls one at a time, pacing them by observed rate state
pub struct RemoteCallScheduler {
    provider: Arc<dyn DnsProvider>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
}

impl RemoteCallScheduler {
    /// Create a scheduler using the system clock
    pub fn new(provider: Arc<dyn DnsProvider>, config: SchedulerConfig) -> Self {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    /// Create a scheduler with an explicit wall clock
    pub fn with_clock(
        provider: Arc<dyn DnsProvider>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            clock,
            config,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// The provider calls are issued against
    pub fn provider(&self) -> &Arc<dyn DnsProvider> {
        &self.provider
    }

    /// Issue one call and apply the post-call delay
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteResult)`: any HTTP response, after the delay has elapsed
    /// - `Err(Error::Transport)`: no response; returned without delay
    pub async fn execute(&self, request: ApiRequest) -> Result<RemoteResult> {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_call_at {
            debug!("{:?} since previous call", last.elapsed());
        }

        let response = match self.provider.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("[remote_call] {} failed: {}", request, e);
                return Err(e);
            }
        };

        let window = RateWindow::from_response(&response);
        state.calls += 1;
        state.last_window = Some(window);
        state.last_call_at = Some(Instant::now());

        let now = self.clock.now_millis();
        info!(
            "[remote_call] ({} remaining, reset {}) {} returned {}: {}",
            window
                .remaining
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".to_string()),
            describe_reset(&window, now, self.config.reset_pad_ms),
            request,
            response.status_code,
            response.status_message
        );

        let throttle = plan_delay(&window, now, &self.config);
        match throttle {
            Throttle::Backoff(wait) => {
                warn!(
                    "[remote_call] Sleeping {}s until next rate limit window (status {})",
                    wait.as_secs(),
                    window.status_code
                );
            }
            Throttle::Interval(wait) => {
                debug!("[remote_call] Throttling {}ms", wait.as_millis());
            }
            Throttle::None => {}
        }

        let wait = throttle.duration();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        drop(state);

        Ok(RemoteResult {
            body: response.body,
            status_code: response.status_code,
            status_message: response.status_message,
            rate_window: window,
        })
    }

    /// Rate-limit state seen on the most recent response
    pub async fn last_window(&self) -> Option<RateWindow> {
        self.state.lock().await.last_window
    }

    /// Number of calls that received a response
    pub async fn calls_issued(&self) -> u64 {
        self.state.lock().await.calls
    }
}

impl std::fmt::Debug for RemoteCallScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCallScheduler")
            .field("provider", &self.provider.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

/// Human readable resume time, e.g. `in 75s (2024-01-01T00:01:00+00:00)`
fn describe_reset(window: &RateWindow, now_millis: i64, pad_ms: u64) -> String {
    let Some(reset_ms) = window.reset_at_millis() else {
        return "unknown".to_string();
    };
    let pad = i64::try_from(pad_ms).unwrap_or(i64::MAX);
    let resume_ms = reset_ms.saturating_add(pad);
    let secs = resume_ms.saturating_sub(now_millis) / 1000;
    match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(resume_ms) {
        Some(at) => format!("in {}s ({})", secs, at.to_rfc3339()),
        None => format!("in {}s", secs),
    }
}
