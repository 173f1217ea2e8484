// # Wall Clock
//
// Rate-limit reset times arrive as Unix epoch seconds, so the scheduler needs
// wall-clock time rather than a monotonic instant. Tests substitute a fixed
// clock.

/// Source of the current Unix time
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
