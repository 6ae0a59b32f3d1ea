//! Sliding-window request budget
//!
//! The limiter keeps a log of call timestamps. Before each call it drops
//! entries older than the window; if the remaining count has reached the
//! budget, the caller sleeps until the oldest entry ages out.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Length of the sliding window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Global call budget over a sliding window
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum calls inside one window; `None` disables limiting
    max_calls: Option<u32>,

    /// Window length (60 seconds outside of tests)
    window: Duration,

    /// Timestamps of calls still inside the window, oldest first
    calls: VecDeque<Instant>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_calls_per_minute` calls per 60 seconds
    pub fn new(max_calls_per_minute: Option<u32>) -> Self {
        Self::with_window(max_calls_per_minute, WINDOW)
    }

    /// Creates a limiter with a custom window length
    pub fn with_window(max_calls: Option<u32>, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: VecDeque::new(),
        }
    }

    /// Returns the configured budget
    pub fn max_calls(&self) -> Option<u32> {
        self.max_calls
    }

    /// Number of calls recorded inside the window as of `now`
    pub fn calls_in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.calls.len()
    }

    /// How long a call at `now` has to wait, or `None` if it may proceed
    pub fn wait_time(&mut self, now: Instant) -> Option<Duration> {
        let max_calls = self.max_calls? as usize;
        self.prune(now);

        if self.calls.len() < max_calls {
            return None;
        }

        self.calls
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
    }

    /// Records a call made at `now`
    pub fn record(&mut self, now: Instant) {
        if self.max_calls.is_some() {
            self.calls.push_back(now);
        }
    }

    /// Waits until the budget allows another call, then records it
    pub async fn acquire(&mut self) {
        loop {
            let now = Instant::now();
            match self.wait_time(now) {
                Some(wait) => {
                    tracing::info!(
                        "Waiting {:.2}s (max requests per minute: {})",
                        wait.as_secs_f64(),
                        self.max_calls.unwrap_or_default()
                    );
                    tokio::time::sleep(wait).await;
                }
                None => {
                    self.record(now);
                    return;
                }
            }
        }
    }

    /// Drops timestamps that are at least one window old
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.calls.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}
