//! Login throttling against password guessing
//!
//! A login first reserves an attempt with [`LoginThrottle::begin`]. Failures
//! and reservations still in flight both count against the limit, so
//! parallel guesses cannot slip past it while their passwords are checked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Throttle configuration
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Failed attempts allowed before the username is locked
    pub max_attempts: u32,
    /// Failures older than this are forgotten
    pub window_seconds: u64,
    /// Lockout duration in seconds
    pub lockout_seconds: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            lockout_seconds: 900,
        }
    }
}

#[derive(Debug, Default)]
struct FailureEntry {
    failures: u32,
    in_flight: u32,
    last_failure: Option<Instant>,
    locked_until: Option<Instant>,
}

impl FailureEntry {
    /// Whether the entry still affects a future login
    fn is_live(&self, now: Instant, window: Duration) -> bool {
        self.in_flight > 0
            || self.locked_until.is_some_and(|until| now < until)
            || self
                .last_failure
                .is_some_and(|at| now.duration_since(at) < window)
    }
}

/// Per-username failed login counter
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    config: ThrottleConfig,
    entries: Arc<Mutex<HashMap<String, FailureEntry>>>,
}

/// A reserved login attempt
///
/// Settle it with [`failed`](LoginAttempt::failed) or
/// [`succeeded`](LoginAttempt::succeeded); dropping it unsettled (an error
/// before the password was checked) releases the reservation.
#[must_use]
pub struct LoginAttempt<'a> {
    throttle: &'a LoginThrottle,
    username: String,
    settled: bool,
}

impl LoginAttempt<'_> {
    pub fn failed(mut self) {
        self.settled = true;
        self.throttle.record_failure(&self.username);
    }

    pub fn succeeded(mut self) {
        self.settled = true;
        self.throttle.reset(&self.username);
    }
}

impl Drop for LoginAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.throttle.release(&self.username);
        }
    }
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, FailureEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve an attempt for `username`, or `None` while it is locked out
    pub fn begin(&self, username: &str) -> Option<LoginAttempt<'_>> {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = entries.entry(username.to_string()).or_default();

        if let Some(until) = entry.locked_until {
            if now < until {
                return None;
            }
            info!("Lockout expired for {}", username);
            entry.locked_until = None;
            entry.failures = 0;
        }

        if entry
            .last_failure
            .is_some_and(|at| now.duration_since(at) >= self.window())
        {
            entry.failures = 0;
        }

        if entry.failures + entry.in_flight >= self.config.max_attempts {
            return None;
        }

        entry.in_flight += 1;
        Some(LoginAttempt {
            throttle: self,
            username: username.to_string(),
            settled: false,
        })
    }

    fn record_failure(&self, username: &str) {
        let now = Instant::now();
        let window = self.window();
        let mut entries = self.entries();

        let entry = entries.entry(username.to_string()).or_default();
        entry.in_flight = entry.in_flight.saturating_sub(1);
        entry.failures += 1;
        entry.last_failure = Some(now);

        if entry.failures >= self.config.max_attempts && entry.locked_until.is_none() {
            entry.locked_until = Some(now + Duration::from_secs(self.config.lockout_seconds));
            warn!(
                "Locked {} for {} seconds after {} failed logins",
                username, self.config.lockout_seconds, entry.failures
            );
        }

        entries.retain(|_, entry| entry.is_live(now, window));
    }

    fn reset(&self, username: &str) {
        self.entries().remove(username);
    }

    fn release(&self, username: &str) {
        let now = Instant::now();
        let window = self.window();
        let mut entries = self.entries();

        if let Some(entry) = entries.get_mut(username) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
            if !entry.is_live(now, window) {
                entries.remove(username);
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(max_attempts: u32, window_seconds: u64, lockout_seconds: u64) -> LoginThrottle {
        LoginThrottle::new(ThrottleConfig {
            max_attempts,
            window_seconds,
            lockout_seconds,
        })
    }

    fn fail(throttle: &LoginThrottle, username: &str) {
        throttle.begin(username).expect("attempt allowed").failed();
    }

    #[test]
    fn locks_after_max_failures() {
        let throttle = throttle(3, 60, 60);

        for _ in 0..2 {
            fail(&throttle, "jane@example.com");
        }
        assert!(throttle.begin("jane@example.com").is_some());

        fail(&throttle, "jane@example.com");
        assert!(throttle.begin("jane@example.com").is_none());
        assert!(throttle.begin("john@example.com").is_some());
    }

    #[test]
    fn success_clears_failures() {
        let throttle = throttle(2, 60, 60);

        fail(&throttle, "jane@example.com");
        throttle.begin("jane@example.com").unwrap().succeeded();
        fail(&throttle, "jane@example.com");
        assert!(throttle.begin("jane@example.com").is_some());
    }

    #[test]
    fn lockout_expires() {
        let throttle = throttle(1, 60, 0);

        fail(&throttle, "jane@example.com");
        assert!(throttle.begin("jane@example.com").is_some());
    }

    #[test]
    fn attempts_in_flight_count_against_the_limit() {
        let throttle = throttle(2, 60, 60);

        let first = throttle.begin("jane@example.com").unwrap();
        let second = throttle.begin("jane@example.com").unwrap();
        assert!(throttle.begin("jane@example.com").is_none());

        first.failed();
        second.failed();
        assert!(throttle.begin("jane@example.com").is_none());
    }

    #[test]
    fn dropped_attempt_is_released() {
        let throttle = throttle(1, 60, 60);

        drop(throttle.begin("jane@example.com").unwrap());
        assert_eq!(throttle.tracked(), 0);
        assert!(throttle.begin("jane@example.com").is_some());
    }

    #[test]
    fn failures_age_out_of_the_window() {
        let throttle = throttle(2, 0, 60);

        fail(&throttle, "jane@example.com");
        fail(&throttle, "jane@example.com");
        // Two failures, but the first had already aged out
        assert!(throttle.begin("jane@example.com").is_some());
    }

    #[tokio::test]
    async fn stale_usernames_are_pruned() {
        let throttle = throttle(5, 1, 1);

        for n in 0..1_000 {
            fail(&throttle, &format!("user{}@example.com", n));
        }
        assert_eq!(throttle.tracked(), 1_000);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        fail(&throttle, "late@example.com");
        assert_eq!(throttle.tracked(), 1);
    }
}
