//! # Fibonacci Backoff
//!
//! Retry pacing for failed reconciliations. Delays follow the Fibonacci
//! sequence in minutes, capped at a maximum: 1m, 1m, 2m, 3m, 5m, 8m, 10m.
//!
//! ```rust
//! use lifecycle_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 120);
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator, in minutes
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes: max_minutes.max(min_minutes),
        }
    }

    /// Current delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let seconds = self.current_minutes * 60;
        let next = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next.min(self.max_minutes);
        seconds
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

/// Backoff state for one app version
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    /// Record an error and return the delay before the next attempt
    pub fn record_error(&mut self) -> Duration {
        self.error_count += 1;
        self.backoff.next_backoff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_capped() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        let delays: Vec<u64> = (0..9).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(delays, vec![60, 60, 120, 180, 300, 480, 600, 600, 600]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
    }

    #[test]
    fn test_state_counts_errors() {
        let mut state = BackoffState::new(1, 10);
        assert_eq!(state.record_error(), Duration::from_secs(60));
        assert_eq!(state.record_error(), Duration::from_secs(60));
        assert_eq!(state.record_error(), Duration::from_secs(120));
        assert_eq!(state.error_count, 3);
    }
}
