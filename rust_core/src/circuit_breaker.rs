//! Per-provider circuit breaker for external API calls.
//!
//! Long batch runs against rate-limited providers should stop hammering a
//! provider that keeps failing:
//! - Tracks consecutive failures
//! - Opens circuit after threshold failures
//! - Auto-transitions to half-open after the recovery timeout
//! - Closes after successful calls in half-open state

use crate::models::Provider;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// States for the API circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCircuitState {
    /// Normal operation - requests are allowed
    Closed,
    /// Circuit is open - requests are blocked
    Open,
    /// Testing if service is recovered
    HalfOpen,
}

/// Configuration for API circuit breaker
#[derive(Debug, Clone)]
pub struct ApiCircuitBreakerConfig {
    /// Number of consecutive failures to trip the circuit
    pub failure_threshold: u32,
    /// Duration to wait before attempting recovery
    pub recovery_timeout: Duration,
    /// Number of successful calls in half-open state to close circuit
    pub success_threshold: u32,
}

impl Default for ApiCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl ApiCircuitBreakerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            failure_threshold: std::env::var("CB_FAILURE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.failure_threshold),
            recovery_timeout: std::env::var("CB_RECOVERY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.recovery_timeout),
            success_threshold: std::env::var("CB_SUCCESS_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.success_threshold),
        }
    }
}

pub struct ApiCircuitBreaker {
    provider: Provider,
    config: ApiCircuitBreakerConfig,
    state: RwLock<ApiCircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure_time: RwLock<Option<Instant>>,
}

impl ApiCircuitBreaker {
    pub fn new(provider: Provider, config: ApiCircuitBreakerConfig) -> Self {
        Self {
            provider,
            config,
            state: RwLock::new(ApiCircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_time: RwLock::new(None),
        }
    }

    pub fn with_defaults(provider: Provider) -> Self {
        Self::new(provider, ApiCircuitBreakerConfig::default())
    }

    /// Check if the circuit breaker allows requests
    pub fn is_available(&self) -> bool {
        let mut state = self.state.write();

        match *state {
            ApiCircuitState::Closed => true,
            ApiCircuitState::Open => {
                let should_try = self
                    .last_failure_time
                    .read()
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);

                if should_try {
                    *state = ApiCircuitState::HalfOpen;
                    self.success_count.store(0, Ordering::SeqCst);
                    tracing::info!("{} circuit breaker half-open, probing", self.provider);
                    true
                } else {
                    false
                }
            }
            ApiCircuitState::HalfOpen => true,
        }
    }

    /// Record a successful API call
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);

        let mut state = self.state.write();
        match *state {
            ApiCircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    *state = ApiCircuitState::Closed;
                    tracing::info!(
                        "{} circuit breaker closed after {} successful calls",
                        self.provider,
                        successes
                    );
                }
            }
            _ => {
                *state = ApiCircuitState::Closed;
            }
        }
    }

    /// Record a failed API call
    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_failure_time.write() = Some(Instant::now());

        let mut state = self.state.write();
        match *state {
            ApiCircuitState::Closed => {
                if failures >= self.config.failure_threshold {
                    *state = ApiCircuitState::Open;
                    tracing::warn!(
                        "{} circuit breaker OPENED after {} consecutive failures",
                        self.provider,
                        failures
                    );
                }
            }
            ApiCircuitState::HalfOpen => {
                // Any failure in half-open goes back to open
                *state = ApiCircuitState::Open;
                tracing::warn!(
                    "{} circuit breaker re-OPENED during half-open probe",
                    self.provider
                );
            }
            ApiCircuitState::Open => {}
        }
    }

    pub fn state(&self) -> ApiCircuitState {
        *self.state.read()
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.write();
        *state = ApiCircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        *self.last_failure_time.write() = None;
    }
}

impl std::fmt::Debug for ApiCircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCircuitBreaker")
            .field("provider", &self.provider)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, success_threshold: u32) -> ApiCircuitBreaker {
        ApiCircuitBreaker::new(
            Provider::EspnCore,
            ApiCircuitBreakerConfig {
                failure_threshold,
                recovery_timeout: Duration::from_millis(10),
                success_threshold,
            },
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(3, 2);

        assert!(cb.is_available());
        assert_eq!(cb.state(), ApiCircuitState::Closed);

        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_available()); // Still available (2 < 3)

        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Open);
    }

    #[test]
    fn test_recovery_through_half_open() {
        let cb = breaker(2, 2);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));

        assert!(cb.is_available());
        assert_eq!(cb.state(), ApiCircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), ApiCircuitState::HalfOpen); // Need 2 successes

        cb.record_success();
        assert_eq!(cb.state(), ApiCircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, 1);

        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_available());

        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, 1);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Closed);
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, 1);
        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), ApiCircuitState::Closed);
        assert!(cb.is_available());
    }
}
