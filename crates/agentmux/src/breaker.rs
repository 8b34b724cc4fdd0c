//! Circuit breaker guarding a single provider.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// State transitions the owner may need to surface as callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitTransition {
    Opened,
    Closed,
    HalfOpened,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Failures in `Closed` before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit stays open before probing.
    pub timeout: Duration,
    /// Consecutive successes in `HalfOpen` required to close.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            half_open_max_calls: 2,
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

impl CircuitInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }
}

/// Closed/open/half-open machine. All state sits behind one mutex so the
/// threshold check and the transition it triggers are a single critical
/// section: concurrent failures racing past the threshold produce exactly
/// one `Opened` transition.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(CircuitInner::new()),
        }
    }

    /// Current state, applying the lazy open -> half-open transition when
    /// the open timeout has elapsed.
    pub fn state(&self) -> CircuitState {
        if !self.config.enabled {
            return CircuitState::Closed;
        }
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);
        inner.state
    }

    /// True while the circuit rejects requests.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// Record a success. Returns `Some(Closed)` when this success closes a
    /// half-open circuit.
    pub fn record_success(&self) -> Option<CircuitTransition> {
        if !self.config.enabled {
            return None;
        }
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count > 0 {
                    debug!(
                        provider = %self.name,
                        failures = inner.failure_count,
                        "resetting failure count after success"
                    );
                    inner.failure_count = 0;
                }
                None
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_max_calls {
                    info!(provider = %self.name, "circuit closed after recovery");
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                    Some(CircuitTransition::Closed)
                } else {
                    None
                }
            }
            // A success landing while open changes nothing; the lazy
            // transition above already handled the timeout case.
            CircuitState::Open => None,
        }
    }

    /// Record a failure. Returns `Some(Opened)` when this failure opens
    /// the circuit (from closed past the threshold, or any half-open
    /// probe failure).
    pub fn record_failure(&self) -> Option<CircuitTransition> {
        if !self.config.enabled {
            return None;
        }
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        provider = %self.name,
                        failures = inner.failure_count,
                        "circuit opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.failure_count = 0;
                    Some(CircuitTransition::Opened)
                } else {
                    debug!(
                        provider = %self.name,
                        failures = inner.failure_count,
                        threshold = self.config.failure_threshold,
                        "failure recorded"
                    );
                    None
                }
            }
            CircuitState::HalfOpen => {
                warn!(provider = %self.name, "probe failed, circuit re-opened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
                Some(CircuitTransition::Opened)
            }
            CircuitState::Open => None,
        }
    }

    /// Back to the initial closed state.
    pub fn reset(&self) {
        *self.inner.lock() = CircuitInner::new();
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    fn maybe_half_open(&self, inner: &mut CircuitInner) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.timeout {
                    info!(provider = %self.name, "circuit half-open, probing");
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout: Duration, half_open: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                enabled: true,
                failure_threshold: threshold,
                timeout,
                half_open_max_calls: half_open,
            },
        )
    }

    #[tokio::test]
    async fn full_state_flow() {
        let cb = breaker(3, Duration::from_millis(50), 2);

        assert!(cb.is_closed());
        assert!(cb.record_failure().is_none());
        assert!(cb.record_failure().is_none());
        assert_eq!(cb.record_failure(), Some(CircuitTransition::Opened));
        assert!(cb.is_open());
        // Opening resets the failure counter.
        assert_eq!(cb.failure_count(), 0);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(cb.is_half_open());

        assert!(cb.record_success().is_none());
        assert_eq!(cb.record_success(), Some(CircuitTransition::Closed));
        assert!(cb.is_closed());
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(20), 2);
        assert_eq!(cb.record_failure(), Some(CircuitTransition::Opened));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cb.is_half_open());
        assert_eq!(cb.record_failure(), Some(CircuitTransition::Opened));
        assert!(cb.is_open());
    }

    #[test]
    fn success_in_closed_resets_failures() {
        let cb = breaker(3, Duration::from_secs(60), 1);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        // Two more failures do not reach the threshold of three.
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_closed());
    }

    #[test]
    fn no_early_half_open() {
        let cb = breaker(1, Duration::from_secs(60), 1);
        cb.record_failure();
        assert!(cb.is_open());
        // Timeout has not elapsed, repeated reads stay open.
        assert!(cb.is_open());
        assert!(!cb.is_half_open());
    }

    #[test]
    fn disabled_breaker_is_inert() {
        let cb = CircuitBreaker::new(
            "off",
            CircuitBreakerConfig {
                enabled: false,
                failure_threshold: 1,
                ..Default::default()
            },
        );
        assert!(cb.record_failure().is_none());
        assert!(cb.record_failure().is_none());
        assert!(!cb.is_open());
    }

    #[test]
    fn reset_restores_initial_state() {
        let cb = breaker(1, Duration::from_secs(60), 1);
        cb.record_failure();
        assert!(cb.is_open());
        cb.reset();
        assert!(cb.is_closed());
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn concurrent_failures_open_once() {
        use std::sync::Arc;

        let cb = Arc::new(breaker(5, Duration::from_secs(60), 1));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cb = Arc::clone(&cb);
            handles.push(std::thread::spawn(move || {
                let mut opened = 0;
                for _ in 0..4 {
                    if cb.record_failure() == Some(CircuitTransition::Opened) {
                        opened += 1;
                    }
                }
                opened
            }));
        }
        let opened: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(opened, 1, "exactly one thread may observe the open transition");
        assert!(cb.failure_count() < 5, "failure count must not run past the threshold");
    }
}
