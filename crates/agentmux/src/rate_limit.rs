//! Per-provider rate-limit bookkeeping: a "limited until T" flag with
//! auto-expiry on read.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Used when the provider gave no reset hint.
    pub default_reset: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_reset: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct RateLimitInner {
    limited_until: Option<Instant>,
    limit_count: u64,
}

#[derive(Debug)]
pub struct RateLimitState {
    name: String,
    config: RateLimitConfig,
    inner: Mutex<RateLimitInner>,
}

impl RateLimitState {
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(RateLimitInner::default()),
        }
    }

    /// Flag the provider as limited. Precedence: an absolute deadline,
    /// then a relative one, then the configured default.
    pub fn mark_limited(&self, reset_at: Option<Instant>, reset_in: Option<Duration>) {
        if !self.config.enabled {
            return;
        }
        let until = reset_at
            .or_else(|| reset_in.map(|d| Instant::now() + d))
            .unwrap_or_else(|| Instant::now() + self.config.default_reset);
        let mut inner = self.inner.lock();
        inner.limited_until = Some(until);
        inner.limit_count += 1;
        debug!(
            provider = %self.name,
            count = inner.limit_count,
            "rate limit recorded"
        );
    }

    /// True while the limit window is in the future. A read past the
    /// deadline clears the state before answering.
    pub fn is_limited(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let mut inner = self.inner.lock();
        match inner.limited_until {
            Some(until) if Instant::now() >= until => {
                debug!(provider = %self.name, "rate limit window elapsed, clearing");
                inner.limited_until = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn time_until_reset(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        inner
            .limited_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
    }

    pub fn clear_limit(&self) {
        self.inner.lock().limited_until = None;
    }

    pub fn limit_count(&self) -> u64 {
        self.inner.lock().limit_count
    }

    /// Back to the initial state, count included.
    pub fn reset(&self) {
        *self.inner.lock() = RateLimitInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RateLimitState {
        RateLimitState::new("test", RateLimitConfig::default())
    }

    #[test]
    fn unlimited_by_default() {
        let rl = state();
        assert!(!rl.is_limited());
        assert!(rl.time_until_reset().is_none());
    }

    #[test]
    fn mark_with_relative_reset() {
        let rl = state();
        rl.mark_limited(None, Some(Duration::from_secs(30)));
        assert!(rl.is_limited());
        assert_eq!(rl.limit_count(), 1);
        let remaining = rl.time_until_reset().unwrap();
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining > Duration::from_secs(25));
    }

    #[tokio::test]
    async fn auto_clears_after_window() {
        let rl = state();
        rl.mark_limited(None, Some(Duration::from_millis(20)));
        assert!(rl.is_limited());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!rl.is_limited());
        // The clearing read dropped the deadline entirely.
        assert!(rl.time_until_reset().is_none());
        // The count survives the auto-clear.
        assert_eq!(rl.limit_count(), 1);
    }

    #[test]
    fn absolute_deadline_wins_over_relative() {
        let rl = state();
        rl.mark_limited(
            Some(Instant::now() + Duration::from_secs(120)),
            Some(Duration::from_secs(5)),
        );
        assert!(rl.time_until_reset().unwrap() > Duration::from_secs(100));
    }

    #[test]
    fn clear_and_reset() {
        let rl = state();
        rl.mark_limited(None, None);
        assert!(rl.is_limited());
        rl.clear_limit();
        assert!(!rl.is_limited());
        assert_eq!(rl.limit_count(), 1);
        rl.reset();
        assert_eq!(rl.limit_count(), 0);
    }

    #[test]
    fn disabled_never_limits() {
        let rl = RateLimitState::new(
            "off",
            RateLimitConfig {
                enabled: false,
                ..Default::default()
            },
        );
        rl.mark_limited(None, None);
        assert!(!rl.is_limited());
    }
}
