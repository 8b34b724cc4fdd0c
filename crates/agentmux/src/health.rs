//! Sliding-window health tracking per provider.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub enabled: bool,
    /// Number of recent outcomes considered.
    pub window_size: usize,
    /// Minimum success rate to count as healthy.
    pub threshold: f64,
    /// Outcomes required before the rate is trusted; below this the
    /// provider is healthy. A lone failure must not bench a provider
    /// that a retry would have served.
    pub min_samples: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: 100,
            threshold: 0.5,
            min_samples: 5,
        }
    }
}

#[derive(Debug)]
struct WindowInner {
    outcomes: VecDeque<bool>,
    successes: usize,
    failures: usize,
}

/// Bounded FIFO of the last `window_size` outcomes. The success/failure
/// counters are updated on every push and evict so they always agree with
/// the ring's contents.
#[derive(Debug)]
pub struct HealthWindow {
    config: HealthConfig,
    inner: Mutex<WindowInner>,
}

impl HealthWindow {
    pub fn new(config: HealthConfig) -> Self {
        let capacity = config.window_size.max(1);
        Self {
            config,
            inner: Mutex::new(WindowInner {
                outcomes: VecDeque::with_capacity(capacity),
                successes: 0,
                failures: 0,
            }),
        }
    }

    pub fn record_success(&self) {
        self.push(true);
    }

    pub fn record_failure(&self) {
        self.push(false);
    }

    fn push(&self, success: bool) {
        if !self.config.enabled {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.outcomes.len() == self.config.window_size.max(1) {
            if let Some(evicted) = inner.outcomes.pop_front() {
                if evicted {
                    inner.successes -= 1;
                } else {
                    inner.failures -= 1;
                }
            }
        }
        inner.outcomes.push_back(success);
        if success {
            inner.successes += 1;
        } else {
            inner.failures += 1;
        }
    }

    /// 1.0 on an empty window.
    pub fn success_rate(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.outcomes.is_empty() {
            1.0
        } else {
            inner.successes as f64 / inner.outcomes.len() as f64
        }
    }

    /// Healthy when the window is empty, too small to judge, or the rate
    /// clears the threshold.
    pub fn is_healthy(&self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let inner = self.inner.lock();
        if inner.outcomes.is_empty() || inner.outcomes.len() < self.config.min_samples {
            return true;
        }
        let rate = inner.successes as f64 / inner.outcomes.len() as f64;
        rate >= self.config.threshold
    }

    pub fn recent_successes(&self) -> usize {
        self.inner.lock().successes
    }

    pub fn recent_failures(&self) -> usize {
        self.inner.lock().failures
    }

    pub fn len(&self) -> usize {
        self.inner.lock().outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().outcomes.is_empty()
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.outcomes.clear();
        inner.successes = 0;
        inner.failures = 0;
    }
}
