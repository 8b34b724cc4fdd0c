//! Concurrency-safe metric aggregation for the dispatcher.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// How many recent provider switches the snapshot reports.
const SWITCH_HISTORY: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Per-request wall-clock durations of successful calls.
    #[serde(skip)]
    pub durations: Vec<Duration>,
}

impl ProviderCounters {
    pub fn avg_duration(&self) -> Option<Duration> {
        if self.durations.is_empty() {
            return None;
        }
        let total: Duration = self.durations.iter().sum();
        Some(total / self.durations.len() as u32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchRecord {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    total_attempts: u64,
    total_successes: u64,
    total_failures: u64,
    total_switches: u64,
    per_provider: HashMap<String, ProviderCounters>,
    error_counts: HashMap<String, u64>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    recent_switches: VecDeque<SwitchRecord>,
}

/// Read-consistent view of the metrics at one instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_attempts: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_switches: u64,
    pub per_provider: HashMap<String, ProviderCounters>,
    pub error_counts: HashMap<String, u64>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub recent_switches: Vec<SwitchRecord>,
}

impl MetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 1.0;
        }
        self.total_successes as f64 / self.total_attempts as f64
    }
}

/// All mutations go through one mutex, which is what makes the snapshot
/// read-consistent and keeps the totals equal to the per-provider sums.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<MetricsInner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, provider: &str) {
        let mut inner = self.inner.lock();
        inner.total_attempts += 1;
        inner.per_provider.entry(provider.to_string()).or_default().attempts += 1;
    }

    pub fn record_success(&self, provider: &str, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;
        inner.last_success_at = Some(Utc::now());
        let counters = inner.per_provider.entry(provider.to_string()).or_default();
        counters.successes += 1;
        counters.durations.push(duration);
    }

    pub fn record_failure(&self, provider: &str, error_label: &str) {
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.last_failure_at = Some(Utc::now());
        inner.per_provider.entry(provider.to_string()).or_default().failures += 1;
        *inner.error_counts.entry(error_label.to_string()).or_insert(0) += 1;
    }

    pub fn record_switch(&self, from: &str, to: &str, reason: &str) {
        let mut inner = self.inner.lock();
        inner.total_switches += 1;
        if inner.recent_switches.len() == SWITCH_HISTORY {
            inner.recent_switches.pop_front();
        }
        inner.recent_switches.push_back(SwitchRecord {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        MetricsSnapshot {
            total_attempts: inner.total_attempts,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_switches: inner.total_switches,
            per_provider: inner.per_provider.clone(),
            error_counts: inner.error_counts.clone(),
            last_success_at: inner.last_success_at,
            last_failure_at: inner.last_failure_at,
            recent_switches: inner.recent_switches.iter().cloned().collect(),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = MetricsInner::default();
    }
}
