//! Passive token-usage collector.
//!
//! The orchestrator only emits `tokens_used` events; this is the
//! reference consumer, wired up through `on_tokens_used`.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::events::TokenEvent;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub requests: u64,
}

#[derive(Debug, Default)]
struct TrackerInner {
    events: Vec<TokenEvent>,
    per_provider: HashMap<String, TokenTotals>,
}

#[derive(Debug, Default)]
pub struct TokenTracker {
    inner: Mutex<TrackerInner>,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &TokenEvent) {
        let mut inner = self.inner.lock();
        let totals = inner
            .per_provider
            .entry(event.provider.clone())
            .or_default();
        totals.input += event.input_tokens;
        totals.output += event.output_tokens;
        totals.total += event.total_tokens;
        totals.requests += 1;
        inner.events.push(event.clone());
    }

    pub fn totals(&self) -> HashMap<String, TokenTotals> {
        self.inner.lock().per_provider.clone()
    }

    pub fn totals_for(&self, provider: &str) -> Option<TokenTotals> {
        self.inner.lock().per_provider.get(provider).copied()
    }

    pub fn total_tokens(&self) -> u64 {
        self.inner
            .lock()
            .per_provider
            .values()
            .map(|t| t.total)
            .sum()
    }

    pub fn events(&self) -> Vec<TokenEvent> {
        self.inner.lock().events.clone()
    }

    pub fn reset(&self) {
        *self.inner.lock() = TrackerInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(provider: &str, input: u64, output: u64) -> TokenEvent {
        TokenEvent {
            provider: provider.into(),
            model: None,
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
            at: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[test]
    fn accumulates_per_provider() {
        let tracker = TokenTracker::new();
        tracker.record(&event("claude", 100, 50));
        tracker.record(&event("claude", 20, 10));
        tracker.record(&event("gemini", 5, 5));

        let claude = tracker.totals_for("claude").unwrap();
        assert_eq!(claude.input, 120);
        assert_eq!(claude.output, 60);
        assert_eq!(claude.total, 180);
        assert_eq!(claude.requests, 2);
        assert_eq!(tracker.total_tokens(), 190);
        assert_eq!(tracker.events().len(), 3);
    }

    #[test]
    fn reset_clears_state() {
        let tracker = TokenTracker::new();
        tracker.record(&event("claude", 1, 1));
        tracker.reset();
        assert_eq!(tracker.total_tokens(), 0);
        assert!(tracker.events().is_empty());
    }
}
