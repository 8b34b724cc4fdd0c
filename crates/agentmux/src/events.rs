//! Callback bus for orchestration events.
//!
//! Listener failures are contained: a panicking listener is logged and
//! skipped so it can never break another listener or the code path that
//! emitted the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Token usage reported by an adapter after a completed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    pub provider: String,
    pub model: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub at: DateTime<Utc>,
    pub request_id: String,
}

/// Emitted when the manager fails over from one provider to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchEvent {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub context: Option<String>,
    pub at: DateTime<Utc>,
}

type TokenListener = Arc<dyn Fn(&TokenEvent) + Send + Sync>;
type SwitchListener = Arc<dyn Fn(&SwitchEvent) + Send + Sync>;
type CircuitListener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    tokens_used: Vec<TokenListener>,
    provider_switch: Vec<SwitchListener>,
    circuit_open: Vec<CircuitListener>,
    circuit_close: Vec<CircuitListener>,
}

/// Registration-ordered listener lists per event.
#[derive(Default)]
pub struct CallbackBus {
    listeners: RwLock<Listeners>,
}

impl std::fmt::Debug for CallbackBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("CallbackBus")
            .field("tokens_used", &listeners.tokens_used.len())
            .field("provider_switch", &listeners.provider_switch.len())
            .field("circuit_open", &listeners.circuit_open.len())
            .field("circuit_close", &listeners.circuit_close.len())
            .finish()
    }
}

impl CallbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tokens_used(&self, listener: impl Fn(&TokenEvent) + Send + Sync + 'static) {
        self.listeners.write().tokens_used.push(Arc::new(listener));
    }

    pub fn on_provider_switch(&self, listener: impl Fn(&SwitchEvent) + Send + Sync + 'static) {
        self.listeners.write().provider_switch.push(Arc::new(listener));
    }

    pub fn on_circuit_open(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.listeners.write().circuit_open.push(Arc::new(listener));
    }

    pub fn on_circuit_close(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.listeners.write().circuit_close.push(Arc::new(listener));
    }

    pub fn emit_tokens_used(&self, event: &TokenEvent) {
        let listeners = self.listeners.read().tokens_used.clone();
        for listener in listeners {
            Self::guarded("tokens_used", || listener(event));
        }
    }

    pub fn emit_provider_switch(&self, event: &SwitchEvent) {
        let listeners = self.listeners.read().provider_switch.clone();
        for listener in listeners {
            Self::guarded("provider_switch", || listener(event));
        }
    }

    pub fn emit_circuit_open(&self, provider: &str) {
        let listeners = self.listeners.read().circuit_open.clone();
        for listener in listeners {
            Self::guarded("circuit_open", || listener(provider));
        }
    }

    pub fn emit_circuit_close(&self, provider: &str) {
        let listeners = self.listeners.read().circuit_close.clone();
        for listener in listeners {
            Self::guarded("circuit_close", || listener(provider));
        }
    }

    fn guarded(event: &str, call: impl FnOnce()) {
        if catch_unwind(AssertUnwindSafe(call)).is_err() {
            warn!(event, "event listener panicked, continuing");
        }
    }
}
