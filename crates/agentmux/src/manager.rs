//! Provider manager: owns the per-provider fault-tolerance state and
//! decides which adapter a call should go to.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::breaker::{CircuitBreaker, CircuitState, CircuitTransition};
use crate::config::Configuration;
use crate::errors::{Error, Result};
use crate::events::{CallbackBus, SwitchEvent};
use crate::exec::CommandExecutor;
use crate::health::HealthWindow;
use crate::providers::{AdapterContext, ProviderAdapter};
use crate::rate_limit::RateLimitState;
use crate::registry::ProviderRegistry;

/// Fault-tolerance state for one provider. The manager owns exactly one
/// of these per enabled provider.
struct ProviderState {
    breaker: CircuitBreaker,
    rate_limit: RateLimitState,
    health: HealthWindow,
}

/// One row of `health_status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthReport {
    pub provider: String,
    pub healthy: bool,
    pub circuit_state: CircuitState,
    pub circuit_open: bool,
    pub rate_limited: bool,
    pub success_rate: f64,
}

pub struct ProviderManager {
    config: Arc<Configuration>,
    registry: Arc<ProviderRegistry>,
    executor: Arc<dyn CommandExecutor>,
    events: Arc<CallbackBus>,
    states: HashMap<String, ProviderState>,
    /// Memoized at construction; order is load-bearing for fallback.
    fallback_chains: HashMap<String, Vec<String>>,
    instances: Mutex<HashMap<String, Arc<dyn ProviderAdapter>>>,
    current: Mutex<String>,
}

impl ProviderManager {
    pub fn new(
        config: Arc<Configuration>,
        registry: Arc<ProviderRegistry>,
        executor: Arc<dyn CommandExecutor>,
        events: Arc<CallbackBus>,
    ) -> Result<Self> {
        config.validate()?;

        let enabled = config.enabled_providers();
        let mut states = HashMap::new();
        let mut fallback_chains = HashMap::new();

        for name in &enabled {
            states.insert(
                name.clone(),
                ProviderState {
                    breaker: CircuitBreaker::new(
                        name.clone(),
                        config.orchestration.circuit_breaker.clone(),
                    ),
                    rate_limit: RateLimitState::new(
                        name.clone(),
                        config.orchestration.rate_limit.clone(),
                    ),
                    health: HealthWindow::new(config.orchestration.health.clone()),
                },
            );
            fallback_chains.insert(name.clone(), Self::build_chain(name, &config, &enabled));
        }

        Ok(Self {
            current: Mutex::new(config.default_provider.clone()),
            config,
            registry,
            executor,
            events,
            states,
            fallback_chains,
            instances: Mutex::new(HashMap::new()),
        })
    }

    /// `[p] ++ fallback_providers ++ enabled providers`, deduplicated
    /// preserving first occurrence.
    fn build_chain(name: &str, config: &Configuration, enabled: &[String]) -> Vec<String> {
        let mut chain = Vec::new();
        let mut push = |candidate: &String| {
            if !chain.contains(candidate) {
                chain.push(candidate.clone());
            }
        };
        push(&name.to_string());
        for candidate in &config.fallback_providers {
            push(candidate);
        }
        for candidate in enabled {
            push(candidate);
        }
        chain
    }

    pub fn current_provider(&self) -> String {
        self.current.lock().clone()
    }

    /// The central decision: hand back an adapter for `preferred` when it
    /// is fit to serve, otherwise the first fit provider on its fallback
    /// chain.
    pub fn select(&self, preferred: Option<&str>) -> Result<Arc<dyn ProviderAdapter>> {
        let name = match preferred {
            Some(name) => self
                .registry
                .resolve(name)
                .ok_or_else(|| Error::ProviderNotFound(name.to_string()))?,
            None => self.current_provider(),
        };

        if !self.states.contains_key(&name) {
            return Err(Error::ProviderNotFound(name));
        }

        if self.circuit_open(&name) {
            self.select_fallback(&name, "circuit_open")
        } else if self.rate_limited(&name) {
            self.select_fallback(&name, "rate_limited")
        } else if !self.healthy(&name) {
            self.select_fallback(&name, "unhealthy")
        } else {
            self.adapter_for(&name)
        }
    }

    /// Walk the fallback chain for `unfit`, skipping it and anything
    /// else that is open, limited or unhealthy.
    pub fn select_fallback(&self, unfit: &str, reason: &str) -> Result<Arc<dyn ProviderAdapter>> {
        let chain = self
            .fallback_chains
            .get(unfit)
            .cloned()
            .unwrap_or_else(|| vec![unfit.to_string()]);

        let mut attempted = Vec::new();
        let mut reasons = HashMap::new();
        reasons.insert(unfit.to_string(), reason.to_string());

        for candidate in &chain {
            attempted.push(candidate.clone());
            if candidate == unfit {
                continue;
            }
            if self.circuit_open(candidate) {
                reasons.insert(candidate.clone(), "circuit_open".into());
                continue;
            }
            if self.rate_limited(candidate) {
                reasons.insert(candidate.clone(), "rate_limited".into());
                continue;
            }
            if !self.healthy(candidate) {
                reasons.insert(candidate.clone(), "unhealthy".into());
                continue;
            }
            debug!(from = unfit, to = %candidate, reason, "fallback selected");
            return self.adapter_for(candidate);
        }

        warn!(provider = unfit, reason, "no providers left to fall back to");
        Err(Error::NoProvidersAvailable { attempted, reasons })
    }

    /// Fail over away from the current provider, emitting the switch
    /// event and updating `current_provider`.
    pub fn switch_provider(
        &self,
        reason: &str,
        context: Option<&str>,
    ) -> Result<Arc<dyn ProviderAdapter>> {
        let from = self.current_provider();
        let adapter = self.select_fallback(&from, reason)?;
        let to = adapter.name().to_string();
        *self.current.lock() = to.clone();

        info!(from = %from, to = %to, reason, "provider switch");
        self.events.emit_provider_switch(&SwitchEvent {
            from,
            to,
            reason: reason.to_string(),
            context: context.map(String::from),
            at: Utc::now(),
        });
        Ok(adapter)
    }

    pub fn record_success(&self, provider: &str) {
        if let Some(state) = self.states.get(provider) {
            state.health.record_success();
            if state.breaker.record_success() == Some(CircuitTransition::Closed) {
                self.events.emit_circuit_close(provider);
            }
        }
    }

    pub fn record_failure(&self, provider: &str) {
        if let Some(state) = self.states.get(provider) {
            state.health.record_failure();
            if state.breaker.record_failure() == Some(CircuitTransition::Opened) {
                self.events.emit_circuit_open(provider);
            }
        }
    }

    pub fn mark_rate_limited(&self, provider: &str, reset_at: Option<DateTime<Utc>>) {
        if let Some(state) = self.states.get(provider) {
            let reset_in = reset_at.and_then(|at| {
                let delta = at - Utc::now();
                delta.to_std().ok().filter(|d| *d > Duration::ZERO)
            });
            state.rate_limit.mark_limited(None, reset_in);
        }
    }

    pub fn circuit_open(&self, provider: &str) -> bool {
        self.states
            .get(provider)
            .map(|s| s.breaker.is_open())
            .unwrap_or(false)
    }

    pub fn rate_limited(&self, provider: &str) -> bool {
        self.states
            .get(provider)
            .map(|s| s.rate_limit.is_limited())
            .unwrap_or(false)
    }

    pub fn healthy(&self, provider: &str) -> bool {
        self.states
            .get(provider)
            .map(|s| s.health.is_healthy())
            .unwrap_or(false)
    }

    /// Providers currently fit to serve a request.
    pub fn available_providers(&self) -> Vec<String> {
        self.config
            .enabled_providers()
            .into_iter()
            .filter(|name| {
                !self.circuit_open(name) && !self.rate_limited(name) && self.healthy(name)
            })
            .collect()
    }

    pub fn health_status(&self) -> Vec<ProviderHealthReport> {
        self.config
            .enabled_providers()
            .into_iter()
            .filter_map(|name| {
                let state = self.states.get(&name)?;
                Some(ProviderHealthReport {
                    healthy: state.health.is_healthy(),
                    circuit_state: state.breaker.state(),
                    circuit_open: state.breaker.is_open(),
                    rate_limited: state.rate_limit.is_limited(),
                    success_rate: state.health.success_rate(),
                    provider: name,
                })
            })
            .collect()
    }

    /// Back to the post-construction state.
    pub fn reset(&self) {
        for state in self.states.values() {
            state.breaker.reset();
            state.rate_limit.reset();
            state.health.reset();
        }
        *self.current.lock() = self.config.default_provider.clone();
    }

    /// Adapter by (possibly aliased) name, bypassing the fitness checks.
    pub fn adapter(&self, provider: &str) -> Result<Arc<dyn ProviderAdapter>> {
        let name = self
            .registry
            .resolve(provider)
            .ok_or_else(|| Error::ProviderNotFound(provider.to_string()))?;
        self.adapter_for(&name)
    }

    fn adapter_for(&self, provider: &str) -> Result<Arc<dyn ProviderAdapter>> {
        let mut instances = self.instances.lock();
        if let Some(adapter) = instances.get(provider) {
            return Ok(Arc::clone(adapter));
        }
        let entry = self.registry.get(provider)?;
        let provider_config = self
            .config
            .provider(provider)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(provider.to_string()))?;
        let adapter = (entry.factory)(AdapterContext {
            executor: Arc::clone(&self.executor),
            config: provider_config,
            events: Arc::clone(&self.events),
        });
        instances.insert(provider.to_string(), Arc::clone(&adapter));
        Ok(adapter)
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("current", &self.current_provider())
            .field("providers", &self.states.keys().collect::<Vec<_>>())
            .finish()
    }
}
