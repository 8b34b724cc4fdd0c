//! The outer control loop: select a provider, invoke it, classify the
//! failure, update state, then retry, switch or give up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::errors::{Error, Result};
use crate::manager::{ProviderHealthReport, ProviderManager};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::providers::{AgentResponse, ProviderAdapter, SendOptions};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureStrategy {
    /// Try another provider if auto-switch is on.
    Switch,
    /// Sleep out the backoff, then try again (same provider unless its
    /// state changed underneath us).
    Retry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorStatus {
    pub current_provider: String,
    pub available_providers: Vec<String>,
    pub health: Vec<ProviderHealthReport>,
    pub metrics: MetricsSnapshot,
}

pub struct Conductor {
    config: Arc<Configuration>,
    manager: Arc<ProviderManager>,
    metrics: Arc<Metrics>,
}

impl Conductor {
    pub fn new(config: Arc<Configuration>, manager: Arc<ProviderManager>) -> Self {
        Self {
            config,
            manager,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn manager(&self) -> &ProviderManager {
        &self.manager
    }

    /// Orchestrated send: provider selection, retry with backoff and
    /// transparent failover, bounded by the retry policy.
    pub async fn send(
        &self,
        prompt: &str,
        preferred: Option<&str>,
        options: &SendOptions,
    ) -> Result<AgentResponse> {
        let retry = &self.config.orchestration.retry;
        let mut retries: u32 = 0;
        let mut preferred: Option<String> = preferred.map(String::from);
        let mut attempted: Vec<String> = Vec::new();

        loop {
            let adapter = self.manager.select(preferred.as_deref())?;
            // Track the provider actually chosen; a fallback pick becomes
            // the preference for the next round.
            let provider = adapter.name().to_string();
            preferred = Some(provider.clone());
            attempted.push(provider.clone());
            self.metrics.record_attempt(&provider);

            let started = Instant::now();
            debug!(provider = %provider, attempt = retries + 1, "dispatching");

            let err = match adapter.send(prompt, options).await {
                Ok(response) => {
                    self.metrics.record_success(&provider, started.elapsed());
                    self.manager.record_success(&provider);
                    info!(
                        provider = %provider,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "request served"
                    );
                    return Ok(response);
                }
                Err(err) => err,
            };

            retries += 1;
            let give_up = !self.should_retry(retries, retry.max_attempts);

            match &err {
                Error::RateLimited { reset_at, .. } => {
                    self.manager.mark_rate_limited(&provider, *reset_at);
                    self.handle_failure(&err, &provider, FailureStrategy::Switch)
                        .await;
                    if give_up {
                        return Err(err);
                    }
                }
                Error::CircuitOpen { .. } => {
                    self.handle_failure(&err, &provider, FailureStrategy::Switch)
                        .await;
                    if give_up {
                        return Err(err);
                    }
                }
                Error::Timeout { .. } | Error::Provider { .. } => {
                    self.manager.record_failure(&provider);
                    self.handle_failure(&err, &provider, FailureStrategy::Retry)
                        .await;
                    if give_up {
                        return Err(err);
                    }
                }
                Error::Authentication { .. } => {
                    self.manager.record_failure(&provider);
                    self.handle_failure(&err, &provider, FailureStrategy::Switch)
                        .await;
                    if give_up {
                        return Err(err);
                    }
                }
                // Terminal: never retried around, never wrapped.
                Error::NoProvidersAvailable { .. } => return Err(err),
                _ => {
                    self.manager.record_failure(&provider);
                    self.handle_failure(&err, &provider, FailureStrategy::Switch)
                        .await;
                    if give_up {
                        return Err(Error::Provider {
                            provider,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Unorchestrated send: no fallback, no retry, no state updates. The
    /// adapter's error surfaces as-is.
    pub async fn execute_direct(
        &self,
        prompt: &str,
        provider: &str,
        options: &SendOptions,
    ) -> Result<AgentResponse> {
        let adapter = self.manager.adapter(provider)?;
        adapter.send(prompt, options).await
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.manager.adapter(name)
    }

    pub fn status(&self) -> ConductorStatus {
        ConductorStatus {
            current_provider: self.manager.current_provider(),
            available_providers: self.manager.available_providers(),
            health: self.manager.health_status(),
            metrics: self.metrics.snapshot(),
        }
    }

    pub fn reset(&self) {
        self.manager.reset();
        self.metrics.reset();
    }

    fn should_retry(&self, retries: u32, max_attempts: u32) -> bool {
        self.config.orchestration.retry.enabled && retries < max_attempts
    }

    async fn handle_failure(&self, err: &Error, provider: &str, strategy: FailureStrategy) {
        self.metrics.record_failure(provider, err.label());
        warn!(provider = %provider, error = %err, strategy = ?strategy, "attempt failed");

        match strategy {
            FailureStrategy::Switch if self.config.orchestration.auto_switch_on_error => {
                match self
                    .manager
                    .switch_provider(err.label(), Some(&err.to_string()))
                {
                    Ok(next) => {
                        self.metrics.record_switch(provider, next.name(), err.label());
                    }
                    // Swallowed: the outer loop surfaces the exhaustion on
                    // its next select or when retries run out.
                    Err(Error::NoProvidersAvailable { .. }) => {}
                    Err(other) => {
                        warn!(error = %other, "switch attempt failed");
                    }
                }
            }
            FailureStrategy::Switch => {}
            FailureStrategy::Retry => {
                let delay = self.calculate_retry_delay();
                if delay > Duration::ZERO {
                    debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Base delay with optional jitter, capped by `max_delay`.
    // TODO: apply `retry.exponential_base` per attempt once maintainers
    // confirm the intended curve; today the delay does not compound.
    fn calculate_retry_delay(&self) -> Duration {
        let retry = &self.config.orchestration.retry;
        let base = retry.base_delay.as_secs_f64();
        let delay = if retry.jitter {
            base * (1.0 + rand::thread_rng().gen::<f64>() * 0.5)
        } else {
            base
        };
        Duration::from_secs_f64(delay.min(retry.max_delay.as_secs_f64()))
    }
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor")
            .field("current_provider", &self.manager.current_provider())
            .finish()
    }
}
