//! Process-scoped configuration, immutable once built.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breaker::CircuitBreakerConfig;
use crate::errors::{Error, Result};
use crate::health::HealthConfig;
use crate::rate_limit::RateLimitConfig;

/// Fallback timeout when neither the call options nor the provider config
/// say otherwise. CLI agents routinely run for minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub enabled: bool,
    /// Lower sorts earlier when assembling default fallback chains.
    pub priority: i32,
    /// Models the operator allows on this provider; empty means "any".
    pub models: Vec<String>,
    /// Default model when the call does not pick one.
    pub model: Option<String>,
    /// Extra argv appended before the prompt-carrying flag.
    pub default_flags: Vec<String>,
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority: 0,
            models: Vec::new(),
            model: None,
            default_flags: Vec::new(),
            timeout: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn default_flags(mut self, flags: Vec<String>) -> Self {
        self.default_flags = flags;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Upper bound on attempts for one `send`, first try included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Exposed for operators but not yet applied by the delay calculation;
    /// see `Conductor::calculate_retry_delay`.
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub health: HealthConfig,
    /// Whether a failure may trigger a transparent provider switch.
    pub auto_switch_on_error: bool,
}

impl OrchestrationConfig {
    fn new() -> Self {
        Self {
            auto_switch_on_error: true,
            ..Default::default()
        }
    }
}

/// The record the orchestrator consumes. Loading it from files or the
/// environment is the host application's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub default_provider: String,
    pub fallback_providers: Vec<String>,
    pub providers: HashMap<String, ProviderConfig>,
    pub orchestration: OrchestrationConfig,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Enabled provider names, priority order then name for determinism.
    pub fn enabled_providers(&self) -> Vec<String> {
        let mut names: Vec<&ProviderConfig> =
            self.providers.values().filter(|p| p.enabled).collect();
        names.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        names.into_iter().map(|p| p.name.clone()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::Configuration(
                "at least one provider must be configured".into(),
            ));
        }
        if !self.providers.contains_key(&self.default_provider) {
            return Err(Error::Configuration(format!(
                "default provider `{}` is not among the configured providers",
                self.default_provider
            )));
        }
        for name in &self.fallback_providers {
            if !self.providers.contains_key(name) {
                return Err(Error::Configuration(format!(
                    "fallback provider `{name}` is not among the configured providers"
                )));
            }
        }
        Ok(())
    }
}

/// Typed builder for `Configuration`.
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    default_provider: Option<String>,
    fallback_providers: Vec<String>,
    providers: HashMap<String, ProviderConfig>,
    orchestration: Option<OrchestrationConfig>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = Some(name.into());
        self
    }

    pub fn fallback_providers(mut self, names: Vec<String>) -> Self {
        self.fallback_providers = names;
        self
    }

    /// Configure one provider through a closure over its config.
    pub fn provider(
        mut self,
        name: impl Into<String>,
        build: impl FnOnce(ProviderConfig) -> ProviderConfig,
    ) -> Self {
        let name = name.into();
        let config = build(ProviderConfig::new(name.clone()));
        self.providers.insert(name, config);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.orchestration_mut().circuit_breaker = config;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.orchestration_mut().retry = config;
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.orchestration_mut().rate_limit = config;
        self
    }

    pub fn health(mut self, config: HealthConfig) -> Self {
        self.orchestration_mut().health = config;
        self
    }

    pub fn auto_switch_on_error(mut self, enabled: bool) -> Self {
        self.orchestration_mut().auto_switch_on_error = enabled;
        self
    }

    fn orchestration_mut(&mut self) -> &mut OrchestrationConfig {
        self.orchestration.get_or_insert_with(OrchestrationConfig::new)
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Configuration> {
        let default_provider = self
            .default_provider
            .clone()
            .or_else(|| {
                // Fall back to the highest-priority enabled provider.
                let mut names: Vec<&ProviderConfig> = self.providers.values().collect();
                names.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
                names.first().map(|p| p.name.clone())
            })
            .ok_or_else(|| Error::Configuration("no providers configured".into()))?;

        let config = Configuration {
            default_provider,
            fallback_providers: self.fallback_providers,
            providers: self.providers,
            orchestration: self.orchestration.unwrap_or_else(OrchestrationConfig::new),
        };
        config.validate()?;
        Ok(config)
    }
}
