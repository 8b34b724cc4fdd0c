//! agentmux: a resilient dispatcher for CLI-backed AI coding agents.
//!
//! A caller hands in a prompt; the dispatcher picks one of the installed
//! agent binaries (`claude`, `cursor-agent`, `gemini`, ...), runs it,
//! and delivers a uniform [`AgentResponse`]. The caller never learns
//! which binary ran, whether it retried, or whether it failed over to
//! another provider.
//!
//! ```no_run
//! use agentmux::{Agentmux, Configuration, SendOptions};
//!
//! # async fn demo() -> agentmux::Result<()> {
//! let config = Configuration::builder()
//!     .provider("claude", |p| p.model("claude-sonnet-4"))
//!     .provider("gemini", |p| p.priority(1))
//!     .default_provider("claude")
//!     .fallback_providers(vec!["gemini".into()])
//!     .build()?;
//!
//! let mux = Agentmux::new(config)?;
//! let response = mux.send_message("fix the failing test", None, &SendOptions::default()).await?;
//! println!("{} (via {})", response.output, response.provider);
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod conductor;
pub mod config;
pub mod errors;
pub mod events;
pub mod exec;
pub mod health;
pub mod manager;
pub mod metrics;
pub mod providers;
pub mod rate_limit;
pub mod registry;
pub mod taxonomy;
pub mod tracker;

use std::sync::Arc;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use conductor::{Conductor, ConductorStatus};
pub use config::{Configuration, ConfigurationBuilder, ProviderConfig, RetryConfig};
pub use errors::{Error, Result};
pub use events::{CallbackBus, SwitchEvent, TokenEvent};
pub use exec::{CommandExecutor, CommandSpec, ExecOutput, ProcessExecutor};
pub use health::{HealthConfig, HealthWindow};
pub use manager::{ProviderHealthReport, ProviderManager};
pub use metrics::{Metrics, MetricsSnapshot};
pub use providers::{
    AdapterContext, AgentResponse, Capabilities, ProviderAdapter, SendOptions, TokenUsage,
};
pub use rate_limit::{RateLimitConfig, RateLimitState};
pub use registry::{ProviderEntry, ProviderRegistry};
pub use taxonomy::{classify_message, ErrorCategory, RecoveryAction};
pub use tracker::{TokenTracker, TokenTotals};

/// The assembled dispatcher: conductor + manager + registry + token
/// tracker behind one handle.
pub struct Agentmux {
    conductor: Arc<Conductor>,
    manager: Arc<ProviderManager>,
    registry: Arc<ProviderRegistry>,
    events: Arc<CallbackBus>,
    tracker: Arc<TokenTracker>,
}

impl Agentmux {
    /// Dispatcher over the builtin providers and real subprocesses.
    pub fn new(config: Configuration) -> Result<Self> {
        Self::with_parts(
            config,
            ProviderRegistry::with_builtins(),
            Arc::new(ProcessExecutor::new()),
        )
    }

    /// Full control over registry and executor (custom providers,
    /// scripted executors in tests).
    pub fn with_parts(
        config: Configuration,
        registry: ProviderRegistry,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let events = Arc::new(CallbackBus::new());

        let tracker = Arc::new(TokenTracker::new());
        let sink = Arc::clone(&tracker);
        events.on_tokens_used(move |event| sink.record(event));

        let manager = Arc::new(ProviderManager::new(
            Arc::clone(&config),
            Arc::clone(&registry),
            executor,
            Arc::clone(&events),
        )?);
        let conductor = Arc::new(Conductor::new(config, Arc::clone(&manager)));

        Ok(Self {
            conductor,
            manager,
            registry,
            events,
            tracker,
        })
    }

    /// Orchestrated send, the primary entry point.
    pub async fn send_message(
        &self,
        prompt: &str,
        preferred: Option<&str>,
        options: &SendOptions,
    ) -> Result<AgentResponse> {
        self.conductor.send(prompt, preferred, options).await
    }

    /// One provider, no orchestration.
    pub async fn execute_direct(
        &self,
        prompt: &str,
        provider: &str,
        options: &SendOptions,
    ) -> Result<AgentResponse> {
        self.conductor.execute_direct(prompt, provider, options).await
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.manager.adapter(name)
    }

    pub fn conductor(&self) -> &Conductor {
        &self.conductor
    }

    pub fn manager(&self) -> &ProviderManager {
        &self.manager
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn token_tracker(&self) -> &TokenTracker {
        &self.tracker
    }

    pub fn status(&self) -> ConductorStatus {
        self.conductor.status()
    }

    pub fn on_tokens_used(&self, listener: impl Fn(&TokenEvent) + Send + Sync + 'static) {
        self.events.on_tokens_used(listener);
    }

    pub fn on_provider_switch(&self, listener: impl Fn(&SwitchEvent) + Send + Sync + 'static) {
        self.events.on_provider_switch(listener);
    }

    pub fn on_circuit_open(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.events.on_circuit_open(listener);
    }

    pub fn on_circuit_close(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.events.on_circuit_close(listener);
    }

    /// Reset manager state, metrics and the token tracker.
    pub fn reset(&self) {
        self.conductor.reset();
        self.tracker.reset();
    }
}

impl std::fmt::Debug for Agentmux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agentmux")
            .field("current_provider", &self.manager.current_provider())
            .finish()
    }
}
