//! Provider adapter contract and the builtin CLI adapters.
//!
//! Every adapter is a thin translator between the generic
//! "build argv + parse result" contract and one concrete agent binary.
//! Orchestration logic never special-cases a provider; anything
//! binary-specific (prompt on stdin, dangerous-mode flags, session
//! resumption) is expressed through the contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::{ProviderConfig, DEFAULT_TIMEOUT};
use crate::errors::{Error, Result};
use crate::events::{CallbackBus, TokenEvent};
use crate::exec::{CommandExecutor, CommandSpec, ExecOutput};
use crate::taxonomy::{classify_message, ErrorCategory, ErrorPatterns};

pub mod aider;
pub mod claude;
pub mod codex;
pub mod copilot;
pub mod cursor;
pub mod gemini;
pub mod kilocode;
pub mod opencode;

pub use aider::AiderAdapter;
pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use copilot::CopilotAdapter;
pub use cursor::CursorAdapter;
pub use gemini::GeminiAdapter;
pub use kilocode::KilocodeAdapter;
pub use opencode::OpencodeAdapter;

/// Per-call options layered over the provider config. `options.X`
/// overrides `config.X`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub model: Option<String>,
    pub timeout: Option<Duration>,
    /// Skip the agent's permission prompts (only honored by adapters
    /// reporting `dangerous_mode` capability).
    pub dangerous: bool,
    /// Resume a previous agent session, for adapters that support it.
    pub session_id: Option<String>,
    pub env: HashMap<String, String>,
    /// Extra argv appended after the config's `default_flags`.
    pub extra_flags: Vec<String>,
}

/// Token usage extracted from an agent's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

/// The uniform result delivered to callers, whichever binary ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub output: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub provider: String,
    pub model: Option<String>,
    pub tokens: Option<TokenUsage>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Populated from classified stderr/stdout on non-zero exit.
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl AgentResponse {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// What an adapter can do, all defaulting to off.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub streaming: bool,
    pub file_upload: bool,
    pub vision: bool,
    pub tool_use: bool,
    pub json_mode: bool,
    pub mcp: bool,
    pub dangerous_mode: bool,
}

/// Network endpoints an agent binary needs through a firewall.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirewallRequirements {
    pub domains: Vec<String>,
    pub ip_ranges: Vec<String>,
}

/// Project files an agent reads for standing instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionFile {
    pub path: String,
    pub description: String,
    pub symlink: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub family: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    pub status: String,
    pub enabled: bool,
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
}

/// Everything an adapter instance needs besides its own identity: the
/// executor it runs through, its provider config and the event bus for
/// token-usage reporting.
#[derive(Clone)]
pub struct AdapterContext {
    pub executor: Arc<dyn CommandExecutor>,
    pub config: ProviderConfig,
    pub events: Arc<CallbackBus>,
}

impl std::fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterContext")
            .field("config", &self.config)
            .finish()
    }
}

/// The provider adapter contract.
///
/// Required: identity, `build_command` and the context accessor. The
/// provided `send` implements the shared base flow; `parse_response`
/// has a sensible default most adapters keep.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    fn binary_name(&self) -> &str;

    fn context(&self) -> &AdapterContext;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Provider-specific classification patterns, tried before the
    /// generic taxonomy table.
    fn error_patterns(&self) -> ErrorPatterns {
        Vec::new()
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements::default()
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        Vec::new()
    }

    async fn discover_models(&self) -> Vec<ModelInfo> {
        Vec::new()
    }

    /// Normalize a provider model name to its family (e.g. strip a
    /// release-date suffix). Passthrough by default.
    fn model_family(&self, model: &str) -> String {
        model.to_string()
    }

    /// The provider's own spelling of a model family. Passthrough by
    /// default.
    fn provider_model_name(&self, family: &str) -> String {
        family.to_string()
    }

    fn supports_model_family(&self, family: &str) -> bool {
        let models = &self.context().config.models;
        models.is_empty() || models.iter().any(|m| self.model_family(m) == family)
    }

    fn supports_mcp(&self) -> bool {
        self.capabilities().mcp
    }

    async fn fetch_mcp_servers(&self) -> Result<Vec<McpServer>> {
        Ok(Vec::new())
    }

    fn supports_dangerous_mode(&self) -> bool {
        self.capabilities().dangerous_mode
    }

    fn dangerous_mode_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn supports_sessions(&self) -> bool {
        false
    }

    fn session_flags(&self, _session_id: &str) -> Vec<String> {
        Vec::new()
    }

    fn validate_config(&self) -> ValidationReport {
        let config = &self.context().config;
        let mut errors = Vec::new();
        if let Some(model) = &config.model {
            if !config.models.is_empty() && !config.models.contains(model) {
                errors.push(format!(
                    "model `{model}` is not in the configured model list"
                ));
            }
        }
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn health_status(&self) -> HealthStatus {
        if self.available() {
            HealthStatus {
                healthy: true,
                message: format!("binary `{}` found on PATH", self.binary_name()),
            }
        } else {
            HealthStatus {
                healthy: false,
                message: format!("binary `{}` not found on PATH", self.binary_name()),
            }
        }
    }

    fn available(&self) -> bool {
        self.context().executor.which(self.binary_name()).is_some()
    }

    /// Adapter-specific argv construction. The returned spec carries the
    /// prompt either in argv or as stdin payload.
    fn build_command(&self, prompt: &str, options: &SendOptions) -> Result<CommandSpec>;

    /// Extra environment for the child. Defaults to the caller-supplied
    /// map alone.
    fn build_env(&self, options: &SendOptions) -> HashMap<String, String> {
        options.env.clone()
    }

    /// Turn raw process output into a response. The default maps stdout
    /// to `output` and, on non-zero exit, fills `error` from stderr (or
    /// stdout when stderr is empty).
    fn parse_response(&self, output: ExecOutput, options: &SendOptions) -> AgentResponse {
        let error = if output.success() {
            None
        } else {
            let text = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            Some(text.to_string())
        };
        AgentResponse {
            output: output.stdout,
            exit_code: output.exit_code,
            duration: output.duration,
            provider: self.name().to_string(),
            model: self.resolve_model(options),
            tokens: None,
            metadata: HashMap::new(),
            error,
            at: Utc::now(),
        }
    }

    /// `options.model` over `config.model`.
    fn resolve_model(&self, options: &SendOptions) -> Option<String> {
        options
            .model
            .clone()
            .or_else(|| self.context().config.model.clone())
    }

    /// The resolved per-call timeout: options, then config, then default.
    fn resolve_timeout(&self, options: &SendOptions) -> Duration {
        options
            .timeout
            .or(self.context().config.timeout)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Base send flow shared by every adapter: build, execute, parse,
    /// report tokens, and translate failures into typed errors through
    /// this adapter's classification patterns.
    async fn send(&self, prompt: &str, options: &SendOptions) -> Result<AgentResponse> {
        let spec = match self.build_command(prompt, options) {
            Ok(spec) => spec.env(self.build_env(options)),
            Err(err) => return Err(self.classify_failure(err)),
        };
        let started = Instant::now();

        debug!(provider = self.name(), argv = ?spec.argv, "dispatching prompt");

        let output = match self.context().executor.execute(spec).await {
            Ok(output) => output,
            Err(err) => return Err(self.classify_failure(err)),
        };

        let response = self.parse_response(output, options);

        // CLI agents signal rate limits and credential problems only
        // through exit status plus text; surface those as typed errors so
        // the conductor can switch instead of handing back a dead result.
        if !response.success() {
            if let Some(message) = &response.error {
                match classify_message(message, Some(&self.error_patterns())) {
                    ErrorCategory::RateLimited | ErrorCategory::QuotaExceeded => {
                        return Err(Error::RateLimited {
                            provider: self.name().to_string(),
                            reset_at: None,
                            message: message.clone(),
                        });
                    }
                    ErrorCategory::AuthExpired => {
                        return Err(Error::Authentication {
                            provider: self.name().to_string(),
                            message: message.clone(),
                        });
                    }
                    ErrorCategory::Timeout => {
                        return Err(Error::Timeout {
                            timeout: self.resolve_timeout(options),
                        });
                    }
                    _ => {}
                }
            }
        }

        if let Some(tokens) = response.tokens {
            self.context().events.emit_tokens_used(&TokenEvent {
                provider: self.name().to_string(),
                model: response.model.clone(),
                input_tokens: tokens.input,
                output_tokens: tokens.output,
                total_tokens: tokens.total,
                at: Utc::now(),
                request_id: Uuid::new_v4().to_string(),
            });
        }

        debug!(
            provider = self.name(),
            exit_code = response.exit_code,
            duration_ms = started.elapsed().as_millis() as u64,
            "agent binary finished"
        );

        Ok(response)
    }

    /// Map an executor-level error into the typed hierarchy using this
    /// adapter's patterns, preserving the original message.
    fn classify_failure(&self, err: Error) -> Error {
        match err {
            Error::Timeout { .. } => err,
            Error::CommandExecution(message) => {
                match classify_message(&message, Some(&self.error_patterns())) {
                    ErrorCategory::RateLimited | ErrorCategory::QuotaExceeded => {
                        Error::RateLimited {
                            provider: self.name().to_string(),
                            reset_at: None,
                            message,
                        }
                    }
                    ErrorCategory::AuthExpired => Error::Authentication {
                        provider: self.name().to_string(),
                        message,
                    },
                    _ => Error::Provider {
                        provider: self.name().to_string(),
                        message,
                    },
                }
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for dyn ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("name", &self.name())
            .finish()
    }
}

/// Shared argv assembly for the common layout
/// `binary [base_flags] [default_flags] [model flag] [session/dangerous flags] [extra] <prompt flag> <prompt>`.
pub(crate) fn assemble_argv(
    adapter: &dyn ProviderAdapter,
    options: &SendOptions,
    base_flags: &[&str],
    model_flag: Option<&str>,
    prompt_flag: &str,
    prompt: Option<&str>,
) -> Vec<String> {
    let config = &adapter.context().config;
    let mut argv = vec![adapter.binary_name().to_string()];
    argv.extend(base_flags.iter().map(|s| s.to_string()));
    argv.extend(config.default_flags.iter().cloned());

    if let (Some(flag), Some(model)) = (model_flag, adapter.resolve_model(options)) {
        argv.push(flag.to_string());
        argv.push(adapter.provider_model_name(&model));
    }

    if options.dangerous && adapter.supports_dangerous_mode() {
        argv.extend(adapter.dangerous_mode_flags());
    }

    if let Some(session) = &options.session_id {
        if adapter.supports_sessions() {
            argv.extend(adapter.session_flags(session));
        }
    }

    argv.extend(options.extra_flags.iter().cloned());

    if let Some(prompt) = prompt {
        argv.push(prompt_flag.to_string());
        argv.push(prompt.to_string());
    }

    argv
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted executor for adapter unit tests.

    use super::*;
    use parking_lot::Mutex;

    pub struct ScriptedExecutor {
        pub results: Mutex<Vec<Result<ExecOutput>>>,
        #[allow(dead_code)]
        pub seen: Mutex<Vec<CommandSpec>>,
        pub known_binaries: Vec<String>,
    }

    impl ScriptedExecutor {
        pub fn new(results: Vec<Result<ExecOutput>>) -> Self {
            Self {
                results: Mutex::new(results),
                seen: Mutex::new(Vec::new()),
                known_binaries: vec![
                    "claude", "cursor-agent", "gemini", "copilot", "codex", "aider", "opencode",
                    "kilocode",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
            }
        }

        pub fn ok(stdout: &str) -> ExecOutput {
            ExecOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
                duration: Duration::from_millis(10),
            }
        }

        pub fn failed(exit_code: i32, stderr: &str) -> ExecOutput {
            ExecOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
                duration: Duration::from_millis(10),
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(&self, spec: CommandSpec) -> Result<ExecOutput> {
            self.seen.lock().push(spec);
            let mut results = self.results.lock();
            if results.is_empty() {
                Ok(Self::ok("default"))
            } else {
                results.remove(0)
            }
        }

        fn which(&self, binary: &str) -> Option<std::path::PathBuf> {
            self.known_binaries
                .iter()
                .any(|b| b == binary)
                .then(|| std::path::PathBuf::from(format!("/usr/local/bin/{binary}")))
        }
    }

    pub fn context_for(name: &str, results: Vec<Result<ExecOutput>>) -> AdapterContext {
        AdapterContext {
            executor: Arc::new(ScriptedExecutor::new(results)),
            config: ProviderConfig::new(name),
            events: Arc::new(CallbackBus::new()),
        }
    }

    pub fn context_with_config(
        config: ProviderConfig,
        results: Vec<Result<ExecOutput>>,
    ) -> AdapterContext {
        AdapterContext {
            executor: Arc::new(ScriptedExecutor::new(results)),
            config,
            events: Arc::new(CallbackBus::new()),
        }
    }
}
