//! Shared test doubles: a scripted provider adapter and a null executor.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use agentmux::{
    AdapterContext, AgentResponse, CommandExecutor, CommandSpec, Error, ExecOutput,
    ProviderAdapter, ProviderEntry, ProviderRegistry, Result, SendOptions, TokenEvent, TokenUsage,
};

/// Executor for tests whose adapters never reach a real process.
pub struct NullExecutor;

#[async_trait]
impl CommandExecutor for NullExecutor {
    async fn execute(&self, _spec: CommandSpec) -> Result<ExecOutput> {
        Err(Error::CommandExecution(
            "test executor does not run processes".into(),
        ))
    }

    fn which(&self, binary: &str) -> Option<PathBuf> {
        Some(PathBuf::from(format!("/usr/bin/{binary}")))
    }
}

/// One scripted outcome for a mock provider call.
#[derive(Clone)]
pub enum Outcome {
    Ok(&'static str),
    OkWithTokens(&'static str, u64, u64),
    RateLimited(Option<DateTime<Utc>>),
    AuthFailed,
    Timeout,
    Fail(&'static str),
}

#[derive(Clone, Default)]
pub struct Script {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    pub calls: Arc<AtomicUsize>,
}

impl Script {
    pub fn of(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Repeats the last outcome once the script runs dry.
    fn next(&self) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock();
        if outcomes.len() > 1 {
            outcomes.pop_front().expect("non-empty")
        } else {
            outcomes.front().cloned().unwrap_or(Outcome::Ok("ok"))
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct MockAdapter {
    ctx: AdapterContext,
    name: String,
    script: Script,
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn binary_name(&self) -> &str {
        "mock-agent"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn build_command(&self, prompt: &str, _options: &SendOptions) -> Result<CommandSpec> {
        Ok(CommandSpec::new(
            vec!["mock-agent".into(), prompt.into()],
            Duration::from_secs(1),
        ))
    }

    async fn send(&self, _prompt: &str, options: &SendOptions) -> Result<AgentResponse> {
        match self.script.next() {
            Outcome::Ok(output) => Ok(self.response(output, None, options)),
            Outcome::OkWithTokens(output, input, out) => {
                let response = self.response(output, Some(TokenUsage::new(input, out)), options);
                self.ctx.events.emit_tokens_used(&TokenEvent {
                    provider: self.name.clone(),
                    model: response.model.clone(),
                    input_tokens: input,
                    output_tokens: out,
                    total_tokens: input + out,
                    at: Utc::now(),
                    request_id: uuid::Uuid::new_v4().to_string(),
                });
                Ok(response)
            }
            Outcome::RateLimited(reset_at) => Err(Error::RateLimited {
                provider: self.name.clone(),
                reset_at,
                message: "429 too many requests".into(),
            }),
            Outcome::AuthFailed => Err(Error::Authentication {
                provider: self.name.clone(),
                message: "401 unauthorized".into(),
            }),
            Outcome::Timeout => Err(Error::Timeout {
                timeout: Duration::from_millis(10),
            }),
            Outcome::Fail(message) => Err(Error::Provider {
                provider: self.name.clone(),
                message: message.into(),
            }),
        }
    }
}

impl MockAdapter {
    fn response(
        &self,
        output: &str,
        tokens: Option<TokenUsage>,
        options: &SendOptions,
    ) -> AgentResponse {
        AgentResponse {
            output: output.to_string(),
            exit_code: 0,
            duration: Duration::from_millis(5),
            provider: self.name.clone(),
            model: options.model.clone().or_else(|| self.ctx.config.model.clone()),
            tokens,
            metadata: HashMap::new(),
            error: None,
            at: Utc::now(),
        }
    }
}

/// Register a scripted provider under `name` and hand back its script so
/// the test can assert on call counts.
pub fn register_mock(registry: &ProviderRegistry, name: &str, outcomes: Vec<Outcome>) -> Script {
    let script = Script::of(outcomes);
    let factory_script = script.clone();
    let factory_name = name.to_string();
    registry.register(ProviderEntry {
        name: name.to_string(),
        binary: "mock-agent".into(),
        aliases: vec![],
        factory: Arc::new(move |ctx| {
            Arc::new(MockAdapter {
                ctx,
                name: factory_name.clone(),
                script: factory_script.clone(),
            }) as Arc<dyn ProviderAdapter>
        }),
    });
    script
}
