//! Adapter for the Anthropic Claude CLI (`claude`).

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Result;
use crate::exec::CommandSpec;
use crate::taxonomy::{ErrorCategory, ErrorPatterns};

use super::{
    assemble_argv, AdapterContext, Capabilities, FirewallRequirements, InstructionFile,
    ProviderAdapter, SendOptions,
};

pub struct ClaudeAdapter {
    ctx: AdapterContext,
}

impl ClaudeAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

/// Trailing release-date suffix, e.g. `claude-3-5-sonnet-20241022`.
fn date_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d{8}$").expect("valid pattern"))
}

#[async_trait::async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    fn display_name(&self) -> &str {
        "Anthropic Claude"
    }

    fn binary_name(&self) -> &str {
        "claude"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            json_mode: true,
            mcp: true,
            dangerous_mode: true,
            ..Default::default()
        }
    }

    fn error_patterns(&self) -> ErrorPatterns {
        vec![
            (
                ErrorCategory::RateLimited,
                vec![Regex::new(r"usage limit reached").expect("valid pattern")],
            ),
            (
                ErrorCategory::Transient,
                vec![Regex::new(r"overloaded").expect("valid pattern")],
            ),
        ]
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements {
            domains: vec!["api.anthropic.com".into(), "claude.ai".into()],
            ip_ranges: Vec::new(),
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile {
            path: "CLAUDE.md".into(),
            description: "Standing project instructions read on startup".into(),
            symlink: false,
        }]
    }

    async fn discover_models(&self) -> Vec<super::ModelInfo> {
        // The CLI has no stable machine-readable model listing; this is
        // the static table of families the adapter understands.
        ["claude-opus-4", "claude-sonnet-4", "claude-3-5-sonnet", "claude-3-5-haiku"]
            .into_iter()
            .map(|name| super::ModelInfo {
                name: name.to_string(),
                family: Some(self.model_family(name)),
            })
            .collect()
    }

    /// Strip the release-date suffix: `claude-3-5-sonnet-20241022` and
    /// `claude-3-5-sonnet` share a family. Idempotent; unrecognized names
    /// pass through.
    fn model_family(&self, model: &str) -> String {
        date_suffix().replace(model, "").into_owned()
    }

    fn dangerous_mode_flags(&self) -> Vec<String> {
        vec!["--dangerously-skip-permissions".into()]
    }

    fn build_command(&self, prompt: &str, options: &SendOptions) -> Result<CommandSpec> {
        let argv = assemble_argv(
            self,
            options,
            &["--print", "--output-format=text"],
            Some("--model"),
            "--prompt",
            Some(prompt),
        );
        Ok(CommandSpec::new(argv, self.resolve_timeout(options)))
    }
}
