//! Adapter for the OpenAI Codex CLI (`codex`).

use crate::errors::Result;
use crate::exec::CommandSpec;

use super::{
    assemble_argv, AdapterContext, Capabilities, FirewallRequirements, InstructionFile,
    ProviderAdapter, SendOptions,
};

pub struct CodexAdapter {
    ctx: AdapterContext,
}

impl CodexAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for CodexAdapter {
    fn name(&self) -> &str {
        "codex"
    }

    fn display_name(&self) -> &str {
        "Codex"
    }

    fn binary_name(&self) -> &str {
        "codex"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            ..Default::default()
        }
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements {
            domains: vec!["api.openai.com".into()],
            ip_ranges: Vec::new(),
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile {
            path: "AGENTS.md".into(),
            description: "Agent instructions read by Codex".into(),
            symlink: false,
        }]
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    fn session_flags(&self, session_id: &str) -> Vec<String> {
        vec!["--session".into(), session_id.to_string()]
    }

    fn build_command(&self, prompt: &str, options: &SendOptions) -> Result<CommandSpec> {
        let argv = assemble_argv(self, options, &[], Some("--model"), "--prompt", Some(prompt));
        Ok(CommandSpec::new(argv, self.resolve_timeout(options)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::context_for;

    #[test]
    fn argv_layout() {
        let adapter = CodexAdapter::new(context_for("codex", vec![]));
        let spec = adapter
            .build_command("write a parser", &SendOptions::default())
            .unwrap();
        assert_eq!(spec.argv, vec!["codex", "--prompt", "write a parser"]);
    }

    #[test]
    fn session_flag_layout() {
        let adapter = CodexAdapter::new(context_for("codex", vec![]));
        let options = SendOptions {
            session_id: Some("abc".into()),
            ..Default::default()
        };
        let spec = adapter.build_command("go on", &options).unwrap();
        assert_eq!(
            spec.argv,
            vec!["codex", "--session", "abc", "--prompt", "go on"]
        );
    }
}
