//! Adapter for the GitHub Copilot CLI (`copilot`).

use crate::errors::Result;
use crate::exec::CommandSpec;

use super::{
    assemble_argv, AdapterContext, Capabilities, FirewallRequirements, InstructionFile,
    ProviderAdapter, SendOptions,
};

pub struct CopilotAdapter {
    ctx: AdapterContext,
}

impl CopilotAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for CopilotAdapter {
    fn name(&self) -> &str {
        "github_copilot"
    }

    fn display_name(&self) -> &str {
        "GitHub Copilot"
    }

    fn binary_name(&self) -> &str {
        "copilot"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            dangerous_mode: true,
            ..Default::default()
        }
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements {
            domains: vec!["api.githubcopilot.com".into(), "github.com".into()],
            ip_ranges: Vec::new(),
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile {
            path: ".github/copilot-instructions.md".into(),
            description: "Repository instructions read by Copilot".into(),
            symlink: false,
        }]
    }

    fn dangerous_mode_flags(&self) -> Vec<String> {
        vec!["--allow-all-tools".into()]
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    fn session_flags(&self, session_id: &str) -> Vec<String> {
        vec!["--resume".into(), session_id.to_string()]
    }

    fn build_command(&self, prompt: &str, options: &SendOptions) -> Result<CommandSpec> {
        let argv = assemble_argv(self, options, &[], None, "-p", Some(prompt));
        Ok(CommandSpec::new(argv, self.resolve_timeout(options)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::context_for;

    #[test]
    fn argv_layout_with_session_and_dangerous_mode() {
        let adapter = CopilotAdapter::new(context_for("github_copilot", vec![]));
        let options = SendOptions {
            dangerous: true,
            session_id: Some("sess-42".into()),
            ..Default::default()
        };
        let spec = adapter.build_command("continue", &options).unwrap();
        assert_eq!(
            spec.argv,
            vec![
                "copilot",
                "--allow-all-tools",
                "--resume",
                "sess-42",
                "-p",
                "continue"
            ]
        );
    }

    #[test]
    fn plain_prompt_uses_short_flag() {
        let adapter = CopilotAdapter::new(context_for("github_copilot", vec![]));
        let spec = adapter
            .build_command("hello", &SendOptions::default())
            .unwrap();
        assert_eq!(spec.argv, vec!["copilot", "-p", "hello"]);
    }
}
