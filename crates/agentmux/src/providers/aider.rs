//! Adapter for Aider (`aider`).

use crate::errors::Result;
use crate::exec::CommandSpec;

use super::{
    assemble_argv, AdapterContext, Capabilities, InstructionFile, ProviderAdapter, SendOptions,
};

pub struct AiderAdapter {
    ctx: AdapterContext,
}

impl AiderAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AiderAdapter {
    fn name(&self) -> &str {
        "aider"
    }

    fn display_name(&self) -> &str {
        "Aider"
    }

    fn binary_name(&self) -> &str {
        "aider"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            file_upload: true,
            ..Default::default()
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile {
            path: ".aider.conf.yml".into(),
            description: "Aider configuration file".into(),
            symlink: false,
        }]
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    fn session_flags(&self, session_id: &str) -> Vec<String> {
        vec!["--restore-chat-history".into(), session_id.to_string()]
    }

    fn build_command(&self, prompt: &str, options: &SendOptions) -> Result<CommandSpec> {
        // `--yes` keeps aider from stopping on confirmation prompts when
        // driven non-interactively.
        let argv = assemble_argv(
            self,
            options,
            &["--yes"],
            Some("--model"),
            "--message",
            Some(prompt),
        );
        Ok(CommandSpec::new(argv, self.resolve_timeout(options)))
    }
}
