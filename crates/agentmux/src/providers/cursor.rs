//! Adapter for the Cursor agent CLI (`cursor-agent`).
//!
//! Cursor is the one builtin that takes the prompt on stdin instead of
//! argv. That difference lives entirely here, behind `build_command`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::errors::Result;
use crate::exec::CommandSpec;

use super::{
    assemble_argv, AdapterContext, Capabilities, InstructionFile, McpServer, ProviderAdapter,
    SendOptions,
};

pub struct CursorAdapter {
    ctx: AdapterContext,
}

impl CursorAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    /// Read `~/.cursor/mcp.json` (`{"mcpServers": {name: {command, args}}}`).
    fn mcp_servers_from_home(&self) -> Vec<McpServer> {
        #[derive(Deserialize)]
        struct McpFile {
            #[serde(rename = "mcpServers", default)]
            mcp_servers: std::collections::HashMap<String, McpEntry>,
        }
        #[derive(Deserialize)]
        struct McpEntry {
            command: Option<String>,
            #[serde(default)]
            #[allow(dead_code)]
            args: Vec<String>,
        }

        let Some(home) = dirs::home_dir() else {
            return Vec::new();
        };
        let path = home.join(".cursor").join("mcp.json");
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        match serde_json::from_str::<McpFile>(&raw) {
            Ok(file) => file
                .mcp_servers
                .into_iter()
                .map(|(name, entry)| McpServer {
                    name,
                    status: "configured".into(),
                    enabled: true,
                    command: entry.command,
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Version digits joined by a dot in family form, by a hyphen in
/// Cursor's own model names: `claude-3.5-sonnet` <-> `claude-3-5-sonnet`.
fn dotted_version() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)\.(\d)").expect("valid pattern"))
}

fn hyphenated_version() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)-(\d)").expect("valid pattern"))
}

#[async_trait::async_trait]
impl ProviderAdapter for CursorAdapter {
    fn name(&self) -> &str {
        "cursor"
    }

    fn display_name(&self) -> &str {
        "Cursor"
    }

    fn binary_name(&self) -> &str {
        "cursor-agent"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            mcp: true,
            ..Default::default()
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile {
            path: ".cursorrules".into(),
            description: "Project rules picked up by the Cursor agent".into(),
            symlink: false,
        }]
    }

    fn model_family(&self, model: &str) -> String {
        hyphenated_version().replace_all(model, "$1.$2").into_owned()
    }

    fn provider_model_name(&self, family: &str) -> String {
        dotted_version().replace_all(family, "$1-$2").into_owned()
    }

    async fn fetch_mcp_servers(&self) -> Result<Vec<McpServer>> {
        // Prefer asking the binary; fall back to the user's config file.
        let spec = CommandSpec::new(
            vec![
                self.binary_name().to_string(),
                "mcp".into(),
                "list".into(),
            ],
            Duration::from_secs(15),
        );
        if let Ok(output) = self.ctx.executor.execute(spec).await {
            if output.success() {
                let servers: Vec<McpServer> = output
                    .stdout
                    .lines()
                    .filter_map(|line| {
                        let name = line.split_whitespace().next()?;
                        Some(McpServer {
                            name: name.to_string(),
                            status: "listed".into(),
                            enabled: true,
                            command: None,
                        })
                    })
                    .collect();
                if !servers.is_empty() {
                    return Ok(servers);
                }
            }
        }
        Ok(self.mcp_servers_from_home())
    }

    fn build_command(&self, prompt: &str, options: &SendOptions) -> Result<CommandSpec> {
        // No prompt in argv; the agent reads it from stdin after `-p`.
        let argv = assemble_argv(self, options, &["-p"], Some("--model"), "", None);
        Ok(CommandSpec::new(argv, self.resolve_timeout(options)).stdin_data(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::context_for;

    #[test]
    fn prompt_travels_on_stdin() {
        let adapter = CursorAdapter::new(context_for("cursor", vec![]));
        let spec = adapter
            .build_command("refactor this", &SendOptions::default())
            .unwrap();
        assert_eq!(spec.argv, vec!["cursor-agent", "-p"]);
        assert_eq!(spec.stdin_data.as_deref(), Some("refactor this"));
    }

    #[test]
    fn model_name_round_trip() {
        let adapter = CursorAdapter::new(context_for("cursor", vec![]));
        let provider_name = adapter.provider_model_name("claude-3.5-sonnet");
        assert_eq!(provider_name, "claude-3-5-sonnet");
        assert_eq!(adapter.model_family(&provider_name), "claude-3.5-sonnet");
    }

    #[test]
    fn model_flag_uses_provider_spelling() {
        let adapter = CursorAdapter::new(context_for("cursor", vec![]));
        let options = SendOptions {
            model: Some("claude-3.5-sonnet".into()),
            ..Default::default()
        };
        let spec = adapter.build_command("hi", &options).unwrap();
        assert!(spec.argv.contains(&"claude-3-5-sonnet".to_string()));
    }

    #[test]
    fn names_without_versions_pass_through() {
        let adapter = CursorAdapter::new(context_for("cursor", vec![]));
        assert_eq!(adapter.model_family("gpt-4o"), "gpt-4o");
        assert_eq!(adapter.provider_model_name("gpt-4o"), "gpt-4o");
    }
}
