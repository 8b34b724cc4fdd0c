//! Adapter for the Google Gemini CLI (`gemini`).

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Result;
use crate::exec::CommandSpec;
use crate::taxonomy::{ErrorCategory, ErrorPatterns};

use super::{
    assemble_argv, AdapterContext, Capabilities, FirewallRequirements, InstructionFile,
    ProviderAdapter, SendOptions,
};

pub struct GeminiAdapter {
    ctx: AdapterContext,
}

impl GeminiAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

/// Trailing revision suffix, e.g. `gemini-1.5-pro-002`.
fn revision_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d{3}$").expect("valid pattern"))
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn display_name(&self) -> &str {
        "Google Gemini"
    }

    fn binary_name(&self) -> &str {
        "gemini"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            vision: true,
            ..Default::default()
        }
    }

    fn error_patterns(&self) -> ErrorPatterns {
        vec![(
            ErrorCategory::RateLimited,
            vec![Regex::new(r"resource.?exhausted").expect("valid pattern")],
        )]
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements {
            domains: vec!["generativelanguage.googleapis.com".into()],
            ip_ranges: Vec::new(),
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile {
            path: "GEMINI.md".into(),
            description: "Standing project instructions for the Gemini CLI".into(),
            symlink: false,
        }]
    }

    fn model_family(&self, model: &str) -> String {
        revision_suffix().replace(model, "").into_owned()
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
        let adapter = GeminiAdapter::new(context_for("gemini", vec![]));
        let options = SendOptions {
            model: Some("gemini-1.5-pro".into()),
            ..Default::default()
        };
        let spec = adapter.build_command("explain", &options).unwrap();
        assert_eq!(
            spec.argv,
            vec!["gemini", "--model", "gemini-1.5-pro", "--prompt", "explain"]
        );
    }

    #[test]
    fn model_family_strips_revision() {
        let adapter = GeminiAdapter::new(context_for("gemini", vec![]));
        assert_eq!(adapter.model_family("gemini-1.5-pro-002"), "gemini-1.5-pro");
        assert_eq!(adapter.model_family("gemini-1.5-pro"), "gemini-1.5-pro");
    }

    #[test]
    fn resource_exhausted_classifies_as_rate_limit() {
        let adapter = GeminiAdapter::new(context_for("gemini", vec![]));
        let category = crate::taxonomy::classify_message(
            "RESOURCE_EXHAUSTED: try again later",
            Some(&adapter.error_patterns()),
        );
        assert_eq!(category, ErrorCategory::RateLimited);
    }
}
