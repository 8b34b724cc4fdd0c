//! Adapter for OpenCode (`opencode`). Minimal surface.

use crate::errors::Result;
use crate::exec::CommandSpec;

use super::{assemble_argv, AdapterContext, ProviderAdapter, SendOptions};

pub struct OpencodeAdapter {
    ctx: AdapterContext,
}

impl OpencodeAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpencodeAdapter {
    fn name(&self) -> &str {
        "opencode"
    }

    fn display_name(&self) -> &str {
        "OpenCode"
    }

    fn binary_name(&self) -> &str {
        "opencode"
    }

    fn context(&self) -> &AdapterContext {
        &self.ctx
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
        let adapter = OpencodeAdapter::new(context_for("opencode", vec![]));
        let spec = adapter
            .build_command("hello", &SendOptions::default())
            .unwrap();
        assert_eq!(spec.argv, vec!["opencode", "--prompt", "hello"]);
    }

    #[test]
    fn no_optional_capabilities() {
        let adapter = OpencodeAdapter::new(context_for("opencode", vec![]));
        let caps = adapter.capabilities();
        assert!(!caps.mcp);
        assert!(!caps.dangerous_mode);
        assert!(!adapter.supports_sessions());
    }
}
