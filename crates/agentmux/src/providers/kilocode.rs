//! Adapter for Kilocode (`kilocode`). Minimal surface.

use crate::errors::Result;
use crate::exec::CommandSpec;

use super::{assemble_argv, AdapterContext, ProviderAdapter, SendOptions};

pub struct KilocodeAdapter {
    ctx: AdapterContext,
}

impl KilocodeAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for KilocodeAdapter {
    fn name(&self) -> &str {
        "kilocode"
    }

    fn display_name(&self) -> &str {
        "Kilocode"
    }

    fn binary_name(&self) -> &str {
        "kilocode"
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
        let adapter = KilocodeAdapter::new(context_for("kilocode", vec![]));
        let spec = adapter
            .build_command("hello", &SendOptions::default())
            .unwrap();
        assert_eq!(spec.argv, vec!["kilocode", "--prompt", "hello"]);
    }
}
