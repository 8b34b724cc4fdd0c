//! Provider registry: canonical name -> adapter factory, plus aliases.
//!
//! The registry is a value passed through configuration, not a global;
//! `with_builtins()` is the convenience constructor that registers the
//! builtin adapters up front.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::exec::CommandExecutor;
use crate::providers::{
    AdapterContext, AiderAdapter, ClaudeAdapter, CodexAdapter, CopilotAdapter, CursorAdapter,
    GeminiAdapter, KilocodeAdapter, OpencodeAdapter, ProviderAdapter,
};

pub type AdapterFactory = Arc<dyn Fn(AdapterContext) -> Arc<dyn ProviderAdapter> + Send + Sync>;

/// Type-level facts about a provider: everything knowable without
/// instantiating an adapter.
#[derive(Clone)]
pub struct ProviderEntry {
    pub name: String,
    pub binary: String,
    pub aliases: Vec<String>,
    pub factory: AdapterFactory,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("binary", &self.binary)
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<String, ProviderEntry>,
    aliases: HashMap<String, String>,
}

#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<RegistryInner>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ProviderRegistry")
            .field("providers", &inner.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

macro_rules! builtin {
    ($name:literal, $binary:literal, [$($alias:literal),*], $adapter:ident) => {
        ProviderEntry {
            name: $name.to_string(),
            binary: $binary.to_string(),
            aliases: vec![$($alias.to_string()),*],
            factory: Arc::new(|ctx| Arc::new($adapter::new(ctx)) as Arc<dyn ProviderAdapter>),
        }
    };
}

impl ProviderRegistry {
    /// An empty registry. Callers register everything themselves.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the builtin adapters.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for entry in Self::builtin_entries() {
            registry.register(entry);
        }
        registry
    }

    fn builtin_entries() -> Vec<ProviderEntry> {
        vec![
            builtin!("claude", "claude", ["anthropic"], ClaudeAdapter),
            builtin!("cursor", "cursor-agent", [], CursorAdapter),
            builtin!("gemini", "gemini", [], GeminiAdapter),
            builtin!("github_copilot", "copilot", ["copilot"], CopilotAdapter),
            builtin!("codex", "codex", [], CodexAdapter),
            builtin!("aider", "aider", [], AiderAdapter),
            builtin!("opencode", "opencode", [], OpencodeAdapter),
            builtin!("kilocode", "kilocode", [], KilocodeAdapter),
        ]
    }

    /// Register (or replace) a provider entry and its aliases.
    pub fn register(&self, entry: ProviderEntry) {
        let mut inner = self.inner.write();
        debug!(provider = %entry.name, aliases = ?entry.aliases, "registering provider");
        for alias in &entry.aliases {
            inner.aliases.insert(alias.clone(), entry.name.clone());
        }
        inner.entries.insert(entry.name.clone(), entry);
    }

    /// Resolve an alias to its canonical name; canonical names map to
    /// themselves.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let inner = self.inner.read();
        if inner.entries.contains_key(name) {
            Some(name.to_string())
        } else {
            inner.aliases.get(name).cloned()
        }
    }

    pub fn get(&self, name: &str) -> Result<ProviderEntry> {
        let canonical = self
            .resolve(name)
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))?;
        let inner = self.inner.read();
        inner
            .entries
            .get(&canonical)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Canonical names, sorted for deterministic output.
    pub fn all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names whose binary resolves on PATH.
    pub fn available(&self, executor: &dyn CommandExecutor) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .entries
            .values()
            .filter(|entry| executor.which(&entry.binary).is_some())
            .map(|entry| entry.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.aliases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::ScriptedExecutor;

    #[test]
    fn builtins_are_registered() {
        let registry = ProviderRegistry::with_builtins();
        for name in [
            "claude",
            "cursor",
            "gemini",
            "github_copilot",
            "codex",
            "aider",
            "opencode",
            "kilocode",
        ] {
            assert!(registry.is_registered(name), "missing builtin {name}");
        }
        assert_eq!(registry.all().len(), 8);
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        let registry = ProviderRegistry::with_builtins();
        assert_eq!(registry.resolve("anthropic").as_deref(), Some("claude"));
        assert_eq!(
            registry.resolve("copilot").as_deref(),
            Some("github_copilot")
        );
        assert_eq!(registry.get("anthropic").unwrap().name, "claude");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let registry = ProviderRegistry::with_builtins();
        let err = registry.get("warp9").unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound(_)));
    }

    #[test]
    fn custom_registration() {
        let registry = ProviderRegistry::new();
        registry.register(ProviderEntry {
            name: "inhouse".into(),
            binary: "inhouse-agent".into(),
            aliases: vec!["ih".into()],
            factory: Arc::new(|ctx| {
                Arc::new(crate::providers::OpencodeAdapter::new(ctx)) as Arc<dyn ProviderAdapter>
            }),
        });
        assert!(registry.is_registered("inhouse"));
        assert_eq!(registry.resolve("ih").as_deref(), Some("inhouse"));
    }

    #[test]
    fn available_filters_by_binary_presence() {
        let registry = ProviderRegistry::with_builtins();
        let mut executor = ScriptedExecutor::new(vec![]);
        executor.known_binaries = vec!["claude".into(), "gemini".into()];
        let available = registry.available(&executor);
        assert_eq!(available, vec!["claude", "gemini"]);
    }

    #[test]
    fn reset_clears_everything() {
        let registry = ProviderRegistry::with_builtins();
        registry.reset();
        assert!(registry.all().is_empty());
        assert!(!registry.is_registered("claude"));
    }
}
