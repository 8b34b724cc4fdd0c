use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::taxonomy::ErrorCategory;

/// Error hierarchy for the dispatcher.
///
/// Adapters throw the typed variants (`RateLimited`, `Authentication`,
/// `Timeout`, `Provider`); the conductor consumes them to drive the
/// retry/switch loop. `NoProvidersAvailable` is terminal and is never
/// wrapped by anything above it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("provider `{provider}` failed: {message}")]
    Provider { provider: String, message: String },

    #[error("unknown provider: `{0}`")]
    ProviderNotFound(String),

    #[error("provider `{provider}` unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("command timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("command execution failed: {0}")]
    CommandExecution(String),

    #[error("provider `{provider}` is rate limited")]
    RateLimited {
        provider: String,
        /// When the provider says the limit lifts, if it told us.
        reset_at: Option<DateTime<Utc>>,
        message: String,
    },

    #[error("circuit open for provider `{provider}`")]
    CircuitOpen { provider: String },

    #[error("authentication failed for `{provider}`: {message}")]
    Authentication { provider: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no providers available (attempted: {})", .attempted.join(", "))]
    NoProvidersAvailable {
        attempted: Vec<String>,
        /// Provider name -> why it was skipped.
        reasons: HashMap<String, String>,
    },
}

impl Error {
    /// Map a typed error into the taxonomy without re-parsing its text.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::RateLimited { .. } => ErrorCategory::RateLimited,
            Error::Authentication { .. } => ErrorCategory::AuthExpired,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::CircuitOpen { .. } => ErrorCategory::Transient,
            Error::Provider { message, .. } => crate::taxonomy::classify_message(message, None),
            Error::CommandExecution(message) => crate::taxonomy::classify_message(message, None),
            _ => ErrorCategory::Unknown,
        }
    }

    /// Short label used as a switch reason and as a metrics key.
    pub fn label(&self) -> &'static str {
        match self {
            Error::Provider { .. } => "provider_error",
            Error::ProviderNotFound(_) => "provider_not_found",
            Error::ProviderUnavailable { .. } => "provider_unavailable",
            Error::Timeout { .. } => "timeout",
            Error::CommandExecution(_) => "command_execution",
            Error::RateLimited { .. } => "rate_limited",
            Error::CircuitOpen { .. } => "circuit_open",
            Error::Authentication { .. } => "authentication",
            Error::Configuration(_) => "configuration",
            Error::NoProvidersAvailable { .. } => "no_providers_available",
        }
    }

    /// True for errors the conductor may retry around.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::Configuration(_) | Error::ProviderNotFound(_) | Error::NoProvidersAvailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_map_to_categories() {
        let err = Error::RateLimited {
            provider: "claude".into(),
            reset_at: None,
            message: "429".into(),
        };
        assert_eq!(err.category(), ErrorCategory::RateLimited);

        let err = Error::Authentication {
            provider: "gemini".into(),
            message: "expired".into(),
        };
        assert_eq!(err.category(), ErrorCategory::AuthExpired);

        let err = Error::Provider {
            provider: "codex".into(),
            message: "connection timed out".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[test]
    fn no_providers_available_lists_attempts() {
        let err = Error::NoProvidersAvailable {
            attempted: vec!["claude".into(), "gemini".into()],
            reasons: HashMap::new(),
        };
        let text = err.to_string();
        assert!(text.contains("claude"));
        assert!(text.contains("gemini"));
        assert!(!err.is_retryable());
    }
}
