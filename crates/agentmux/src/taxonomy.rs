//! Error taxonomy: maps heterogeneous textual agent output onto a closed
//! set of categories the orchestrator can act on.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    RateLimited,
    AuthExpired,
    QuotaExceeded,
    Transient,
    Permanent,
    Timeout,
    Unknown,
}

/// What the orchestrator should do about a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    SwitchProvider,
    RetryWithBackoff,
    Escalate,
}

impl ErrorCategory {
    pub fn action(&self) -> RecoveryAction {
        match self {
            ErrorCategory::RateLimited => RecoveryAction::SwitchProvider,
            ErrorCategory::AuthExpired => RecoveryAction::SwitchProvider,
            ErrorCategory::QuotaExceeded => RecoveryAction::SwitchProvider,
            ErrorCategory::Transient => RecoveryAction::RetryWithBackoff,
            ErrorCategory::Timeout => RecoveryAction::RetryWithBackoff,
            ErrorCategory::Permanent => RecoveryAction::Escalate,
            // Undiagnosed failures get a bounded second chance instead of
            // an immediate escalation.
            ErrorCategory::Unknown => RecoveryAction::RetryWithBackoff,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorCategory::Permanent)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimited => "provider rejected the request due to rate limiting",
            ErrorCategory::AuthExpired => "credentials are missing, invalid or expired",
            ErrorCategory::QuotaExceeded => "usage quota or billing limit reached",
            ErrorCategory::Transient => "temporary failure, expected to clear on its own",
            ErrorCategory::Permanent => "request is malformed or rejected outright",
            ErrorCategory::Timeout => "the agent did not answer within the deadline",
            ErrorCategory::Unknown => "unclassified failure",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::AuthExpired => "auth_expired",
            ErrorCategory::QuotaExceeded => "quota_exceeded",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific override patterns, tried before the generic table.
/// Iteration respects the declared order of the inner lists.
pub type ErrorPatterns = Vec<(ErrorCategory, Vec<Regex>)>;

/// Generic patterns in priority order. First match wins, so the more
/// specific categories (rate limit, quota, auth) sit above the catch-alls.
fn generic_patterns() -> &'static [(ErrorCategory, Regex)] {
    static PATTERNS: OnceLock<Vec<(ErrorCategory, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table = [
            (ErrorCategory::RateLimited, r"rate.?limit|too many requests|\b429\b"),
            (ErrorCategory::QuotaExceeded, r"quota|usage.?limit|billing"),
            (
                ErrorCategory::AuthExpired,
                r"auth|unauthorized|forbidden|invalid.*(key|token)|\b401\b|\b403\b",
            ),
            (ErrorCategory::Timeout, r"timeout|timed.?out"),
            (ErrorCategory::Transient, r"temporary|retry|\b50[023]\b"),
            (ErrorCategory::Permanent, r"invalid|malformed|bad.?request|\b400\b"),
        ];
        table
            .into_iter()
            .map(|(cat, pattern)| {
                let re = Regex::new(pattern).expect("builtin taxonomy pattern must compile");
                (cat, re)
            })
            .collect()
    })
}

/// Classify a raw error message.
///
/// The message is lowercased first, so classification is case-insensitive
/// by construction. Provider patterns, when given, take precedence over
/// the generic table and are tried in their declared order.
pub fn classify_message(message: &str, provider_patterns: Option<&ErrorPatterns>) -> ErrorCategory {
    let lowered = message.to_lowercase();

    if let Some(patterns) = provider_patterns {
        for (category, regexes) in patterns {
            if regexes.iter().any(|re| re.is_match(&lowered)) {
                return *category;
            }
        }
    }

    for (category, re) in generic_patterns() {
        if re.is_match(&lowered) {
            return *category;
        }
    }

    ErrorCategory::Unknown
}

/// Tally helper used by metrics: category name -> count.
pub fn count_categories<'a>(messages: impl Iterator<Item = &'a str>) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for message in messages {
        let category = classify_message(message, None);
        *counts.entry(category.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        let cases = [
            ("rate limit exceeded", ErrorCategory::RateLimited),
            ("HTTP 429", ErrorCategory::RateLimited),
            ("too many requests", ErrorCategory::RateLimited),
            ("quota exceeded", ErrorCategory::QuotaExceeded),
            ("billing hard stop", ErrorCategory::QuotaExceeded),
            ("unauthorized", ErrorCategory::AuthExpired),
            ("HTTP 401", ErrorCategory::AuthExpired),
            ("invalid api key", ErrorCategory::AuthExpired),
            ("connection timed out", ErrorCategory::Timeout),
            ("HTTP 503", ErrorCategory::Transient),
            ("temporary glitch", ErrorCategory::Transient),
            ("bad request 400", ErrorCategory::Permanent),
            ("some random", ErrorCategory::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(
                classify_message(message, None),
                expected,
                "message: {message}"
            );
        }
    }

    #[test]
    fn classification_is_case_insensitive() {
        for message in ["Rate Limit", "RATE LIMIT", "rate limit"] {
            assert_eq!(classify_message(message, None), ErrorCategory::RateLimited);
        }
    }

    #[test]
    fn first_match_wins_in_order() {
        // "quota" appears before the auth catch-alls, so a message hitting
        // both resolves to the earlier row.
        assert_eq!(
            classify_message("quota exceeded: unauthorized", None),
            ErrorCategory::QuotaExceeded
        );
        // Rate limit outranks quota.
        assert_eq!(
            classify_message("rate limit hit, quota nearly gone", None),
            ErrorCategory::RateLimited
        );
    }

    #[test]
    fn provider_patterns_take_precedence() {
        let patterns: ErrorPatterns = vec![(
            ErrorCategory::QuotaExceeded,
            vec![Regex::new(r"out of credits").unwrap()],
        )];
        assert_eq!(
            classify_message("Out of credits, retry later", Some(&patterns)),
            ErrorCategory::QuotaExceeded
        );
        // Without the override the same text hits the generic `retry` row.
        assert_eq!(
            classify_message("Out of credits, retry later", None),
            ErrorCategory::Transient
        );
    }

    #[test]
    fn unknown_is_retryable_with_backoff() {
        assert!(ErrorCategory::Unknown.is_retryable());
        assert_eq!(
            ErrorCategory::Unknown.action(),
            RecoveryAction::RetryWithBackoff
        );
        assert!(!ErrorCategory::Permanent.is_retryable());
        assert_eq!(ErrorCategory::Permanent.action(), RecoveryAction::Escalate);
    }
}
