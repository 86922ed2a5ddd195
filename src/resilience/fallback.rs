//! Fallback responses.
//!
//! The resolver is a pure function of the terminal failure's category: no
//! I/O, no retries, no way to fail.

use crate::resilience::outcome::{CallError, FailureKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackResolver {
    caller: String,
    dependency: String,
}

impl FallbackResolver {
    pub fn new(caller: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            dependency: dependency.into(),
        }
    }

    /// Placeholder response for a call that ended in `last`.
    pub fn resolve(&self, last: &CallError) -> String {
        self.resolve_kind(last.kind())
    }

    pub fn resolve_kind(&self, kind: FailureKind) -> String {
        format!(
            "{} is currently unavailable or experiencing issues ({}). Returning a fallback message from {}.",
            self.dependency,
            cause_category(kind),
            self.caller,
        )
    }
}

fn cause_category(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Transport => "connection failed",
        FailureKind::Timeout => "timed out",
        FailureKind::RateLimited => "rate limited",
        FailureKind::CircuitOpen => "circuit open",
        FailureKind::Application => "error response",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_message_names_cause_and_parties() {
        let resolver = FallbackResolver::new("service-a", "service-b");
        let msg = resolver.resolve(&CallError::Timeout(Duration::from_secs(1)));
        assert_eq!(
            msg,
            "service-b is currently unavailable or experiencing issues (timed out). \
             Returning a fallback message from service-a."
        );
    }

    #[test]
    fn test_same_category_same_response() {
        let resolver = FallbackResolver::new("a", "b");
        let first = resolver.resolve(&CallError::Transport("connection refused".into()));
        let second = resolver.resolve(&CallError::Transport("connection reset".into()));
        assert_eq!(first, second);
        assert_eq!(first, resolver.resolve_kind(FailureKind::Transport));
    }

    #[test]
    fn test_categories_are_distinct() {
        let resolver = FallbackResolver::new("a", "b");
        let kinds = [
            FailureKind::Transport,
            FailureKind::Timeout,
            FailureKind::RateLimited,
            FailureKind::CircuitOpen,
            FailureKind::Application,
        ];
        let messages: std::collections::HashSet<_> =
            kinds.iter().map(|k| resolver.resolve_kind(*k)).collect();
        assert_eq!(messages.len(), kinds.len());
    }
}
