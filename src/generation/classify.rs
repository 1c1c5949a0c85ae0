//! Failure classification for the primary generation path.

use crate::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static RATE_LIMIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b429\b|too many requests|rate\s*limit|quota").expect("static regex is valid")
});

/// Why the primary path did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Backend refused for throughput or quota reasons (HTTP 429 and friends).
    RateLimited,
    /// Any other error from the backend collaborator.
    Backend,
    /// The backend answered, but the payload was incomplete.
    InvalidPayload,
    /// The computation itself died (panic, runtime shutdown).
    Unexpected,
}

impl FailureClass {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Backend => "backend",
            Self::InvalidPayload => "invalid_payload",
            Self::Unexpected => "unexpected",
        }
    }

    /// Whether the failure opens a backoff window in the output tier.
    #[inline]
    pub fn backs_off(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn is_rate_limit_message(message: &str) -> bool {
    RATE_LIMIT_PATTERN.is_match(message)
}

pub fn classify(err: &Error) -> FailureClass {
    match err {
        Error::Validation { .. } => FailureClass::InvalidPayload,
        Error::Remote { status: 429, .. } => FailureClass::RateLimited,
        other if is_rate_limit_message(&other.to_string()) => FailureClass::RateLimited,
        _ => FailureClass::Backend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorContext;

    #[test]
    fn test_rate_limit_messages() {
        let limited = [
            "HTTP 429",
            "Too Many Requests",
            "rate limit exceeded",
            "RateLimit hit",
            "Resource has been exhausted (e.g. check quota).",
        ];
        for msg in limited {
            assert!(is_rate_limit_message(msg), "'{}' should be rate limited", msg);
        }
    }

    #[test]
    fn test_non_rate_limit_messages() {
        let other = ["connection reset", "HTTP 500", "status 4290", "model overloaded"];
        for msg in other {
            assert!(!is_rate_limit_message(msg), "'{}' should not be rate limited", msg);
        }
    }

    #[test]
    fn test_classify_by_status() {
        assert_eq!(classify(&Error::remote(429, "slow down")), FailureClass::RateLimited);
        assert_eq!(classify(&Error::remote(503, "unavailable")), FailureClass::Backend);
    }

    #[test]
    fn test_classify_by_message() {
        let err = Error::runtime_with_context("daily quota exhausted", ErrorContext::new());
        assert_eq!(classify(&err), FailureClass::RateLimited);
    }

    #[test]
    fn test_classify_invalid_payload() {
        let err = Error::validation_with_context("no questions", ErrorContext::new());
        assert_eq!(classify(&err), FailureClass::InvalidPayload);
        assert!(!FailureClass::InvalidPayload.backs_off());
        assert!(FailureClass::RateLimited.backs_off());
    }
}
