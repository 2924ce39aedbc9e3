use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::models::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Timeout,
    Auth,
    RateLimit,
    EmptyResult,
    Transport,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceErrorKind::Timeout => "timeout",
            SourceErrorKind::Auth => "auth",
            SourceErrorKind::RateLimit => "rate_limit",
            SourceErrorKind::EmptyResult => "empty_result",
            SourceErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

/// A provider-side problem while fetching from one source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {cause}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub cause: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    pub fn empty(query: &str) -> Self {
        Self::new(
            SourceErrorKind::EmptyResult,
            format!("no results for query {:?}", query),
        )
    }

    /// Classify a reqwest failure that happened before a status was available
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            SourceErrorKind::Timeout
        } else {
            SourceErrorKind::Transport
        };
        Self::new(kind, err.to_string())
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => SourceErrorKind::Auth,
            429 => SourceErrorKind::RateLimit,
            408 | 504 => SourceErrorKind::Timeout,
            _ => SourceErrorKind::Transport,
        };
        Self::new(kind, format!("HTTP {}: {}", status, snippet(body)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisErrorKind {
    Timeout,
    RateLimit,
    ContentFilter,
    Transport,
}

impl SynthesisErrorKind {
    /// Worth another attempt after a backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, SynthesisErrorKind::Timeout | SynthesisErrorKind::RateLimit)
    }
}

impl fmt::Display for SynthesisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SynthesisErrorKind::Timeout => "timeout",
            SynthesisErrorKind::RateLimit => "rate_limit",
            SynthesisErrorKind::ContentFilter => "content_filter",
            SynthesisErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("synthesis failed ({kind}): {cause}")]
pub struct SynthesisError {
    pub kind: SynthesisErrorKind,
    pub cause: String,
}

impl SynthesisError {
    pub fn new(kind: SynthesisErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            SynthesisErrorKind::Timeout
        } else {
            SynthesisErrorKind::Transport
        };
        Self::new(kind, err.to_string())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            429 => SynthesisErrorKind::RateLimit,
            // Anthropic reports overload as 529
            529 | 503 => SynthesisErrorKind::RateLimit,
            408 | 504 => SynthesisErrorKind::Timeout,
            _ => SynthesisErrorKind::Transport,
        };
        Self::new(kind, format!("HTTP {}: {}", status, snippet(body)))
    }
}

/// Non-fatal problems found while assembling the briefing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyWarning {
    MarkerMismatch { expected: usize, found: usize },
}

impl fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyWarning::MarkerMismatch { expected, found } => write!(
                f,
                "expected {} section markers, found {}; using a single unlabeled section",
                expected, found
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    Auth,
    RateLimit,
    Rejected,
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery failed ({kind:?}): {cause}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub cause: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => DeliveryErrorKind::Auth,
            429 => DeliveryErrorKind::RateLimit,
            400 | 422 => DeliveryErrorKind::Rejected,
            _ => DeliveryErrorKind::Transport,
        };
        Self::new(kind, format!("HTTP {}: {}", status, snippet(body)))
    }
}

/// Run-level failure; no briefing is delivered when one of these is returned
#[derive(Debug, Error)]
pub enum RunError {
    #[error("all {} configured sources failed", .0.len())]
    AllSourcesFailed(BTreeMap<SourceKind, SourceError>),
    #[error("no section fits a context budget of {budget} characters")]
    EmptyContext { budget: usize },
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// First 200 characters of a provider error body, for log lines
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_source_status_classification() {
        assert_eq!(
            SourceError::from_status(StatusCode::UNAUTHORIZED, "").kind,
            SourceErrorKind::Auth
        );
        assert_eq!(
            SourceError::from_status(StatusCode::TOO_MANY_REQUESTS, "").kind,
            SourceErrorKind::RateLimit
        );
        assert_eq!(
            SourceError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom").kind,
            SourceErrorKind::Transport
        );
    }

    #[test]
    fn test_synthesis_overload_counts_as_rate_limit() {
        let status = StatusCode::from_u16(529).unwrap();
        let err = SynthesisError::from_status(status, "overloaded");
        assert_eq!(err.kind, SynthesisErrorKind::RateLimit);
        assert!(err.kind.is_retryable());
        assert!(!SynthesisErrorKind::ContentFilter.is_retryable());
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let body = "x".repeat(500);
        let s = snippet(&body);
        assert_eq!(s.chars().count(), 203);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::new(SourceErrorKind::EmptyResult, "nothing");
        assert_eq!(err.to_string(), "empty_result: nothing");
    }
}
