//! Error types for the media librarian.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single provider call did not produce results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The per-provider timeout elapsed.
    Timeout,
    /// The connection could not be established or was dropped.
    Connection,
    /// The response body did not have the expected shape.
    Malformed,
    /// The provider's limiter queue was full.
    RateLimited,
    /// Credentials were rejected (401/403).
    Auth,
    /// Any other non-success HTTP status.
    Status(u16),
}

impl FailureKind {
    /// Whether a retry inside the provider client may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Connection => true,
            FailureKind::Status(code) => *code == 429 || *code >= 500,
            FailureKind::Malformed | FailureKind::RateLimited | FailureKind::Auth => false,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connection => write!(f, "connection error"),
            FailureKind::Malformed => write!(f, "malformed response"),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::Auth => write!(f, "authentication rejected"),
            FailureKind::Status(code) => write!(f, "HTTP {}", code),
        }
    }
}

/// A recorded provider failure, kept as a value so it can be shared between
/// callers waiting on the same lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    pub message: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.provider, self.kind, self.message)
    }
}

/// Main error type for the media librarian.
#[derive(Error, Debug)]
pub enum Error {
    // Identification errors
    #[error("All providers failed for '{query}': {}", join_failures(.failures))]
    ProviderUnavailable {
        query: String,
        failures: Vec<ProviderFailure>,
    },

    #[error("No match found for '{0}'")]
    NotFound(String),

    #[error("Rate limit queue full for provider {provider}")]
    RateLimited { provider: String },

    #[error("Provider {provider} failed: {kind} ({message})")]
    Provider {
        provider: String,
        kind: FailureKind,
        message: String,
    },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("API key missing for provider {0}")]
    MissingApiKey(String),

    #[error("Candidate not found: {0}")]
    UnknownCandidate(String),

    #[error("Operation cancelled")]
    Cancelled,

    // Plan errors
    #[error("Invalid plan for template '{template}': {reason}")]
    PlanInvalid { template: String, reason: String },

    #[error("Invalid plan file: {0}")]
    InvalidPlanFile(String),

    // File system errors
    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("Copy of {} failed verification: {reason}", .path.display())]
    VerificationFailed { path: PathBuf, reason: String },

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Wrap an IO error with the path it happened at.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Convert a provider failure record into an error.
    pub fn from_failure(failure: ProviderFailure) -> Self {
        match failure.kind {
            FailureKind::RateLimited => Error::RateLimited {
                provider: failure.provider,
            },
            kind => Error::Provider {
                provider: failure.provider,
                kind,
                message: failure.message,
            },
        }
    }

    /// Describe this error as a failure of `provider`.
    pub fn into_failure(self, provider: &str) -> ProviderFailure {
        let (kind, message) = match self {
            Error::Provider { kind, message, .. } => (kind, message),
            Error::RateLimited { .. } => (FailureKind::RateLimited, "limiter queue full".to_string()),
            Error::MissingApiKey(name) => (FailureKind::Auth, format!("no API key configured for {}", name)),
            Error::Json(e) => (FailureKind::Malformed, e.to_string()),
            Error::Http(e) if e.is_timeout() => (FailureKind::Timeout, e.to_string()),
            Error::NotFound(what) => (FailureKind::Status(404), format!("not found: {}", what)),
            other => (FailureKind::Connection, other.to_string()),
        };
        ProviderFailure {
            provider: provider.to_string(),
            kind,
            message,
        }
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::Connection.is_transient());
        assert!(FailureKind::Status(503).is_transient());
        assert!(FailureKind::Status(429).is_transient());
        assert!(!FailureKind::Status(404).is_transient());
        assert!(!FailureKind::Auth.is_transient());
        assert!(!FailureKind::Malformed.is_transient());
    }

    #[test]
    fn test_provider_unavailable_message_lists_failures() {
        let err = Error::ProviderUnavailable {
            query: "the matrix".to_string(),
            failures: vec![
                ProviderFailure {
                    provider: "tmdb".to_string(),
                    kind: FailureKind::Timeout,
                    message: "no answer in 10s".to_string(),
                },
                ProviderFailure {
                    provider: "omdb".to_string(),
                    kind: FailureKind::Status(502),
                    message: "bad gateway".to_string(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("the matrix"));
        assert!(text.contains("tmdb: timeout"));
        assert!(text.contains("omdb: HTTP 502"));
    }

    #[test]
    fn test_rate_limited_failure_maps_to_rate_limited_error() {
        let err = Error::from_failure(ProviderFailure {
            provider: "musicbrainz".to_string(),
            kind: FailureKind::RateLimited,
            message: "queue full".to_string(),
        });
        assert!(matches!(err, Error::RateLimited { provider } if provider == "musicbrainz"));
    }
}
