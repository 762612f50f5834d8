//! Repair error taxonomy with retry classification.
//!
//! Malformed provider output is never an error here; the parser substitutes a
//! fallback record. Only provider failures, configuration problems,
//! cancellation and state machine violations reach the caller.
//!
//! ## Retry categories
//!
//! | Category       | Retriable | Max retries |
//! |----------------|-----------|-------------|
//! | Transient      | yes       | 3           |
//! | RateLimit      | yes       | 5           |
//! | Timeout        | yes       | 3           |
//! | Authentication | no        | none        |
//! | Configuration  | no        | none        |
//! | Cancelled      | no        | none        |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use coordination::events::RequestKind;

use crate::state_machine::IllegalTransition;

/// Classification used at the step boundary to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Network or backend hiccup, including empty 200 responses.
    Transient,
    /// Provider rate limit; retry with exponential back-off.
    RateLimit,
    /// The request outlived its per-call timeout.
    Timeout,
    /// Credentials rejected.
    Authentication,
    Configuration,
    Cancelled,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimit | Self::Timeout)
    }

    /// Suggested max retry attempts for retriable categories.
    ///
    /// Returns `None` for non-retriable categories.
    pub fn default_max_retries(self) -> Option<u32> {
        match self {
            Self::Transient => Some(3),
            Self::RateLimit => Some(5),
            Self::Timeout => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Timeout => write!(f, "timeout"),
            Self::Authentication => write!(f, "authentication"),
            Self::Configuration => write!(f, "configuration"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure of a single capability provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, HTTP or backend failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Rate limit: {0}")]
    RateLimit(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::Transport(_) | Self::EmptyResponse => RetryCategory::Transient,
            Self::RateLimit(_) => RetryCategory::RateLimit,
            Self::Timeout(_) => RetryCategory::Timeout,
            Self::Auth(_) => RetryCategory::Authentication,
            Self::Configuration(_) => RetryCategory::Configuration,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.retry_category().is_retriable()
    }

    /// Classify a backend error message.
    ///
    /// Backends surface HTTP failures as text, so classification goes by
    /// status codes and well-known phrases. Anything unrecognised is treated
    /// as a transport failure.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();

        if message.contains("401")
            || message.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("invalid api key")
            || lower.contains("incorrect api key")
        {
            Self::Auth(message)
        } else if message.contains("429") || lower.contains("rate limit") {
            Self::RateLimit(message)
        } else if lower.contains("no message or tool call (empty)")
            || lower.contains("response contained no message")
        {
            Self::EmptyResponse
        } else {
            Self::Transport(message)
        }
    }
}

/// Errors that end a repair run without a result.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("Provider failed during {request}: {source}")]
    Provider {
        request: RequestKind,
        #[source]
        source: ProviderError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Repair run cancelled")]
    Cancelled,

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl RepairError {
    pub fn provider(request: RequestKind, source: ProviderError) -> Self {
        Self::Provider { request, source }
    }

    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::Provider { source, .. } => source.retry_category(),
            Self::Configuration(_) | Self::IllegalTransition(_) => RetryCategory::Configuration,
            Self::Cancelled => RetryCategory::Cancelled,
        }
    }
}
