//! Structured response parsing with graceful degradation.
//!
//! Provider output is untrusted text. [`parse_with_fallback`] recovers a typed
//! record from it or hands back the caller's fallback; it never errors.
//!
//! ```text
//! raw text ─▶ extract_object_span ─▶ serde_json ──ok──▶ Direct
//!                  │ none                 │ err
//!                  ▼                      ▼
//!               Fallback            repair_span ─▶ serde_json ──ok──▶ Repaired
//!                                                      │ err
//!                                                      ▼
//!                                                   Fallback
//! ```

pub mod extract;
pub mod sanitize;

use serde::de::DeserializeOwned;
use tracing::debug;

pub use extract::{extract_object_span, strip_code_fences};
pub use sanitize::{escape_control_chars, repair_escapes, repair_span};

/// Which path produced a parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    /// The extracted span parsed as-is.
    Direct,
    /// The span parsed only after the repair pass.
    Repaired,
    /// Nothing usable was found; the caller's fallback was returned.
    Fallback,
}

impl std::fmt::Display for ParseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Repaired => write!(f, "repaired"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A parsed value together with how it was obtained.
#[derive(Debug, Clone)]
pub struct ParsedResponse<T> {
    pub value: T,
    pub source: ParseSource,
    /// Why the fallback was used, when it was.
    pub detail: Option<String>,
}

impl<T> ParsedResponse<T> {
    pub fn is_fallback(&self) -> bool {
        self.source == ParseSource::Fallback
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Parse the first balanced object in `raw` into `T`, or return `fallback`.
pub fn parse_with_fallback<T: DeserializeOwned>(raw: &str, fallback: T) -> ParsedResponse<T> {
    let Some(span) = extract_object_span(raw) else {
        debug!(raw_len = raw.len(), "no balanced object in response");
        return ParsedResponse {
            value: fallback,
            source: ParseSource::Fallback,
            detail: Some("no balanced JSON object found".to_string()),
        };
    };

    let first_err = match serde_json::from_str::<T>(span) {
        Ok(value) => {
            return ParsedResponse {
                value,
                source: ParseSource::Direct,
                detail: None,
            }
        }
        Err(e) => e,
    };

    let repaired = repair_span(span);
    match serde_json::from_str::<T>(&repaired) {
        Ok(value) => {
            debug!(error = %first_err, "response parsed after escape repair");
            ParsedResponse {
                value,
                source: ParseSource::Repaired,
                detail: None,
            }
        }
        Err(second_err) => {
            debug!(first = %first_err, second = %second_err, "response unparsable after repair");
            ParsedResponse {
                value: fallback,
                source: ParseSource::Fallback,
                detail: Some(second_err.to_string()),
            }
        }
    }
}

/// Convenience wrapper returning only the value.
pub fn parse_or_fallback<T: DeserializeOwned>(raw: &str, fallback: T) -> T {
    parse_with_fallback(raw, fallback).into_value()
}
