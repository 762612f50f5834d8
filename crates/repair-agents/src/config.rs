//! Run and provider configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (applied by the binary through [`ConfigOverrides`])
//! 2. Environment variables (`REPAIR_*`, provider key variables), including
//!    those loaded from a `.env` file by the binary
//! 3. Optional TOML file
//! 4. Built-in defaults
//!
//! ## Providers
//!
//! | Kind       | Base URL                          | Default model                             | Key variable       |
//! |------------|-----------------------------------|-------------------------------------------|--------------------|
//! | `openai`   | `https://api.openai.com/v1`       | `gpt-4o`                                  | `OPENAI_API_KEY`   |
//! | `groq`     | `https://api.groq.com/openai/v1`  | `groq/compound-mini`                      | `GROQ_API_KEY`     |
//! | `together` | `https://api.together.xyz/v1`     | `meta-llama/Llama-3.3-70B-Instruct-Turbo` | `TOGETHER_API_KEY` |
//! | `local`    | `http://localhost:8080/v1`        | `local-model`                             | none               |

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::RepairError;

/// Placeholder shipped in sample env files; never a real key.
pub const PLACEHOLDER_API_KEY: &str = "PUT YOUR API KEY HERE";

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;
pub const DEFAULT_MAX_REVIEW_ATTEMPTS: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PROVIDER_RETRIES: u32 = 3;
const DEFAULT_TEMPERATURE: f64 = 0.2;
const LOCAL_API_KEY: &str = "not-needed";

const ENV_PROVIDER: &str = "REPAIR_PROVIDER";
const ENV_PROVIDER_LEGACY: &str = "LLM_PROVIDER";
const ENV_BASE_URL: &str = "REPAIR_BASE_URL";
const ENV_MODEL: &str = "REPAIR_MODEL";
const ENV_API_KEY: &str = "REPAIR_API_KEY";
const ENV_TEMPERATURE: &str = "REPAIR_TEMPERATURE";
const ENV_MAX_ITERATIONS: &str = "REPAIR_MAX_ITERATIONS";
const ENV_MAX_REVIEW_ATTEMPTS: &str = "REPAIR_MAX_REVIEW_ATTEMPTS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "REPAIR_REQUEST_TIMEOUT_SECS";
const ENV_PROVIDER_RETRIES: &str = "REPAIR_PROVIDER_RETRIES";
const ENV_DEADLINE_SECS: &str = "REPAIR_DEADLINE_SECS";

/// OpenAI-compatible backend family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Openai,
    Groq,
    Together,
    /// Self-hosted OpenAI-compatible server (vLLM, llama.cpp).
    Local,
}

impl ProviderKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Openai => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Together => "https://api.together.xyz/v1",
            Self::Local => "http://localhost:8080/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Openai => "gpt-4o",
            Self::Groq => "groq/compound-mini",
            Self::Together => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
            Self::Local => "local-model",
        }
    }

    /// Environment variable holding this provider's key, if it needs one.
    /// Whether the server answers an unauthenticated `GET /models`.
    pub fn is_self_hosted(self) -> bool {
        matches!(self, Self::Local)
    }

    pub fn api_key_var(self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Together => Some("TOGETHER_API_KEY"),
            Self::Local => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Openai => write!(f, "openai"),
            Self::Groq => write!(f, "groq"),
            Self::Together => write!(f, "together"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = RepairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "groq" => Ok(Self::Groq),
            "together" => Ok(Self::Together),
            "local" => Ok(Self::Local),
            other => Err(RepairError::Configuration(format!(
                "Invalid provider: {other}. Must be one of: openai, groq, together, local"
            ))),
        }
    }
}

/// Provider selection as configured; unset fields fall back per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Explicit key; otherwise read from the kind's key variable.
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
}

/// Fully resolved endpoint handed to a provider adapter.
#[derive(Clone, PartialEq)]
pub struct Endpoint {
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ProviderSettings {
    /// Resolve URL, model and key, looking keys up with `lookup`.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Endpoint, RepairError> {
        let kind = self.kind;
        let api_key = match (&self.api_key, kind.api_key_var()) {
            (Some(key), _) => key.clone(),
            (None, Some(var)) => lookup(var).ok_or_else(|| {
                RepairError::Configuration(format!(
                    "API key for {kind} not found. Set {var} in the environment or in your .env file."
                ))
            })?,
            (None, None) => LOCAL_API_KEY.to_string(),
        };

        if api_key.trim().is_empty() || api_key.trim() == PLACEHOLDER_API_KEY {
            return Err(RepairError::Configuration(format!(
                "API key for {kind} is empty or still the placeholder value; put a real key in your .env file"
            )));
        }

        Ok(Endpoint {
            kind,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string()),
            api_key,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        })
    }

    pub fn resolve(&self, env: &EnvSource) -> Result<Endpoint, RepairError> {
        self.resolve_with(|var| env.get(var))
    }
}

/// Top-level repair configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub provider: ProviderSettings,
    /// Outer repair iterations before giving up.
    pub max_iterations: u32,
    /// Execute/retry attempts per planned agent.
    pub max_review_attempts: u32,
    pub request_timeout_secs: u64,
    /// Retries of a transient provider failure at the step boundary.
    pub provider_retries: u32,
    /// Wall-clock budget for a whole run, checked between iterations.
    pub run_deadline_secs: Option<u64>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_review_attempts: DEFAULT_MAX_REVIEW_ATTEMPTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            provider_retries: DEFAULT_PROVIDER_RETRIES,
            run_deadline_secs: None,
        }
    }
}

/// Environment lookup: process variables first, then `.env` file entries.
///
/// The `.env` file is read into memory; the process environment is never
/// modified.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    file: HashMap<String, String>,
}

impl EnvSource {
    /// Process environment only.
    pub fn process() -> Self {
        Self::default()
    }

    /// Process environment plus the nearest `.env` in the working directory or
    /// its parents. A missing file is not an error.
    pub fn discover() -> Result<Self> {
        match dotenvy::dotenv_iter() {
            Ok(iter) => Self::collect(iter).context("Failed to parse .env file"),
            Err(e) if e.not_found() => Ok(Self::default()),
            Err(e) => Err(e).context("Failed to open .env file"),
        }
    }

    /// Process environment plus the entries of `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to open env file {}", path.display()))?;
        Self::collect(iter).with_context(|| format!("Invalid env file {}", path.display()))
    }

    fn collect<I>(iter: I) -> std::result::Result<Self, dotenvy::Error>
    where
        I: Iterator<Item = std::result::Result<(String, String), dotenvy::Error>>,
    {
        Ok(Self {
            file: iter.collect::<std::result::Result<_, _>>()?,
        })
    }

    /// Number of entries read from a `.env` file.
    pub fn file_entries(&self) -> usize {
        self.file.len()
    }

    pub fn get(&self, var: &str) -> Option<String> {
        std::env::var(var)
            .ok()
            .or_else(|| self.file.get(var).cloned())
    }
}

/// Values given on the command line; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub max_iterations: Option<u32>,
    pub max_review_attempts: Option<u32>,
    pub run_deadline_secs: Option<u64>,
}

fn parse_env<T: FromStr>(var: &str, raw: String) -> Result<T, RepairError> {
    raw.trim()
        .parse()
        .map_err(|_| RepairError::Configuration(format!("{var} has an invalid value: {raw:?}")))
}

impl RepairConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse repair config TOML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Defaults, then the optional file, then `env`.
    pub fn load(path: Option<&Path>, env: &EnvSource) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|var| env.get(var))?;
        Ok(config)
    }

    /// Layer environment values over the current ones.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), RepairError> {
        if let Some(kind) = lookup(ENV_PROVIDER).or_else(|| lookup(ENV_PROVIDER_LEGACY)) {
            self.provider.kind = kind.parse()?;
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.provider.base_url = Some(url);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.provider.model = Some(model);
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.provider.api_key = Some(key);
        }
        if let Some(raw) = lookup(ENV_TEMPERATURE) {
            self.provider.temperature = Some(parse_env(ENV_TEMPERATURE, raw)?);
        }
        if let Some(raw) = lookup(ENV_MAX_ITERATIONS) {
            self.max_iterations = parse_env(ENV_MAX_ITERATIONS, raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_REVIEW_ATTEMPTS) {
            self.max_review_attempts = parse_env(ENV_MAX_REVIEW_ATTEMPTS, raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_env(ENV_REQUEST_TIMEOUT_SECS, raw)?;
        }
        if let Some(raw) = lookup(ENV_PROVIDER_RETRIES) {
            self.provider_retries = parse_env(ENV_PROVIDER_RETRIES, raw)?;
        }
        if let Some(raw) = lookup(ENV_DEADLINE_SECS) {
            self.run_deadline_secs = Some(parse_env(ENV_DEADLINE_SECS, raw)?);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(kind) = overrides.provider {
            if kind != self.provider.kind {
                // A different backend makes URL and model from lower layers meaningless.
                self.provider.base_url = None;
                self.provider.model = None;
                self.provider.api_key = None;
            }
            self.provider.kind = kind;
        }
        if let Some(model) = &overrides.model {
            self.provider.model = Some(model.clone());
        }
        if let Some(n) = overrides.max_iterations {
            self.max_iterations = n;
        }
        if let Some(n) = overrides.max_review_attempts {
            self.max_review_attempts = n;
        }
        if let Some(secs) = overrides.run_deadline_secs {
            self.run_deadline_secs = Some(secs);
        }
    }

    pub fn validate(&self) -> Result<(), RepairError> {
        if self.max_iterations == 0 {
            return Err(RepairError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.max_review_attempts == 0 {
            return Err(RepairError::Configuration(
                "max_review_attempts must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RepairError::Configuration(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.run_deadline_secs == Some(0) {
            return Err(RepairError::Configuration(
                "run_deadline_secs must be at least 1 when set".into(),
            ));
        }
        if let Some(t) = self.provider.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(RepairError::Configuration(format!(
                    "temperature {t} is outside 0.0..=2.0"
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

/// Check if an inference endpoint is reachable (GET `{url}/models`).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RepairConfig::default();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.max_review_attempts, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.provider_retries, 3);
        assert_eq!(config.run_deadline(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_fills_only_given_keys() {
        let config = RepairConfig::from_toml_str(
            r#"
            max_iterations = 2
            [provider]
            kind = "groq"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.max_review_attempts, 3);
        assert_eq!(config.provider.kind, ProviderKind::Groq);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = RepairConfig::from_toml_str("max_iterations = 2").unwrap();
        config
            .apply_env_from(env(&[
                ("REPAIR_MAX_ITERATIONS", "7"),
                ("LLM_PROVIDER", "Together"),
            ]))
            .unwrap();
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.provider.kind, ProviderKind::Together);
    }

    #[test]
    fn repair_provider_wins_over_legacy_variable() {
        let mut config = RepairConfig::default();
        config
            .apply_env_from(env(&[("REPAIR_PROVIDER", "local"), ("LLM_PROVIDER", "groq")]))
            .unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Local);
    }

    #[test]
    fn invalid_env_values_are_configuration_errors() {
        let mut config = RepairConfig::default();
        let err = config
            .apply_env_from(env(&[("REPAIR_MAX_ITERATIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, RepairError::Configuration(_)));

        let err = config
            .apply_env_from(env(&[("REPAIR_PROVIDER", "anthropic")]))
            .unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = RepairConfig::default();
        config.provider.model = Some("from-file".into());
        config.apply_overrides(&ConfigOverrides {
            provider: Some(ProviderKind::Groq),
            max_iterations: Some(1),
            ..Default::default()
        });
        assert_eq!(config.provider.kind, ProviderKind::Groq);
        assert_eq!(config.provider.model, None);
        assert_eq!(config.max_iterations, 1);
    }

    #[test]
    fn validate_rejects_zero_budgets_and_bad_temperature() {
        let mut config = RepairConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_iterations = 1;
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 10;
        config.provider.temperature = Some(3.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_reads_kind_specific_key() {
        let settings = ProviderSettings {
            kind: ProviderKind::Groq,
            ..Default::default()
        };
        let endpoint = settings
            .resolve_with(env(&[("GROQ_API_KEY", "gsk-123")]))
            .unwrap();
        assert_eq!(endpoint.api_key, "gsk-123");
        assert_eq!(endpoint.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(endpoint.model, "groq/compound-mini");
        assert!(!format!("{endpoint:?}").contains("gsk-123"));
    }

    #[test]
    fn resolve_rejects_missing_and_placeholder_keys() {
        let settings = ProviderSettings::default();
        let missing = settings.resolve_with(env(&[])).unwrap_err().to_string();
        assert!(missing.contains("OPENAI_API_KEY"));
        assert!(missing.contains(".env"));
        assert!(settings
            .resolve_with(env(&[("OPENAI_API_KEY", PLACEHOLDER_API_KEY)]))
            .is_err());
    }

    #[test]
    fn only_self_hosted_endpoints_get_a_model_listing_check() {
        assert!(ProviderKind::Local.is_self_hosted());
        for hosted in [ProviderKind::Openai, ProviderKind::Groq, ProviderKind::Together] {
            assert!(!hosted.is_self_hosted(), "{hosted} is not self-hosted");
        }
    }

    #[test]
    fn local_provider_needs_no_key() {
        let settings = ProviderSettings {
            kind: ProviderKind::Local,
            base_url: Some("http://gpu-box:8000/v1".into()),
            ..Default::default()
        };
        let endpoint = settings.resolve_with(env(&[])).unwrap();
        assert_eq!(endpoint.base_url, "http://gpu-box:8000/v1");
        assert_eq!(endpoint.api_key, "not-needed");
    }
}
