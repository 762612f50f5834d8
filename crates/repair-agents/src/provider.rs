//! Capability provider boundary.
//!
//! The repair loop only ever sees [`CapabilityProvider`]: a request goes in,
//! raw text or a typed [`ProviderError`] comes out. [`RigProvider`] is the
//! production adapter for OpenAI-compatible chat completion endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use tracing::debug;

use coordination::events::RequestKind;

use crate::config::Endpoint;
use crate::errors::ProviderError;

/// One provider call: the operation kind, its system preamble, and the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairRequest {
    pub kind: RequestKind,
    pub preamble: &'static str,
    pub prompt: String,
}

impl RepairRequest {
    pub fn new(kind: RequestKind, preamble: &'static str, prompt: String) -> Self {
        Self {
            kind,
            preamble,
            prompt,
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn invoke(&self, request: &RepairRequest) -> Result<String, ProviderError>;

    fn name(&self) -> &str {
        "provider"
    }
}

#[async_trait]
impl<P: CapabilityProvider + ?Sized> CapabilityProvider for Arc<P> {
    async fn invoke(&self, request: &RepairRequest) -> Result<String, ProviderError> {
        (**self).invoke(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// OpenAI-compatible chat completions through rig.
///
/// Covers hosted (OpenAI, Groq, Together) and self-hosted endpoints; the
/// backend is chosen purely by base URL, key and model name.
pub struct RigProvider {
    client: openai::CompletionsClient,
    endpoint: Endpoint,
    name: String,
}

impl RigProvider {
    pub fn new(endpoint: Endpoint) -> Result<Self, ProviderError> {
        let client = openai::CompletionsClient::builder()
            .api_key(&endpoint.api_key)
            .base_url(&endpoint.base_url)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!(
                    "Failed to build {} client for {}: {e}",
                    endpoint.kind, endpoint.base_url
                ))
            })?;

        Ok(Self {
            name: format!("{}:{}", endpoint.kind, endpoint.model),
            client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl CapabilityProvider for RigProvider {
    async fn invoke(&self, request: &RepairRequest) -> Result<String, ProviderError> {
        let agent = self
            .client
            .agent(self.endpoint.model.as_str())
            .preamble(request.preamble)
            .temperature(self.endpoint.temperature)
            .build();

        let response: String = agent
            .prompt(request.prompt.as_str())
            .await
            .map_err(|e| ProviderError::classify(e.to_string()))?;

        debug!(
            provider = %self.name,
            kind = %request.kind,
            response_len = response.len(),
            "Provider responded"
        );

        if response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
