//! Repair steps: one provider call plus one parse per operation.
//!
//! A step never re-asks the provider because a response failed to parse; the
//! operation's fallback record is used instead and a `ParseFallback` event is
//! emitted. Provider *failures* are different: timeouts and transient errors
//! are retried here with exponential back-off, everything else propagates.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use coordination::events::{RepairEvent, RequestKind};
use coordination::parse::{parse_with_fallback, strip_code_fences};
use coordination::repair::{NO_FIX_APPLIED, SIMPLE_FIX_FAILED};
use coordination::{
    AgentPlan, AgentProfile, AnalysisReport, BugRecord, RepairResult, ReviewDecision,
    ValidationResult,
};

use crate::errors::{ProviderError, RepairError};
use crate::prompts;
use crate::provider::{CapabilityProvider, RepairRequest};
use crate::telemetry::EventSink;

/// Per-call limits applied at the step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub request_timeout: Duration,
    /// Retries after the first attempt for retriable failures.
    pub max_retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            max_retries: 3,
        }
    }
}

/// Back-off before retry `attempt` (0-based): 2s, 4s, 8s, ...
pub fn backoff_for(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_add(1)))
}

/// Runs every repair step for one run against one provider.
pub struct StepRunner {
    provider: Arc<dyn CapabilityProvider>,
    policy: CallPolicy,
    cancel: CancellationToken,
    events: EventSink,
    calls: AtomicU32,
}

impl StepRunner {
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        policy: CallPolicy,
        cancel: CancellationToken,
        events: EventSink,
    ) -> Self {
        Self {
            provider,
            policy,
            cancel,
            events,
            calls: AtomicU32::new(0),
        }
    }

    /// Provider calls made so far, retries included.
    pub fn provider_calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// One provider call bounded by the request timeout and the cancel token.
    async fn invoke_once(&self, request: &RepairRequest) -> Result<String, RepairError> {
        if self.cancel.is_cancelled() {
            return Err(RepairError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::Relaxed);

        let timeout = self.policy.request_timeout;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(RepairError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.provider.invoke(request)) => {
                match outcome {
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(e)) => Err(RepairError::provider(request.kind, e)),
                    Err(_) => Err(RepairError::provider(request.kind, ProviderError::Timeout(timeout))),
                }
            }
        }
    }

    /// Invoke with transient-failure retry.
    pub async fn call(&self, request: &RepairRequest) -> Result<String, RepairError> {
        let mut attempt: u32 = 0;
        loop {
            match self.invoke_once(request).await {
                Ok(text) => return Ok(text),
                Err(RepairError::Provider { request: kind, source }) => {
                    let category = source.retry_category();
                    let budget = category
                        .default_max_retries()
                        .map_or(0, |max| max.min(self.policy.max_retries));
                    if attempt >= budget {
                        return Err(RepairError::provider(kind, source));
                    }

                    let backoff = backoff_for(attempt);
                    warn!(
                        kind = %kind,
                        attempt = attempt + 1,
                        max_retries = budget,
                        backoff_secs = backoff.as_secs(),
                        category = %category,
                        error = %source,
                        "Transient provider error, retrying"
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(RepairError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Call, then parse with `fallback`, reporting fallbacks as events.
    async fn run_step<T: DeserializeOwned>(
        &self,
        request: RepairRequest,
        fallback: T,
    ) -> Result<T, RepairError> {
        let raw = self.call(&request).await?;
        let parsed = parse_with_fallback(&raw, fallback);
        debug!(kind = %request.kind, source = %parsed.source, "Step response parsed");

        if parsed.is_fallback() {
            let detail = parsed.detail.clone().unwrap_or_default();
            self.events.emit(|run_id, timestamp| RepairEvent::ParseFallback {
                run_id,
                request: request.kind,
                detail,
                timestamp,
            });
        }
        Ok(parsed.into_value())
    }

    async fn run_fix_step(
        &self,
        request: RepairRequest,
        code: &str,
        note: &str,
    ) -> Result<RepairResult, RepairError> {
        let mut result = self
            .run_step(request, RepairResult::unchanged(code, note))
            .await?;
        result.fixed_code = strip_code_fences(&result.fixed_code).to_string();
        Ok(result)
    }

    pub async fn analyze(&self, code: &str) -> Result<AnalysisReport, RepairError> {
        self.run_step(prompts::analyze(code), AnalysisReport::fallback())
            .await
    }

    pub async fn reanalyze(
        &self,
        code: &str,
        validation: &ValidationResult,
        previous: &AnalysisReport,
    ) -> Result<AnalysisReport, RepairError> {
        self.run_step(
            prompts::reanalyze(code, validation, previous),
            AnalysisReport::fallback(),
        )
        .await
    }

    pub async fn plan_agents(
        &self,
        bugs: &[BugRecord],
        plan: &str,
    ) -> Result<AgentPlan, RepairError> {
        self.run_step(prompts::plan_agents(bugs, plan), AgentPlan::empty())
            .await
    }

    pub async fn execute_agent(
        &self,
        agent: &AgentProfile,
        code: &str,
    ) -> Result<RepairResult, RepairError> {
        self.run_fix_step(prompts::execute_agent(agent, code), code, NO_FIX_APPLIED)
            .await
    }

    pub async fn retry_agent(
        &self,
        agent: &AgentProfile,
        code: &str,
        feedback: &str,
    ) -> Result<RepairResult, RepairError> {
        self.run_fix_step(
            prompts::retry_agent(agent, code, feedback),
            code,
            NO_FIX_APPLIED,
        )
        .await
    }

    pub async fn review(
        &self,
        agent: &AgentProfile,
        result: &RepairResult,
    ) -> Result<ReviewDecision, RepairError> {
        self.run_step(prompts::review(agent, result), ReviewDecision::fallback())
            .await
    }

    pub async fn validate(&self, code: &str) -> Result<ValidationResult, RepairError> {
        self.run_step(prompts::validate(code), ValidationResult::fallback())
            .await
    }

    pub async fn simple_fix(
        &self,
        bugs: &[BugRecord],
        code: &str,
    ) -> Result<RepairResult, RepairError> {
        self.run_fix_step(prompts::simple_fix(bugs, code), code, SIMPLE_FIX_FAILED)
            .await
    }
}
