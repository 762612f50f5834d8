//! Repair orchestrator: the outer analyze / repair / validate loop.
//!
//! ```text
//! Analyzing ─┬─ no bugs ─────────────────────────────▶ NoBugsFound
//!            └─▶ Repairing ─▶ Validating ─┬─ FIXED ──▶ Fixed
//!                    ▲                    ├─ budget ─▶ Exhausted
//!                    └──── Reanalyzing ◀──┘
//! ```
//!
//! An initial analysis with no bugs is trusted and returns the input without a
//! validation call; every repaired iteration is cross-checked by validation.
//! The current code is replaced only when a repair step returns, so an error
//! or cancellation mid-iteration never leaves half-applied state behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use coordination::events::{NoopObserver, RepairEvent, RepairObserver, RunId};
use coordination::{select_strategy, AnalysisReport, RepairStrategy, RunStatus};

use crate::config::{RepairConfig, DEFAULT_MAX_REVIEW_ATTEMPTS};
use crate::coordinator::MultiAgentCoordinator;
use crate::errors::RepairError;
use crate::provider::CapabilityProvider;
use crate::state_machine::{RunState, RunStateMachine, TransitionRecord};
use crate::steps::{CallPolicy, StepRunner};
use crate::telemetry::EventSink;

/// Everything a finished run produced besides the code itself.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub run_id: RunId,
    /// Best-known code at termination.
    pub code: String,
    pub status: RunStatus,
    /// Outer repair iterations actually started.
    pub iterations: u32,
    pub provider_calls: u32,
    pub transitions: Vec<TransitionRecord<RunState>>,
}

pub struct RepairOrchestrator {
    provider: Arc<dyn CapabilityProvider>,
    observer: Arc<dyn RepairObserver>,
    policy: CallPolicy,
    max_review_attempts: u32,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl RepairOrchestrator {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self {
            provider,
            observer: Arc::new(NoopObserver),
            policy: CallPolicy::default(),
            max_review_attempts: DEFAULT_MAX_REVIEW_ATTEMPTS,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Budgets, timeout, retries and deadline taken from `config`.
    pub fn from_config(provider: Arc<dyn CapabilityProvider>, config: &RepairConfig) -> Self {
        Self::new(provider)
            .with_call_policy(CallPolicy {
                request_timeout: config.request_timeout(),
                max_retries: config.provider_retries,
            })
            .with_max_review_attempts(config.max_review_attempts)
            .with_deadline(config.run_deadline())
    }

    pub fn with_observer(mut self, observer: Arc<dyn RepairObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_call_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_review_attempts(mut self, attempts: u32) -> Self {
        self.max_review_attempts = attempts;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Repair `source` and return the best-known code.
    ///
    /// Degraded outcomes (unparsable responses, unresolved bugs, spent budgets)
    /// still return code; only provider, configuration and cancellation
    /// failures are errors.
    pub async fn run(&self, source: &str, max_iterations: u32) -> Result<String, RepairError> {
        Ok(self.run_detailed(source, max_iterations).await?.code)
    }

    pub async fn run_detailed(
        &self,
        source: &str,
        max_iterations: u32,
    ) -> Result<RepairOutcome, RepairError> {
        if max_iterations == 0 {
            return Err(RepairError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }

        let events = EventSink::new(RepairEvent::new_run_id(), self.observer.clone());
        let steps = StepRunner::new(
            self.provider.clone(),
            self.policy,
            self.cancel.clone(),
            events.clone(),
        );
        let run = Run {
            steps: &steps,
            events: &events,
            coordinator: MultiAgentCoordinator::new(&steps, self.max_review_attempts),
            deadline: self.deadline.map(|d| Instant::now() + d),
            machine: RunStateMachine::new(),
            iterations: 0,
        };
        run.drive(source, max_iterations).await
    }
}

/// State of one run in flight.
struct Run<'a> {
    steps: &'a StepRunner,
    events: &'a EventSink,
    coordinator: MultiAgentCoordinator<'a>,
    deadline: Option<Instant>,
    machine: RunStateMachine,
    iterations: u32,
}

impl Run<'_> {
    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn emit_analysis(&self, iteration: u32, report: &AnalysisReport) {
        let complexity = report.complexity;
        let bug_count = report.bugs.len();
        self.events
            .emit(|run_id, timestamp| RepairEvent::AnalysisCompleted {
                run_id,
                iteration,
                complexity,
                bug_count,
                timestamp,
            });
    }

    async fn drive(
        mut self,
        source: &str,
        max_iterations: u32,
    ) -> Result<RepairOutcome, RepairError> {
        let code_len = source.len();
        self.events.emit(|run_id, timestamp| RepairEvent::RunStarted {
            run_id,
            max_iterations,
            code_len,
            timestamp,
        });

        let mut report = self.steps.analyze(source).await?;
        self.emit_analysis(0, &report);

        if !report.has_bugs() {
            self.machine
                .advance(RunState::NoBugsFound, Some("analysis reported no bugs"))?;
            return Ok(self.finish(source.to_string(), RunStatus::NoBugsFound));
        }

        let mut current = source.to_string();
        loop {
            if self.deadline_passed() {
                self.machine
                    .advance(RunState::DeadlineExceeded, Some("run deadline elapsed"))?;
                return Ok(self.finish(current, RunStatus::DeadlineExceeded));
            }

            self.iterations += 1;
            let iteration = self.iterations;
            self.machine.set_step(iteration);
            self.events
                .emit(|run_id, timestamp| RepairEvent::IterationStarted {
                    run_id,
                    iteration,
                    timestamp,
                });

            let strategy = select_strategy(&report);
            self.machine
                .advance(RunState::Repairing, Some(strategy.to_string().as_str()))?;
            self.events
                .emit(|run_id, timestamp| RepairEvent::StrategySelected {
                    run_id,
                    iteration,
                    strategy,
                    timestamp,
                });

            let result = match strategy {
                RepairStrategy::SinglePass => self.steps.simple_fix(&report.bugs, &current).await?,
                RepairStrategy::MultiAgent => {
                    self.coordinator
                        .repair(&report.bugs, &report.plan, &current)
                        .await?
                        .result
                }
            };
            current = result.fixed_code;

            self.machine.advance(RunState::Validating, None)?;
            let validation = self.steps.validate(&current).await?;
            let fixed = validation.is_fixed();
            let summary = validation.summary.clone();
            let remaining_bugs = validation.remaining_bugs.len();
            self.events
                .emit(|run_id, timestamp| RepairEvent::ValidationCompleted {
                    run_id,
                    iteration,
                    fixed,
                    summary,
                    remaining_bugs,
                    timestamp,
                });

            if fixed {
                self.machine.advance(RunState::Fixed, None)?;
                return Ok(self.finish(current, RunStatus::Fixed));
            }
            if iteration >= max_iterations {
                self.machine
                    .advance(RunState::Exhausted, Some("iteration budget spent"))?;
                return Ok(self.finish(current, RunStatus::Exhausted));
            }
            if self.deadline_passed() {
                self.machine
                    .advance(RunState::DeadlineExceeded, Some("run deadline elapsed"))?;
                return Ok(self.finish(current, RunStatus::DeadlineExceeded));
            }

            self.machine
                .advance(RunState::Reanalyzing, Some(validation.summary.as_str()))?;
            report = self.steps.reanalyze(&current, &validation, &report).await?;
            self.emit_analysis(iteration, &report);
        }
    }

    fn finish(self, code: String, status: RunStatus) -> RepairOutcome {
        let iterations = self.iterations;
        let provider_calls = self.steps.provider_calls();
        self.events.emit(|run_id, timestamp| RepairEvent::RunFinished {
            run_id,
            status,
            iterations,
            provider_calls,
            timestamp,
        });
        info!(
            run_id = %self.events.run_id(),
            %status,
            iterations,
            provider_calls,
            summary = %self.machine.summary(),
            "Repair run complete"
        );

        RepairOutcome {
            run_id: self.events.run_id().to_string(),
            code,
            status,
            iterations,
            provider_calls,
            transitions: self.machine.into_transitions(),
        }
    }
}
