//! Observer seam between the repair loop and whoever watches it.

use std::sync::Arc;

use tracing::{info, warn};

use super::types::RepairEvent;

/// Receives every event a run emits, synchronously and in order.
///
/// Implementations must not block; anything slow belongs behind a channel.
pub trait RepairObserver: Send + Sync {
    fn on_event(&self, event: &RepairEvent);
}

impl<T: RepairObserver + ?Sized> RepairObserver for Arc<T> {
    fn on_event(&self, event: &RepairEvent) {
        (**self).on_event(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RepairObserver for NoopObserver {
    fn on_event(&self, _event: &RepairEvent) {}
}

/// Renders events as structured `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RepairObserver for TracingObserver {
    fn on_event(&self, event: &RepairEvent) {
        match event {
            RepairEvent::RunStarted {
                run_id,
                max_iterations,
                code_len,
                ..
            } => info!(%run_id, max_iterations, code_len, "Repair run started"),
            RepairEvent::AnalysisCompleted {
                iteration,
                complexity,
                bug_count,
                ..
            } => info!(iteration, %complexity, bug_count, "Analysis completed"),
            RepairEvent::IterationStarted { iteration, .. } => {
                info!(iteration, "Iteration started")
            }
            RepairEvent::StrategySelected {
                iteration, strategy, ..
            } => info!(iteration, %strategy, "Strategy selected"),
            RepairEvent::AgentsPlanned {
                agents,
                execution_order,
                ..
            } => info!(
                agents = ?agents,
                execution_order = ?execution_order,
                "Agents planned"
            ),
            RepairEvent::AgentSkipped { agent, .. } => {
                warn!(%agent, "Execution order names an unknown agent, skipping")
            }
            RepairEvent::AgentStarted { agent, role, .. } => {
                info!(%agent, %role, "Agent started")
            }
            RepairEvent::ReviewDecided {
                agent,
                attempt,
                approved,
                feedback,
                ..
            } => info!(
                %agent,
                attempt,
                approved,
                feedback = feedback.as_deref().unwrap_or(""),
                "Review decided"
            ),
            RepairEvent::AgentApproved { agent, attempt, .. } => {
                info!(%agent, attempt, "Agent approved")
            }
            RepairEvent::AgentExhausted {
                agent, attempts, ..
            } => warn!(%agent, attempts, "Review attempts exhausted, adopting last attempt"),
            RepairEvent::ValidationCompleted {
                iteration,
                fixed,
                summary,
                remaining_bugs,
                ..
            } => info!(iteration, fixed, remaining_bugs, %summary, "Validation completed"),
            RepairEvent::ParseFallback {
                request, detail, ..
            } => warn!(%request, %detail, "Response unparsable, using fallback"),
            RepairEvent::RunFinished {
                run_id,
                status,
                iterations,
                provider_calls,
                ..
            } => info!(%run_id, %status, iterations, provider_calls, "Repair run finished"),
        }
    }
}

/// Forwards each event to every inner observer in registration order.
#[derive(Default, Clone)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn RepairObserver>>,
}

impl FanoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn RepairObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn push(&mut self, observer: Arc<dyn RepairObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl RepairObserver for FanoutObserver {
    fn on_event(&self, event: &RepairEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
