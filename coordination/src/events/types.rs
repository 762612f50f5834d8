//! Event types emitted at repair run transition points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repair::{Complexity, RunStatus};
use crate::strategy::RepairStrategy;

/// Unique identifier for one orchestrator run.
pub type RunId = String;

/// Which step's response fell back to its default record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Analyze,
    Reanalyze,
    PlanAgents,
    ExecuteAgent,
    RetryAgent,
    Review,
    Validate,
    SimpleFix,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "ANALYZE",
            Self::Reanalyze => "REANALYZE",
            Self::PlanAgents => "PLAN_AGENTS",
            Self::ExecuteAgent => "EXECUTE_AGENT",
            Self::RetryAgent => "RETRY_AGENT",
            Self::Review => "REVIEW",
            Self::Validate => "VALIDATE",
            Self::SimpleFix => "SIMPLE_FIX",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All repair run events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepairEvent {
    RunStarted {
        run_id: RunId,
        max_iterations: u32,
        code_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// Initial analysis (`iteration == 0`) or a reanalysis after failed validation.
    AnalysisCompleted {
        run_id: RunId,
        iteration: u32,
        complexity: Complexity,
        bug_count: usize,
        timestamp: DateTime<Utc>,
    },

    IterationStarted {
        run_id: RunId,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    StrategySelected {
        run_id: RunId,
        iteration: u32,
        strategy: RepairStrategy,
        timestamp: DateTime<Utc>,
    },

    /// The planner returned its agent set and execution order.
    AgentsPlanned {
        run_id: RunId,
        agents: Vec<String>,
        execution_order: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An execution-order entry named no planned agent.
    AgentSkipped {
        run_id: RunId,
        agent: String,
        timestamp: DateTime<Utc>,
    },

    AgentStarted {
        run_id: RunId,
        agent: String,
        role: String,
        timestamp: DateTime<Utc>,
    },

    ReviewDecided {
        run_id: RunId,
        agent: String,
        attempt: u32,
        approved: bool,
        feedback: Option<String>,
        timestamp: DateTime<Utc>,
    },

    AgentApproved {
        run_id: RunId,
        agent: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// Review never approved; the last attempt's code was adopted.
    AgentExhausted {
        run_id: RunId,
        agent: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    ValidationCompleted {
        run_id: RunId,
        iteration: u32,
        fixed: bool,
        summary: String,
        remaining_bugs: usize,
        timestamp: DateTime<Utc>,
    },

    /// A response could not be parsed and the step's default record was used.
    ParseFallback {
        run_id: RunId,
        request: RequestKind,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    RunFinished {
        run_id: RunId,
        status: RunStatus,
        iterations: u32,
        provider_calls: u32,
        timestamp: DateTime<Utc>,
    },
}

impl RepairEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RepairEvent::RunStarted { timestamp, .. }
            | RepairEvent::AnalysisCompleted { timestamp, .. }
            | RepairEvent::IterationStarted { timestamp, .. }
            | RepairEvent::StrategySelected { timestamp, .. }
            | RepairEvent::AgentsPlanned { timestamp, .. }
            | RepairEvent::AgentSkipped { timestamp, .. }
            | RepairEvent::AgentStarted { timestamp, .. }
            | RepairEvent::ReviewDecided { timestamp, .. }
            | RepairEvent::AgentApproved { timestamp, .. }
            | RepairEvent::AgentExhausted { timestamp, .. }
            | RepairEvent::ValidationCompleted { timestamp, .. }
            | RepairEvent::ParseFallback { timestamp, .. }
            | RepairEvent::RunFinished { timestamp, .. } => *timestamp,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            RepairEvent::RunStarted { run_id, .. }
            | RepairEvent::AnalysisCompleted { run_id, .. }
            | RepairEvent::IterationStarted { run_id, .. }
            | RepairEvent::StrategySelected { run_id, .. }
            | RepairEvent::AgentsPlanned { run_id, .. }
            | RepairEvent::AgentSkipped { run_id, .. }
            | RepairEvent::AgentStarted { run_id, .. }
            | RepairEvent::ReviewDecided { run_id, .. }
            | RepairEvent::AgentApproved { run_id, .. }
            | RepairEvent::AgentExhausted { run_id, .. }
            | RepairEvent::ValidationCompleted { run_id, .. }
            | RepairEvent::ParseFallback { run_id, .. }
            | RepairEvent::RunFinished { run_id, .. } => run_id,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            RepairEvent::RunStarted { .. } => "run_started",
            RepairEvent::AnalysisCompleted { .. } => "analysis_completed",
            RepairEvent::IterationStarted { .. } => "iteration_started",
            RepairEvent::StrategySelected { .. } => "strategy_selected",
            RepairEvent::AgentsPlanned { .. } => "agents_planned",
            RepairEvent::AgentSkipped { .. } => "agent_skipped",
            RepairEvent::AgentStarted { .. } => "agent_started",
            RepairEvent::ReviewDecided { .. } => "review_decided",
            RepairEvent::AgentApproved { .. } => "agent_approved",
            RepairEvent::AgentExhausted { .. } => "agent_exhausted",
            RepairEvent::ValidationCompleted { .. } => "validation_completed",
            RepairEvent::ParseFallback { .. } => "parse_fallback",
            RepairEvent::RunFinished { .. } => "run_finished",
        }
    }

    /// The agent this event concerns, for agent-scoped events.
    pub fn agent(&self) -> Option<&str> {
        match self {
            RepairEvent::AgentSkipped { agent, .. }
            | RepairEvent::AgentStarted { agent, .. }
            | RepairEvent::ReviewDecided { agent, .. }
            | RepairEvent::AgentApproved { agent, .. }
            | RepairEvent::AgentExhausted { agent, .. } => Some(agent),
            _ => None,
        }
    }

    /// Create a new unique run ID
    pub fn new_run_id() -> RunId {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = RepairEvent::StrategySelected {
            run_id: "run-1".to_string(),
            iteration: 2,
            strategy: RepairStrategy::MultiAgent,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "strategy_selected");
        assert_eq!(json["strategy"], "multi_agent");

        let parsed: RepairEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_event_accessors() {
        let event = RepairEvent::AgentSkipped {
            run_id: "run-1".to_string(),
            agent: "X".to_string(),
            timestamp: Utc::now(),
        };

        assert_eq!(event.run_id(), "run-1");
        assert_eq!(event.agent(), Some("X"));
        assert_eq!(event.event_type(), "agent_skipped");
    }

    #[test]
    fn request_kind_wire_names() {
        let json = serde_json::to_string(&RequestKind::PlanAgents).unwrap();
        assert_eq!(json, "\"PLAN_AGENTS\"");
        assert_eq!(RequestKind::SimpleFix.to_string(), "SIMPLE_FIX");
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RepairEvent::new_run_id(), RepairEvent::new_run_id());
    }
}
