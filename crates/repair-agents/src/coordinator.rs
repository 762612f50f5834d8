//! Multi-agent coordinator for COMPLEX iterations.
//!
//! Plans specialised agents from the bug list, walks them strictly in the
//! planner's execution order, and gates every attempt behind a review:
//!
//! ```text
//! Start ─▶ Executed ─▶ Reviewed ─┬─ APPROVE ─────────────▶ Approved
//!              ▲                 ├─ REFINE (attempts left) ─┘ (retry with feedback)
//!              └─────────────────┘
//!                                └─ REFINE (last attempt) ─▶ Exhausted
//! ```
//!
//! Approval adopts the attempt's code. Exhaustion adopts the *last* attempt's
//! code. Either way the walk moves on to the next agent.

use std::collections::HashMap;

use tracing::{debug, warn};

use coordination::events::RepairEvent;
use coordination::{AgentProfile, BugRecord, RepairResult, ReviewDecision};

use crate::errors::RepairError;
use crate::state_machine::{AgentState, AgentStateMachine, TransitionRecord};
use crate::steps::StepRunner;

/// Explanation attached to every coordinator result that ran the walk.
pub const MULTI_AGENT_COMPLETED: &str = "Multi-agent repair completed";
/// Explanation when the planner produced nothing to run.
pub const NO_AGENTS_PLANNED: &str = "No agents planned; code left unchanged";

/// What happened to one planned agent.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub name: String,
    /// Execute/retry attempts made, at most the review budget.
    pub attempts: u32,
    pub approved: bool,
    pub transitions: Vec<TransitionRecord<AgentState>>,
}

/// Result of one coordinator invocation.
#[derive(Debug, Clone)]
pub struct CoordinatorReport {
    pub result: RepairResult,
    /// Agents visited, in execution order.
    pub agents: Vec<AgentOutcome>,
    /// Execution-order names that matched no planned agent.
    pub skipped: Vec<String>,
}

pub struct MultiAgentCoordinator<'a> {
    steps: &'a StepRunner,
    max_review_attempts: u32,
}

/// Index profiles by name. On a duplicate name the later profile wins.
fn index_profiles(agents: Vec<AgentProfile>) -> HashMap<String, AgentProfile> {
    let mut profiles = HashMap::with_capacity(agents.len());
    for agent in agents {
        if let Some(previous) = profiles.insert(agent.name.clone(), agent) {
            warn!(agent = %previous.name, "Planner returned a duplicate agent name; keeping the later profile");
        }
    }
    profiles
}

impl<'a> MultiAgentCoordinator<'a> {
    pub fn new(steps: &'a StepRunner, max_review_attempts: u32) -> Self {
        Self {
            steps,
            max_review_attempts: max_review_attempts.max(1),
        }
    }

    pub async fn repair(
        &self,
        bugs: &[BugRecord],
        plan: &str,
        code: &str,
    ) -> Result<CoordinatorReport, RepairError> {
        let agent_plan = self.steps.plan_agents(bugs, plan).await?;

        let names: Vec<String> = agent_plan.agents.iter().map(|a| a.name.clone()).collect();
        let order = agent_plan.execution_order.clone();
        self.steps
            .events()
            .emit(|run_id, timestamp| RepairEvent::AgentsPlanned {
                run_id,
                agents: names,
                execution_order: order,
                timestamp,
            });

        if agent_plan.execution_order.is_empty() {
            return Ok(CoordinatorReport {
                result: RepairResult::unchanged(code, NO_AGENTS_PLANNED),
                agents: Vec::new(),
                skipped: Vec::new(),
            });
        }

        let profiles = index_profiles(agent_plan.agents);
        let mut current = code.to_string();
        let mut visited = Vec::new();
        let mut skipped = Vec::new();

        for name in agent_plan.execution_order {
            let Some(agent) = profiles.get(&name) else {
                self.steps
                    .events()
                    .emit(|run_id, timestamp| RepairEvent::AgentSkipped {
                        run_id,
                        agent: name.clone(),
                        timestamp,
                    });
                skipped.push(name);
                continue;
            };

            let (code, outcome) = self.run_agent(agent, &current).await?;
            current = code;
            visited.push(outcome);
        }

        Ok(CoordinatorReport {
            result: RepairResult::new(current, MULTI_AGENT_COMPLETED),
            agents: visited,
            skipped,
        })
    }

    /// Execute, review and refine one agent; returns the code to adopt.
    async fn run_agent(
        &self,
        agent: &AgentProfile,
        code: &str,
    ) -> Result<(String, AgentOutcome), RepairError> {
        let events = self.steps.events();
        events.emit(|run_id, timestamp| RepairEvent::AgentStarted {
            run_id,
            agent: agent.name.clone(),
            role: agent.role.clone(),
            timestamp,
        });

        let mut sm = AgentStateMachine::new();
        let mut feedback: Option<String> = None;
        let mut last_attempt: Option<RepairResult> = None;

        for attempt in 1..=self.max_review_attempts {
            sm.set_step(attempt);
            let result = match feedback.take() {
                None => self.steps.execute_agent(agent, code).await?,
                Some(feedback) => {
                    debug!(agent = %agent.name, attempt, "Refinement attempt");
                    self.steps.retry_agent(agent, code, &feedback).await?
                }
            };
            sm.advance(AgentState::Executed, None)?;

            let decision = self.steps.review(agent, &result).await?;
            sm.advance(AgentState::Reviewed, Some(decision.label()))?;
            let approved = decision.is_approved();
            let review_feedback = decision.feedback().map(String::from);
            events.emit(|run_id, timestamp| RepairEvent::ReviewDecided {
                run_id,
                agent: agent.name.clone(),
                attempt,
                approved,
                feedback: review_feedback,
                timestamp,
            });

            match decision {
                ReviewDecision::Approve => {
                    sm.advance(AgentState::Approved, None)?;
                    events.emit(|run_id, timestamp| RepairEvent::AgentApproved {
                        run_id,
                        agent: agent.name.clone(),
                        attempt,
                        timestamp,
                    });
                    let outcome = AgentOutcome {
                        name: agent.name.clone(),
                        attempts: attempt,
                        approved: true,
                        transitions: sm.into_transitions(),
                    };
                    return Ok((result.fixed_code, outcome));
                }
                ReviewDecision::Refine { feedback: reason } => {
                    feedback = Some(reason);
                    last_attempt = Some(result);
                }
            }
        }

        sm.advance(AgentState::Exhausted, Some("review budget spent"))?;
        let attempts = self.max_review_attempts;
        events.emit(|run_id, timestamp| RepairEvent::AgentExhausted {
            run_id,
            agent: agent.name.clone(),
            attempts,
            timestamp,
        });

        let adopted = last_attempt
            .map(|r| r.fixed_code)
            .unwrap_or_else(|| code.to_string());
        let outcome = AgentOutcome {
            name: agent.name.clone(),
            attempts,
            approved: false,
            transitions: sm.into_transitions(),
        };
        Ok((adopted, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_profile_names_keep_the_later_one() {
        let profiles = index_profiles(vec![
            AgentProfile::new("A", "first", "one"),
            AgentProfile::new("B", "other", "two"),
            AgentProfile::new("A", "second", "three"),
        ]);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["A"].role, "second");
    }
}
