//! Multi-agent coordinator behaviour against scripted plans and reviews.

mod common;

use std::sync::Arc;

use coordination::events::{EventHistory, RepairEvent, RequestKind};
use coordination::BugRecord;
use repair_agents::coordinator::{MultiAgentCoordinator, MULTI_AGENT_COMPLETED, NO_AGENTS_PLANNED};
use repair_agents::state_machine::AgentState;
use repair_agents::steps::{CallPolicy, StepRunner};
use repair_agents::telemetry::EventSink;
use tokio_util::sync::CancellationToken;

use common::*;

fn steps(provider: &Arc<ScriptedProvider>, history: &Arc<EventHistory>) -> StepRunner {
    StepRunner::new(
        provider.clone(),
        CallPolicy::default(),
        CancellationToken::new(),
        EventSink::new("coord-run".into(), history.clone()),
    )
}

fn bugs() -> Vec<BugRecord> {
    vec![BugRecord::new("logic error", "line 3", "wrong accumulator")]
}

#[tokio::test]
async fn exhausted_agent_adopts_its_last_attempt() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(RequestKind::PlanAgents, agents(&["Logic"], &["Logic"]))
            .on(RequestKind::ExecuteAgent, fix("attempt-1"))
            .on(RequestKind::Review, refine("still wrong"))
            .on(RequestKind::RetryAgent, fix("attempt-2"))
            .on(RequestKind::Review, refine("closer"))
            .on(RequestKind::RetryAgent, fix("attempt-3"))
            .on(RequestKind::Review, refine("give up")),
    );
    let history = Arc::new(EventHistory::new());
    let steps = steps(&provider, &history);

    let report = MultiAgentCoordinator::new(&steps, 3)
        .repair(&bugs(), "fix the sum", "original")
        .await
        .unwrap();

    assert_eq!(report.result.fixed_code, "attempt-3");
    assert_eq!(report.result.fix_explanation, MULTI_AGENT_COMPLETED);
    assert_eq!(provider.count(RequestKind::ExecuteAgent), 1);
    assert_eq!(provider.count(RequestKind::RetryAgent), 2);
    assert_eq!(provider.count(RequestKind::Review), 3);

    let outcome = &report.agents[0];
    assert!(!outcome.approved);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.transitions.last().unwrap().to, AgentState::Exhausted);

    let exhausted = history.of_type("agent_exhausted");
    assert_eq!(exhausted.len(), 1);
    assert!(history.of_type("agent_approved").is_empty());
}

#[tokio::test]
async fn review_budget_of_one_never_retries() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(RequestKind::PlanAgents, agents(&["Logic"], &["Logic"]))
            .on(RequestKind::ExecuteAgent, fix("only-attempt"))
            .on(RequestKind::Review, refine("nope")),
    );
    let history = Arc::new(EventHistory::new());
    let steps = steps(&provider, &history);

    let report = MultiAgentCoordinator::new(&steps, 1)
        .repair(&bugs(), "p", "original")
        .await
        .unwrap();

    assert_eq!(report.result.fixed_code, "only-attempt");
    assert_eq!(provider.count(RequestKind::RetryAgent), 0);
}

#[tokio::test]
async fn unknown_names_are_skipped_in_order() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .on(RequestKind::PlanAgents, agents(&["A", "B"], &["A", "X", "B"]))
            .on(RequestKind::ExecuteAgent, fix("after-a"))
            .on(RequestKind::Review, approve())
            .on(RequestKind::ExecuteAgent, fix("after-b"))
            .on(RequestKind::Review, approve()),
    );
    let history = Arc::new(EventHistory::new());
    let steps = steps(&provider, &history);

    let report = MultiAgentCoordinator::new(&steps, 3)
        .repair(&bugs(), "p", "original")
        .await
        .unwrap();

    assert_eq!(report.result.fixed_code, "after-b");
    assert_eq!(report.skipped, vec!["X"]);
    let visited: Vec<&str> = report.agents.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(visited, vec!["A", "B"]);

    // B is executed against A's approved output.
    let executed: Vec<_> = provider
        .requests()
        .into_iter()
        .filter(|r| r.kind == RequestKind::ExecuteAgent)
        .collect();
    assert!(executed[1].prompt.contains("after-a"));

    let types = history.event_types();
    let skip_at = types.iter().position(|t| *t == "agent_skipped").unwrap();
    let started: Vec<usize> = types
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == "agent_started")
        .map(|(i, _)| i)
        .collect();
    assert!(started[0] < skip_at && skip_at < started[1]);
}

#[tokio::test]
async fn unparsable_plan_leaves_code_unchanged() {
    let provider = Arc::new(
        ScriptedProvider::new().on(RequestKind::PlanAgents, "Sorry, I cannot plan this."),
    );
    let history = Arc::new(EventHistory::new());
    let steps = steps(&provider, &history);

    let report = MultiAgentCoordinator::new(&steps, 3)
        .repair(&bugs(), "p", "original")
        .await
        .unwrap();

    assert_eq!(report.result.fixed_code, "original");
    assert_eq!(report.result.fix_explanation, NO_AGENTS_PLANNED);
    assert!(report.agents.is_empty());
    assert_eq!(provider.kinds(), vec![RequestKind::PlanAgents]);
    assert_eq!(history.of_type("parse_fallback").len(), 1);
}

#[tokio::test]
async fn order_without_profiles_skips_everything() {
    let provider = Arc::new(ScriptedProvider::new().on(
        RequestKind::PlanAgents,
        r#"{"agents": [], "execution_order": ["Ghost", "Phantom"]}"#,
    ));
    let history = Arc::new(EventHistory::new());
    let steps = steps(&provider, &history);

    let report = MultiAgentCoordinator::new(&steps, 3)
        .repair(&bugs(), "p", "original")
        .await
        .unwrap();

    assert_eq!(report.result.fixed_code, "original");
    assert_eq!(report.skipped, vec!["Ghost", "Phantom"]);
    let planned = history.of_type("agents_planned");
    match &planned[0] {
        RepairEvent::AgentsPlanned {
            agents,
            execution_order,
            ..
        } => {
            assert!(agents.is_empty());
            assert_eq!(execution_order.len(), 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
}
