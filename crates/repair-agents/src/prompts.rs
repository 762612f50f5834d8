//! Prompt text for each request kind.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble or template
//! content changes, so a response can be traced back to the prompt that
//! produced it.
//!
//! Every template ends with the exact JSON shape the parser expects for that
//! kind. The wording may change freely; the shapes may not.

use coordination::events::RequestKind;
use coordination::{AgentProfile, AnalysisReport, BugRecord, RepairResult, ValidationResult};

use crate::provider::RepairRequest;

/// Prompt version. Bump on any preamble or template change.
pub const PROMPT_VERSION: &str = "1.2.0";

const JSON_ONLY: &str = "Do not write any text besides the JSON.";

const ESCAPED_JSON: &str =
    "Return a JSON object with all newlines and quotes inside strings escaped (e.g. \\n, \\\").";

const BUG_SCHEMA: &str = r#"{"type": "string", "location": "string", "explanation": "string"}"#;

pub const ANALYST_PREAMBLE: &str = "\
You are the Main Analysis Agent. You perform systematic static analysis of code \
and identify defects that prevent it from executing correctly. You never suggest \
stylistic improvements.";

pub const PLANNER_PREAMBLE: &str = "\
You are the Main Agent responsible for creating and ordering specialised repair \
agents. You never create agents whose only role is analysis, planning, \
coordination or validation.";

pub const FIXER_PREAMBLE: &str = "\
You are a code repair specialist. You change only what your task requires and \
always return the complete corrected program.";

pub const REVIEWER_PREAMBLE: &str = "\
You are the Main Agent reviewing the output of a specialised repair agent. You \
decide whether its fix is correct and complete for its task.";

pub const VALIDATOR_PREAMBLE: &str = "\
You are the Master Agent responsible for final validation. You judge only \
whether the code is free of execution-blocking bugs.";

fn bugs_json(bugs: &[BugRecord]) -> String {
    serde_json::to_string_pretty(bugs).unwrap_or_else(|_| "[]".to_string())
}

fn analysis_schema() -> String {
    format!(
        r#"{{
  "complexity": "SIMPLE" or "COMPLEX",
  "bugs": [{BUG_SCHEMA}],
  "plan": "string"
}}"#
    )
}

const COMPLEXITY_CRITERIA: &str = "\
  - number of critical bugs
  - degree of bug isolation
  - clarity of control flow
  - concurrency or resource management issues
  - coupling between functions or modules";

const FIX_SCHEMA: &str = r#"{
  "fixed_code": "string",
  "fix_explanation": "string"
}"#;

pub fn analyze(code: &str) -> RepairRequest {
    let prompt = format!(
        "Input:\nBuggy code:\n{code}\n\n\
         Instructions:\n\
         1. Classify the debugging task as SIMPLE or COMPLEX using:\n{COMPLEXITY_CRITERIA}\n\
         2. Locate every bug that prevents correct execution. For each give its type \
         (syntax error, API misuse, ...), location (function, line range) and why it fails.\n\
         3. Write a step-by-step repair plan.\n\n\
         Output: return a JSON object with this schema:\n{schema}\n{JSON_ONLY}",
        schema = analysis_schema(),
    );
    RepairRequest::new(RequestKind::Analyze, ANALYST_PREAMBLE, prompt)
}

pub fn reanalyze(
    code: &str,
    validation: &ValidationResult,
    previous: &AnalysisReport,
) -> RepairRequest {
    let previous_json = serde_json::to_string_pretty(previous).unwrap_or_default();
    let summary = if validation.summary.trim().is_empty() {
        "Unknown failure"
    } else {
        validation.summary.as_str()
    };
    let prompt = format!(
        "A previous fix attempt failed. Identify every remaining defect that prevents \
         execution and produce a new repair plan.\n\n\
         Input:\nPrevious analysis:\n{previous_json}\n\
         Failure summary: {summary}\n\
         Remaining bugs reported by validation:\n{remaining}\n\
         Current code:\n{code}\n\n\
         Instructions:\n\
         1. Classify the remaining task as SIMPLE or COMPLEX using:\n{COMPLEXITY_CRITERIA}\n\
         2. List every remaining bug with type, location and explanation.\n\
         3. Write a step-by-step new repair plan.\n\n\
         Output: return a JSON object with this schema:\n{schema}\n{JSON_ONLY}",
        remaining = bugs_json(&validation.remaining_bugs),
        schema = analysis_schema(),
    );
    RepairRequest::new(RequestKind::Reanalyze, ANALYST_PREAMBLE, prompt)
}

pub fn plan_agents(bugs: &[BugRecord], plan: &str) -> RepairRequest {
    let prompt = format!(
        "Input:\nLocated bugs:\n{bugs}\nRepair instructions: {plan}\n\n\
         Instructions:\n\
         1. Create the smallest set of agents needed to fix the bugs. For each give a \
         unique name, a role (brief expertise) and a task_description phrased as \
         \"Your task is to ...\" that references the located bugs.\n\
         2. Order the agents by dependency (syntax before logic, and so on).\n\n\
         Output: return a JSON object with this schema:\n\
         {{\n  \"agents\": [{{\"name\": \"string\", \"role\": \"string\", \"task_description\": \"string\"}}],\n  \
         \"execution_order\": [\"Agent_1_name\", \"Agent_2_name\"]\n}}\n{JSON_ONLY}",
        bugs = bugs_json(bugs),
    );
    RepairRequest::new(RequestKind::PlanAgents, PLANNER_PREAMBLE, prompt)
}

pub fn execute_agent(agent: &AgentProfile, code: &str) -> RepairRequest {
    let prompt = format!(
        "You are a {role}.\n{task}\n\n\
         Input:\nBuggy code:\n{code}\n\n\
         Instructions:\n\
         1. Fix the code for the issues within your responsibility.\n\
         2. Explain the fix you applied.\n\n\
         Output: {ESCAPED_JSON}\n{FIX_SCHEMA}\n{JSON_ONLY}",
        role = agent.role,
        task = agent.task_description,
    );
    RepairRequest::new(RequestKind::ExecuteAgent, FIXER_PREAMBLE, prompt)
}

pub fn retry_agent(agent: &AgentProfile, code: &str, feedback: &str) -> RepairRequest {
    let prompt = format!(
        "You are a {role}.\n{task}\n\
         Your previous attempt was rejected. Fix the code again using the reviewer feedback.\n\n\
         Input:\nBuggy code:\n{code}\nFeedback: {feedback}\n\n\
         Instructions:\n\
         1. Fix the code, taking the feedback into account.\n\
         2. Explain the fix you applied.\n\n\
         Output: {ESCAPED_JSON}\n{FIX_SCHEMA}\n{JSON_ONLY}",
        role = agent.role,
        task = agent.task_description,
    );
    RepairRequest::new(RequestKind::RetryAgent, FIXER_PREAMBLE, prompt)
}

pub fn review(agent: &AgentProfile, result: &RepairResult) -> RepairRequest {
    let prompt = format!(
        "Input:\nAgent task: {task}\nProposed fixed code:\n{code}\nFix explanation: {explanation}\n\n\
         Instructions:\n\
         1. Check whether the changes are correct and complete for the task.\n\
         2. If so, approve.\n\
         3. If not, request a refinement and say exactly what is wrong.\n\n\
         Output: return a JSON object:\n\
         {{\n  \"decision\": \"APPROVE\" or \"REFINE\",\n  \
         \"feedback\": \"string (required when decision is REFINE)\"\n}}\n{JSON_ONLY}",
        task = agent.task_description,
        code = result.fixed_code,
        explanation = result.fix_explanation,
    );
    RepairRequest::new(RequestKind::Review, REVIEWER_PREAMBLE, prompt)
}

pub fn validate(code: &str) -> RepairRequest {
    let prompt = format!(
        "Input:\nCode to validate:\n{code}\n\n\
         Instructions:\n\
         1. Check whether the code is free of execution-blocking bugs.\n\
         2. If it is, confirm completion.\n\
         3. If not, summarise and explain every remaining bug.\n\n\
         Output: return a JSON object with this schema:\n\
         {{\n  \"status\": \"FIXED\" or \"NOT FIXED\",\n  \"summary\": \"string\",\n  \
         \"remaining_bugs\": [{BUG_SCHEMA}]\n}}\n{JSON_ONLY}"
    );
    RepairRequest::new(RequestKind::Validate, VALIDATOR_PREAMBLE, prompt)
}

pub fn simple_fix(bugs: &[BugRecord], code: &str) -> RepairRequest {
    let prompt = format!(
        "Fix all identified bugs in the code and produce a fully corrected version.\n\n\
         Input:\nBuggy code:\n{code}\nIdentified bugs:\n{bugs}\n\n\
         Instructions:\n\
         1. Eliminate every execution-blocking bug.\n\
         2. Explain each fix you applied.\n\n\
         Output: {ESCAPED_JSON}\n{FIX_SCHEMA}\n{JSON_ONLY}",
        bugs = bugs_json(bugs),
    );
    RepairRequest::new(RequestKind::SimpleFix, FIXER_PREAMBLE, prompt)
}
