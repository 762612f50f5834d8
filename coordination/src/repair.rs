//! Typed records exchanged between repair stages.
//!
//! Every record here is decoded from provider output, so decoding is lenient
//! where the meaning is unambiguous: enum labels are case-insensitive and text
//! fields accept a string, a list of strings, a number, or null. A record whose
//! essential field is missing fails to decode and the caller's fallback applies.
//!
//! | Record             | Produced by            | Consumed by                  |
//! |--------------------|------------------------|------------------------------|
//! | `AnalysisReport`   | analyze / reanalyze    | strategy selector, planner   |
//! | `AgentPlan`        | plan-agents            | multi-agent coordinator      |
//! | `RepairResult`     | execute / retry / fix  | coordinator, orchestrator    |
//! | `ReviewDecision`   | review                 | coordinator refine loop      |
//! | `ValidationResult` | validate               | orchestrator                 |

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const NO_PLAN_GENERATED: &str = "No plan generated";
pub const NO_FIX_APPLIED: &str = "No fix applied";
pub const SIMPLE_FIX_FAILED: &str = "Simple fix failed";
pub const REVIEW_FAILED: &str = "Review failed - retrying";
pub const VALIDATION_PARSE_FAILED: &str = "Validation failed due to parsing error";
pub const MISSING_REFINE_FEEDBACK: &str =
    "Reviewer requested refinement without details; re-check the task and fix what remains.";

// ── Lenient field decoding ──────────────────────────────────────────────────

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Accept a string, a list of strings (joined by newlines), a scalar, or null.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(value_to_text)
}

fn lenient_opt_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let text = value_to_text(Value::deserialize(deserializer)?);
    Ok(if text.trim().is_empty() { None } else { Some(text) })
}

/// Collapse case, surrounding whitespace and `_`/`-` separators.
fn normalize_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

// ── Bugs and analysis ───────────────────────────────────────────────────────

/// A single execution-blocking defect located by analysis or validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugRecord {
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub explanation: String,
}

impl BugRecord {
    pub fn new(
        kind: impl Into<String>,
        location: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            location: location.into(),
            explanation: explanation.into(),
        }
    }
}

impl fmt::Display for BugRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.explanation)
    }
}

/// Complexity classification deciding the repair strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Complexity {
    #[default]
    Simple,
    Complex,
}

impl Complexity {
    /// Anything other than a SIMPLE label routes to the multi-agent path.
    pub fn from_label(raw: &str) -> Self {
        if normalize_label(raw) == "SIMPLE" {
            Self::Simple
        } else {
            Self::Complex
        }
    }
}

impl<'de> Deserialize<'de> for Complexity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_label(&value_to_text(Value::deserialize(
            deserializer,
        )?)))
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "SIMPLE"),
            Self::Complex => write!(f, "COMPLEX"),
        }
    }
}

/// Output of the analyze and reanalyze steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub bugs: Vec<BugRecord>,
    #[serde(default = "default_plan", deserialize_with = "lenient_text")]
    pub plan: String,
}

fn default_plan() -> String {
    NO_PLAN_GENERATED.to_string()
}

impl AnalysisReport {
    /// Substituted when the analysis response cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            complexity: Complexity::Simple,
            bugs: Vec::new(),
            plan: default_plan(),
        }
    }

    pub fn has_bugs(&self) -> bool {
        !self.bugs.is_empty()
    }
}

// ── Agents ──────────────────────────────────────────────────────────────────

/// A specialised repair agent proposed by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub task_description: String,
}

impl AgentProfile {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            task_description: task_description.into(),
        }
    }
}

/// Planner output: the agent set plus the order to run it in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPlan {
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
    #[serde(default)]
    pub execution_order: Vec<String>,
}

impl AgentPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() || self.execution_order.is_empty()
    }
}

// ── Repair results ──────────────────────────────────────────────────────────

/// A proposed replacement for the current code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairResult {
    #[serde(deserialize_with = "lenient_text")]
    pub fixed_code: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fix_explanation: String,
}

impl RepairResult {
    pub fn new(fixed_code: impl Into<String>, fix_explanation: impl Into<String>) -> Self {
        Self {
            fixed_code: fixed_code.into(),
            fix_explanation: fix_explanation.into(),
        }
    }

    /// The input code handed back untouched with an explanatory note.
    pub fn unchanged(code: &str, note: &str) -> Self {
        Self::new(code, note)
    }
}

// ── Review ──────────────────────────────────────────────────────────────────

/// Review gate verdict for one agent attempt.
///
/// A refinement always carries feedback; a missing reason is filled in with
/// [`MISSING_REFINE_FEEDBACK`] when decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReviewWire", into = "ReviewWire")]
pub enum ReviewDecision {
    Approve,
    Refine { feedback: String },
}

impl ReviewDecision {
    pub fn refine(feedback: impl Into<String>) -> Self {
        Self::Refine {
            feedback: feedback.into(),
        }
    }

    /// Substituted when the review response cannot be parsed.
    pub fn fallback() -> Self {
        Self::refine(REVIEW_FAILED)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approve)
    }

    pub fn feedback(&self) -> Option<&str> {
        match self {
            Self::Approve => None,
            Self::Refine { feedback } => Some(feedback),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Refine { .. } => "REFINE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewWire {
    #[serde(deserialize_with = "lenient_text")]
    decision: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    feedback: Option<String>,
}

impl From<ReviewWire> for ReviewDecision {
    fn from(wire: ReviewWire) -> Self {
        match normalize_label(&wire.decision).as_str() {
            "APPROVE" | "APPROVED" => Self::Approve,
            _ => Self::Refine {
                feedback: wire
                    .feedback
                    .unwrap_or_else(|| MISSING_REFINE_FEEDBACK.to_string()),
            },
        }
    }
}

impl From<ReviewDecision> for ReviewWire {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approve => Self {
                decision: "APPROVE".to_string(),
                feedback: None,
            },
            ReviewDecision::Refine { feedback } => Self {
                decision: "REFINE".to_string(),
                feedback: Some(feedback),
            },
        }
    }
}

// ── Validation ──────────────────────────────────────────────────────────────

/// Final verdict on whether the code is free of execution-blocking bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationStatus {
    #[serde(rename = "FIXED")]
    Fixed,
    #[serde(rename = "NOT FIXED")]
    NotFixed,
}

impl ValidationStatus {
    /// Only an explicit FIXED label counts as fixed.
    pub fn from_label(raw: &str) -> Self {
        if normalize_label(raw) == "FIXED" {
            Self::Fixed
        } else {
            Self::NotFixed
        }
    }
}

impl<'de> Deserialize<'de> for ValidationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_label(&value_to_text(Value::deserialize(
            deserializer,
        )?)))
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "FIXED"),
            Self::NotFixed => write!(f, "NOT FIXED"),
        }
    }
}

/// Output of the validate step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
    #[serde(default)]
    pub remaining_bugs: Vec<BugRecord>,
}

impl ValidationResult {
    /// Substituted when the validation response cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            status: ValidationStatus::NotFixed,
            summary: VALIDATION_PARSE_FAILED.to_string(),
            remaining_bugs: Vec::new(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.status == ValidationStatus::Fixed
    }
}

// ── Run outcome ─────────────────────────────────────────────────────────────

/// Terminal state of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The initial analysis reported no bugs; the input was returned as-is.
    NoBugsFound,
    Fixed,
    /// The iteration budget ran out before validation reported FIXED.
    Exhausted,
    DeadlineExceeded,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBugsFound => write!(f, "no_bugs_found"),
            Self::Fixed => write!(f, "fixed"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}
