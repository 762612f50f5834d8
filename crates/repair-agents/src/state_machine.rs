//! Repair state machines: explicit states and legal transition guards.
//!
//! Two lifecycles share one machine:
//! - [`RunState`]: the outer analyze / repair / validate loop of one run.
//! - [`AgentState`]: one planned agent's execute / review / refine cycle.
//!
//! Every transition is checked against the lifecycle's graph and recorded, so
//! a finished run can be replayed from its transition log.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use coordination::RunStatus;

/// A state graph: an initial state, terminal states, and legal edges.
pub trait Lifecycle: Copy + Eq + fmt::Display + fmt::Debug {
    fn initial() -> Self;
    fn is_terminal(self) -> bool;
    fn can_transition_to(self, to: Self) -> bool;
}

/// States of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Initial analysis of the input code.
    Analyzing,
    /// Applying the strategy chosen for this iteration.
    Repairing,
    Validating,
    /// Analysing what validation reported as still broken.
    Reanalyzing,
    NoBugsFound,
    Fixed,
    Exhausted,
    DeadlineExceeded,
}

impl RunState {
    /// Terminal status for a terminal state.
    pub fn status(self) -> Option<RunStatus> {
        match self {
            Self::NoBugsFound => Some(RunStatus::NoBugsFound),
            Self::Fixed => Some(RunStatus::Fixed),
            Self::Exhausted => Some(RunStatus::Exhausted),
            Self::DeadlineExceeded => Some(RunStatus::DeadlineExceeded),
            _ => None,
        }
    }
}

/// ```text
/// Analyzing   → Repairing | NoBugsFound
/// Repairing   → Validating
/// Validating  → Fixed | Reanalyzing | Exhausted
/// Reanalyzing → Repairing
/// any non-terminal → DeadlineExceeded
/// ```
impl Lifecycle for RunState {
    fn initial() -> Self {
        Self::Analyzing
    }

    fn is_terminal(self) -> bool {
        self.status().is_some()
    }

    fn can_transition_to(self, to: Self) -> bool {
        use RunState::*;

        if to == DeadlineExceeded && !self.is_terminal() {
            return true;
        }

        matches!(
            (self, to),
            (Analyzing, Repairing)
                | (Analyzing, NoBugsFound)
                | (Repairing, Validating)
                | (Validating, Fixed)
                | (Validating, Reanalyzing)
                | (Validating, Exhausted)
                | (Reanalyzing, Repairing)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyzing => write!(f, "Analyzing"),
            Self::Repairing => write!(f, "Repairing"),
            Self::Validating => write!(f, "Validating"),
            Self::Reanalyzing => write!(f, "Reanalyzing"),
            Self::NoBugsFound => write!(f, "NoBugsFound"),
            Self::Fixed => write!(f, "Fixed"),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::DeadlineExceeded => write!(f, "DeadlineExceeded"),
        }
    }
}

/// States of one planned agent inside the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Start,
    /// An execute or retry attempt produced a candidate.
    Executed,
    /// The candidate was reviewed; REFINE loops back to `Executed`.
    Reviewed,
    Approved,
    Exhausted,
}

impl Lifecycle for AgentState {
    fn initial() -> Self {
        Self::Start
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Exhausted)
    }

    fn can_transition_to(self, to: Self) -> bool {
        use AgentState::*;
        matches!(
            (self, to),
            (Start, Executed)
                | (Executed, Reviewed)
                | (Reviewed, Approved)
                | (Reviewed, Executed)
                | (Reviewed, Exhausted)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::Executed => write!(f, "Executed"),
            Self::Reviewed => write!(f, "Reviewed"),
            Self::Approved => write!(f, "Approved"),
            Self::Exhausted => write!(f, "Exhausted"),
        }
    }
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    pub from: S,
    pub to: S,
    /// Iteration (run machine) or attempt (agent machine) at transition time.
    pub step: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: String,
    pub to: String,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current state, enforces legal transitions, and keeps the log.
#[derive(Debug)]
pub struct StateMachine<S: Lifecycle> {
    current: S,
    step: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord<S>>,
}

pub type RunStateMachine = StateMachine<RunState>;
pub type AgentStateMachine = StateMachine<AgentState>;

impl<S: Lifecycle> StateMachine<S> {
    pub fn new() -> Self {
        Self {
            current: S::initial(),
            step: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> S {
        self.current
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn set_step(&mut self, step: u32) {
        self.step = step;
    }

    /// Move to `to` if the lifecycle allows it, recording the transition.
    pub fn advance(&mut self, to: S, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !self.current.can_transition_to(to) {
            return Err(IllegalTransition {
                from: self.current.to_string(),
                to: to.to_string(),
            });
        }

        tracing::debug!(
            from = %self.current,
            to = %to,
            step = self.step,
            "State transition"
        );

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            step: self.step,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord<S>] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord<S>> {
        self.transitions
    }

    /// One-line history, e.g. `Analyzing → Fixed (3 transitions) [Repairing → Validating → Fixed]`.
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut line = format!(
            "{} → {} ({} transitions)",
            S::initial(),
            self.current,
            self.transitions.len()
        );
        if !states.is_empty() {
            line.push_str(&format!(" [{}]", states.join(" → ")));
        }
        line
    }
}

impl<S: Lifecycle> Default for StateMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}
