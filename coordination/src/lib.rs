//! Deterministic core of the code repair swarm.
//!
//! Nothing in this crate talks to a model. It owns:
//! - [`parse`]: recovery of typed records from untrusted provider text
//! - [`repair`]: the records exchanged between repair stages and their fallbacks
//! - [`strategy`]: per-iteration strategy selection
//! - [`events`]: the structured event stream and its observers

#![allow(clippy::uninlined_format_args)]

pub mod events;
pub mod parse;
pub mod repair;
pub mod strategy;

pub use events::{RepairEvent, RepairObserver};
pub use parse::{parse_or_fallback, parse_with_fallback, ParseSource, ParsedResponse};
pub use repair::{
    AgentPlan, AgentProfile, AnalysisReport, BugRecord, Complexity, RepairResult,
    ReviewDecision, RunStatus, ValidationResult, ValidationStatus,
};
pub use strategy::{select_strategy, RepairStrategy};
