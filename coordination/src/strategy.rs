//! Per-iteration strategy selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::repair::{AnalysisReport, Complexity};

/// How the current iteration repairs the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    /// One SIMPLE_FIX call over the whole bug list.
    SinglePass,
    /// Planned agents walked by the multi-agent coordinator.
    MultiAgent,
}

impl RepairStrategy {
    pub fn for_complexity(complexity: Complexity) -> Self {
        match complexity {
            Complexity::Simple => Self::SinglePass,
            Complexity::Complex => Self::MultiAgent,
        }
    }
}

impl fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinglePass => write!(f, "single_pass"),
            Self::MultiAgent => write!(f, "multi_agent"),
        }
    }
}

/// Pick the strategy for the report that is current this iteration.
pub fn select_strategy(report: &AnalysisReport) -> RepairStrategy {
    RepairStrategy::for_complexity(report.complexity)
}
