//! Model-backed half of the repair swarm: provider adapters, prompts, the
//! per-step call policy, the multi-agent coordinator and the outer loop.

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod state_machine;
pub mod steps;
pub mod telemetry;

pub use config::{ConfigOverrides, Endpoint, ProviderKind, RepairConfig};
pub use coordinator::{AgentOutcome, CoordinatorReport, MultiAgentCoordinator};
pub use errors::{ProviderError, RepairError, RetryCategory};
pub use orchestrator::{RepairOrchestrator, RepairOutcome};
pub use provider::{CapabilityProvider, RepairRequest, RigProvider};
pub use steps::{CallPolicy, StepRunner};
