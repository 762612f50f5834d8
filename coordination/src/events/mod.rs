//! Structured events for repair runs
//!
//! Every decision the orchestrator and coordinator make is emitted as a
//! [`RepairEvent`] to a single [`RepairObserver`]. Observers compose:
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ Orchestrator │────▶│ FanoutObserver │────▶│ TracingObserver  │
//! │ Coordinator  │     └───────┬────────┘     ├──────────────────┤
//! └──────────────┘             │              │ EventHistory     │
//!                              ▼              └──────────────────┘
//!                      ┌──────────────┐     ┌──────────────┐
//!                      │  Event Bus   │────▶│  Subscribers │
//!                      │  (broadcast) │     │   (recv)     │
//!                      └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod history;
pub mod observer;
pub mod types;

pub use bus::{EventBus, EventFilter, FilteredReceiver, SharedEventBus};
pub use history::EventHistory;
pub use observer::{FanoutObserver, NoopObserver, RepairObserver, TracingObserver};
pub use types::{RepairEvent, RequestKind, RunId};
