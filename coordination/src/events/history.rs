//! In-memory event history for inspecting a finished run.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::observer::RepairObserver;
use super::types::RepairEvent;

/// Records every observed event in arrival order.
#[derive(Debug, Default)]
pub struct EventHistory {
    events: Mutex<Vec<RepairEvent>>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RepairEvent>> {
        // Poisoning is ignored; a push either landed or it did not.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<RepairEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Events whose `event_type()` equals `event_type`.
    pub fn of_type(&self, event_type: &str) -> Vec<RepairEvent> {
        self.lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Event type names in arrival order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.lock().iter().map(RepairEvent::event_type).collect()
    }

    /// Events timestamped within `[start, end]`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<RepairEvent> {
        self.lock()
            .iter()
            .filter(|e| {
                let ts = e.timestamp();
                ts >= start && ts <= end
            })
            .cloned()
            .collect()
    }

    /// Agents in the order they were started.
    pub fn started_agents(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                RepairEvent::AgentStarted { agent, .. } => Some(agent.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl RepairObserver for EventHistory {
    fn on_event(&self, event: &RepairEvent) {
        self.lock().push(event.clone());
    }
}
