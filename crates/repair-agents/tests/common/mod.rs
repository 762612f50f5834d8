//! Shared fixtures: a provider that replays scripted responses per request kind.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use coordination::events::RequestKind;
use repair_agents::errors::ProviderError;
use repair_agents::provider::{CapabilityProvider, RepairRequest};

/// Replays queued responses per request kind and records every request seen.
#[derive(Default)]
pub struct ScriptedProvider {
    queues: Mutex<HashMap<RequestKind, VecDeque<String>>>,
    delays: HashMap<RequestKind, Duration>,
    seen: Mutex<Vec<RepairRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, kind: RequestKind, response: impl Into<String>) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(response.into());
        self
    }

    /// Every call of `kind` takes `delay` before answering.
    pub fn delayed(mut self, kind: RequestKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn kinds(&self) -> Vec<RequestKind> {
        self.seen.lock().unwrap().iter().map(|r| r.kind).collect()
    }

    pub fn requests(&self) -> Vec<RepairRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, kind: RequestKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

#[async_trait]
impl CapabilityProvider for ScriptedProvider {
    async fn invoke(&self, request: &RepairRequest) -> Result<String, ProviderError> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delays.get(&request.kind) {
            tokio::time::sleep(*delay).await;
        }
        self.queues
            .lock()
            .unwrap()
            .get_mut(&request.kind)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ProviderError::Configuration(format!("no script for {}", request.kind)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn analysis(complexity: &str, bugs: &[(&str, &str, &str)]) -> String {
    let bugs: Vec<serde_json::Value> = bugs
        .iter()
        .map(|(kind, location, explanation)| {
            serde_json::json!({"type": kind, "location": location, "explanation": explanation})
        })
        .collect();
    serde_json::json!({"complexity": complexity, "bugs": bugs, "plan": "fix them"}).to_string()
}

pub fn fix(code: &str) -> String {
    serde_json::json!({"fixed_code": code, "fix_explanation": "applied"}).to_string()
}

pub fn validation(fixed: bool) -> String {
    let status = if fixed { "FIXED" } else { "NOT FIXED" };
    serde_json::json!({
        "status": status,
        "summary": if fixed { "all good" } else { "still broken" },
        "remaining_bugs": if fixed {
            serde_json::json!([])
        } else {
            serde_json::json!([{"type": "logic", "location": "line 1", "explanation": "wrong"}])
        },
    })
    .to_string()
}

pub fn approve() -> String {
    r#"{"decision": "APPROVE"}"#.to_string()
}

pub fn refine(feedback: &str) -> String {
    serde_json::json!({"decision": "REFINE", "feedback": feedback}).to_string()
}

pub fn agents(names: &[&str], order: &[&str]) -> String {
    let agents: Vec<serde_json::Value> = names
        .iter()
        .map(|n| {
            serde_json::json!({
                "name": n,
                "role": format!("{n} specialist"),
                "task_description": format!("Your task is to fix {n} bugs."),
            })
        })
        .collect();
    serde_json::json!({"agents": agents, "execution_order": order}).to_string()
}
