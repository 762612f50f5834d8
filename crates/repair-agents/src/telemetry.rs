//! Event emission for one run, plus the JSONL event log.
//!
//! `.jsonl` output is append-only: one `RepairEvent` per line, so several runs
//! can share a file and be told apart by `run_id`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::warn;

use coordination::events::{RepairEvent, RepairObserver, RunId};

/// Stamps events with the run id and time, then hands them to the observer.
#[derive(Clone)]
pub struct EventSink {
    run_id: RunId,
    observer: Arc<dyn RepairObserver>,
}

impl EventSink {
    pub fn new(run_id: RunId, observer: Arc<dyn RepairObserver>) -> Self {
        Self { run_id, observer }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, build: impl FnOnce(RunId, DateTime<Utc>) -> RepairEvent) {
        let event = build(self.run_id.clone(), Utc::now());
        self.observer.on_event(&event);
    }
}

/// Appends every event to a JSONL file.
///
/// Write failures are logged and swallowed; losing telemetry never fails a run.
pub struct JsonlEventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlEventLog {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RepairObserver for JsonlEventLog {
    fn on_event(&self, event: &RepairEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize event: {e}");
                return;
            }
        };
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(file, "{json}") {
            warn!(path = %self.path.display(), "Failed to append event: {e}");
        }
    }
}

/// Read back an event log written by [`JsonlEventLog`].
pub fn read_events(path: &Path) -> std::io::Result<Vec<RepairEvent>> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: RepairEvent = serde_json::from_str(&line)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        events.push(event);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::events::EventHistory;

    #[test]
    fn sink_stamps_run_id() {
        let history = Arc::new(EventHistory::new());
        let sink = EventSink::new("run-7".into(), history.clone());
        sink.emit(|run_id, timestamp| RepairEvent::IterationStarted {
            run_id,
            iteration: 1,
            timestamp,
        });
        let events = history.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].run_id(), "run-7");
    }

    #[test]
    fn jsonl_log_appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        for run in ["a", "b"] {
            let log = JsonlEventLog::open(&path).unwrap();
            log.on_event(&RepairEvent::AgentSkipped {
                run_id: run.into(),
                agent: "X".into(),
                timestamp: Utc::now(),
            });
        }

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].run_id(), "a");
        assert_eq!(events[1].run_id(), "b");
        assert_eq!(events[1].event_type(), "agent_skipped");
    }

    #[test]
    fn read_events_rejects_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        let err = read_events(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
