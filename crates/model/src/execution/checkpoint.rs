use crate::core::{
    category::Category,
    identifiers::{RunId, WorkerId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Idle,
    BatchRunning,
    Rescheduled,
    Drained,
    Quarantined,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::BatchRunning => "batch_running",
            WorkerState::Rescheduled => "rescheduled",
            WorkerState::Drained => "drained",
            WorkerState::Quarantined => "quarantined",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file whose rows were being appended when the checkpoint was last saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFile {
    pub name: String,
    /// Worker table row count before the append started.
    pub rows_before: u64,
}

/// Durable progress of one worker for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub category: Category,
    pub worker_id: WorkerId,
    pub run_id: RunId,
    /// Data rows already written to the worker table.
    pub next_row: u64,
    pub files_done: u64,
    pub files_failed: u64,
    pub continuations: u32,
    pub state: WorkerState,
    pub pending: Option<PendingFile>,
    pub last_heartbeat: DateTime<Utc>,
}

impl RunCheckpoint {
    pub fn start(category: Category, worker_id: WorkerId, run_id: RunId) -> Self {
        Self {
            category,
            worker_id,
            run_id,
            next_row: 0,
            files_done: 0,
            files_failed: 0,
            continuations: 0,
            state: WorkerState::Idle,
            pending: None,
            last_heartbeat: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_heartbeat = Utc::now();
    }
}
