use crate::core::{
    category::Category,
    identifiers::{RunId, WorkerId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Idle,
    Splitting,
    WorkersRunning,
    Merging,
    Finalized,
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Splitting => "splitting",
            JobPhase::WorkersRunning => "workers_running",
            JobPhase::Merging => "merging",
            JobPhase::Finalized => "finalized",
            JobPhase::Failed => "failed",
        }
    }

    /// Whether a job may move from `self` to `next`.
    ///
    /// `Failed` is reachable from every non-terminal phase; a new run starts
    /// from `Idle`, `Finalized` or `Failed`. A failed merge may be retried.
    pub fn allows(&self, next: JobPhase) -> bool {
        use JobPhase::*;
        match (self, next) {
            (Idle | Finalized | Failed, Splitting) => true,
            (Splitting, WorkersRunning) => true,
            (WorkersRunning, Merging) => true,
            (Merging, Finalized) => true,
            (Failed, Merging) => true,
            (Splitting | WorkersRunning | Merging, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Finalized | JobPhase::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    Pending,
    Done { rows: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub files_split: u64,
    pub files_routed: u64,
    pub files_failed: u64,
    pub rows_written: u64,
    pub rows_merged: u64,
    pub duplicate_rows: u64,
}

/// Lifecycle of one category from split to merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryJobState {
    pub category: Category,
    pub run_id: Option<RunId>,
    pub phase: JobPhase,
    pub workers: BTreeMap<WorkerId, WorkerStatus>,
    pub counters: JobCounters,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryJobState {
    pub fn idle(category: Category) -> Self {
        Self {
            category,
            run_id: None,
            phase: JobPhase::Idle,
            workers: BTreeMap::new(),
            counters: JobCounters::default(),
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn all_workers_done(&self) -> bool {
        !self.workers.is_empty()
            && self
                .workers
                .values()
                .all(|w| matches!(w, WorkerStatus::Done { .. }))
    }

    pub fn worker_rows(&self, worker_id: WorkerId) -> Option<u64> {
        match self.workers.get(&worker_id) {
            Some(WorkerStatus::Done { rows }) => Some(*rows),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions() {
        assert!(JobPhase::Idle.allows(JobPhase::Splitting));
        assert!(JobPhase::Finalized.allows(JobPhase::Splitting));
        assert!(JobPhase::WorkersRunning.allows(JobPhase::Merging));
        assert!(JobPhase::Merging.allows(JobPhase::Failed));
        assert!(!JobPhase::Idle.allows(JobPhase::Merging));
        assert!(!JobPhase::Merging.allows(JobPhase::Merging));
        assert!(!JobPhase::Finalized.allows(JobPhase::Failed));
        assert!(JobPhase::Failed.allows(JobPhase::Merging));
        assert!(!JobPhase::Finalized.allows(JobPhase::Merging));
    }
}
