use crate::{
    core::{
        category::Category,
        identifiers::{RunId, WorkerId},
    },
    execution::routing::Bucket,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger entry written once a file reaches its bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file: String,
    pub category: Category,
    pub run_id: RunId,
    pub worker_id: WorkerId,
    pub bucket: Bucket,
    pub rows: u64,
    pub attempts: usize,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Files assigned to one worker by the partitioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPartition {
    pub worker_id: WorkerId,
    pub files: Vec<String>,
}
