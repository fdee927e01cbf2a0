use crate::{
    core::{
        category::Category,
        identifiers::{RunId, WorkerId},
    },
    events::Event,
    execution::routing::Bucket,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything a category run reports while it moves from split to merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    SplitCompleted {
        category: Category,
        run_id: RunId,
        files: usize,
        workers: u32,
        timestamp: DateTime<Utc>,
    },

    FileRouted {
        category: Category,
        worker_id: WorkerId,
        file: String,
        bucket: Bucket,
        rows: u64,
        timestamp: DateTime<Utc>,
    },

    /// A file gave up after its retry budget; sent exactly once per file.
    FileFailed {
        category: Category,
        worker_id: WorkerId,
        file: String,
        error: String,
        attempts: usize,
        timestamp: DateTime<Utc>,
    },

    BatchRescheduled {
        category: Category,
        worker_id: WorkerId,
        processed: usize,
        remaining: usize,
        continuation: u32,
        timestamp: DateTime<Utc>,
    },

    WorkerDrained {
        category: Category,
        worker_id: WorkerId,
        rows: u64,
        timestamp: DateTime<Utc>,
    },

    MergeCompleted {
        category: Category,
        run_id: RunId,
        rows: u64,
        duplicate_rows: u64,
        timestamp: DateTime<Utc>,
    },

    CriticalError {
        category: Option<Category>,
        context: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    pub fn category(&self) -> Option<Category> {
        match self {
            PipelineEvent::SplitCompleted { category, .. }
            | PipelineEvent::FileRouted { category, .. }
            | PipelineEvent::FileFailed { category, .. }
            | PipelineEvent::BatchRescheduled { category, .. }
            | PipelineEvent::WorkerDrained { category, .. }
            | PipelineEvent::MergeCompleted { category, .. } => Some(*category),
            PipelineEvent::CriticalError { category, .. } => *category,
        }
    }

    /// Events operators are paged for.
    pub fn is_notifiable(&self) -> bool {
        matches!(
            self,
            PipelineEvent::FileFailed { .. }
                | PipelineEvent::MergeCompleted { .. }
                | PipelineEvent::CriticalError { .. }
        )
    }
}

impl Event for PipelineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::SplitCompleted { .. } => "split.completed",
            PipelineEvent::FileRouted { .. } => "file.routed",
            PipelineEvent::FileFailed { .. } => "file.failed",
            PipelineEvent::BatchRescheduled { .. } => "batch.rescheduled",
            PipelineEvent::WorkerDrained { .. } => "worker.drained",
            PipelineEvent::MergeCompleted { .. } => "merge.completed",
            PipelineEvent::CriticalError { .. } => "critical.error",
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::SplitCompleted {
                category,
                run_id,
                files,
                workers,
                timestamp,
            } => write!(
                f,
                "[{}] {category}: split {files} file(s) across {workers} worker(s) (run={run_id})",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
            ),

            PipelineEvent::FileRouted {
                category,
                worker_id,
                file,
                bucket,
                rows,
                timestamp,
            } => write!(
                f,
                "[{}] {category} worker {worker_id}: {file} -> {bucket} ({rows} rows)",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
            ),

            PipelineEvent::FileFailed {
                category,
                worker_id,
                file,
                error,
                attempts,
                timestamp,
            } => write!(
                f,
                "[{}] {category} worker {worker_id}: {file} failed after {attempts} attempt(s): {error}",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
            ),

            PipelineEvent::BatchRescheduled {
                category,
                worker_id,
                processed,
                remaining,
                continuation,
                timestamp,
            } => write!(
                f,
                "[{}] {category} worker {worker_id}: processed {processed}, {remaining} left, continuation #{continuation}",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
            ),

            PipelineEvent::WorkerDrained {
                category,
                worker_id,
                rows,
                timestamp,
            } => write!(
                f,
                "[{}] {category} worker {worker_id}: queue drained ({rows} rows)",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
            ),

            PipelineEvent::MergeCompleted {
                category,
                run_id,
                rows,
                duplicate_rows,
                timestamp,
            } => write!(
                f,
                "[{}] {category}: merge finished with {rows} rows, {duplicate_rows} duplicate(s) (run={run_id})",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
            ),

            PipelineEvent::CriticalError {
                category,
                context,
                error,
                timestamp,
            } => {
                write!(f, "[{}] CRITICAL ", timestamp.format("%Y-%m-%d %H:%M:%S"))?;
                if let Some(category) = category {
                    write!(f, "{category} ")?;
                }
                write!(f, "{context}: {error}")
            }
        }
    }
}
