use crate::partition::natural_cmp;
use model::execution::{
    checkpoint::{RunCheckpoint, WorkerState},
    routing::Bucket,
};

/// How one file of a batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResult {
    Routed { bucket: Bucket, rows: u64 },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Rescheduled { processed: usize, remaining: usize },
    Drained { rows: u64 },
}

/// The next files to process, in partition order.
pub fn next_batch(mut queue: Vec<String>, batch_size: usize) -> Vec<String> {
    queue.sort_by(|a, b| natural_cmp(a, b));
    queue.truncate(batch_size.max(1));
    queue
}

/// Folds a finished file into the checkpoint.
pub fn record_file(mut cp: RunCheckpoint, result: &FileResult) -> RunCheckpoint {
    match result {
        FileResult::Routed { rows, .. } => {
            cp.next_row += rows;
            cp.files_done += 1;
        }
        FileResult::Failed => cp.files_failed += 1,
    }
    cp.pending = None;
    cp
}

/// Closes a batch: either the queue is empty and the worker is drained, or
/// another continuation is needed.
pub fn advance(
    mut cp: RunCheckpoint,
    processed: usize,
    remaining: usize,
) -> (RunCheckpoint, BatchOutcome) {
    cp.touch();
    if remaining == 0 {
        cp.state = WorkerState::Drained;
        let rows = cp.next_row;
        (cp, BatchOutcome::Drained { rows })
    } else {
        cp.state = WorkerState::Rescheduled;
        cp.continuations += 1;
        (
            cp,
            BatchOutcome::Rescheduled {
                processed,
                remaining,
            },
        )
    }
}
