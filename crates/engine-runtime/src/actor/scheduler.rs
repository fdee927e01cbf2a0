use engine_processing::controller::WakeOutcome;
use std::time::Duration;

/// Why a worker actor stopped waking itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Queue empty; `merged` is set on the worker that ran the merge.
    Drained { rows: u64, merged: bool },
    /// The job was not running for this worker.
    Idle,
    /// Repeated wake errors.
    GaveUp { error: String },
    Cancelled,
}

/// What the actor does after a wake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextWake {
    After(Duration),
    Exit(WorkerExit),
}

/// Maps a wake outcome onto the next continuation.
pub fn next_wake(outcome: &WakeOutcome, reschedule_delay: Duration) -> NextWake {
    match outcome {
        WakeOutcome::Idle => NextWake::Exit(WorkerExit::Idle),
        WakeOutcome::LockBusy => NextWake::After(reschedule_delay),
        WakeOutcome::Tripped { retry_after } => NextWake::After(*retry_after),
        WakeOutcome::Rescheduled { retry_after, .. } => NextWake::After(*retry_after),
        WakeOutcome::Drained { rows, merge } => NextWake::Exit(WorkerExit::Drained {
            rows: *rows,
            merged: merge.is_some(),
        }),
    }
}
