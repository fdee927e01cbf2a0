use connectors::error::FileError;
use engine_config::error::RuleStoreError;
use engine_core::error::{StateStoreError, TableError};
use model::{
    core::{category::Category, identifiers::WorkerId},
    execution::job::JobPhase,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("No category rule matched '{file}'")]
    Unknown { file: String },

    #[error("'{file}' looks like {found}, not {expected}")]
    Mismatch {
        file: String,
        expected: Category,
        found: Category,
    },
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("No reference table for {0}")]
    MissingReference(Category),

    #[error("Sample column {column} is outside the {width}-column header of '{file}'")]
    SampleColumnOutOfRange {
        file: String,
        column: usize,
        width: usize,
    },
}

/// Everything that can go wrong while processing one queued file.
#[derive(Error, Debug)]
pub enum FileFault {
    #[error("Failed to read file: {0}")]
    Read(#[source] FileError),

    #[error("Unreadable sheet: {0}")]
    Parse(#[source] FileError),

    #[error("duplicate")]
    Duplicate,

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Rule store fault: {0}")]
    Config(#[from] RuleStoreError),

    #[error("Worker table fault: {0}")]
    Table(#[from] TableError),

    #[error("State fault: {0}")]
    State(#[from] StateStoreError),

    #[error("Failed to move file: {0}")]
    Move(#[source] FileError),
}

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("File store error while partitioning: {0}")]
    Store(#[from] FileError),

    #[error("Inbox of {category} still holds {remaining} file(s) after {attempts} pass(es)")]
    Undrained {
        category: Category,
        remaining: usize,
        attempts: usize,
    },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Job for {category} cannot move from {from} to {to}")]
    InvalidTransition {
        category: Category,
        from: JobPhase,
        to: JobPhase,
    },
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Worker {worker_id} of {category} reported {rows} row(s) but its table is missing")]
    MissingWorkerTable {
        category: Category,
        worker_id: WorkerId,
        rows: u64,
    },

    #[error("Canonical table '{0}' is missing")]
    MissingCanonical(String),

    #[error("Job for {0} has no run id")]
    MissingRun(Category),

    #[error("Not every worker of {0} has reported done")]
    WorkersPending(Category),

    #[error("Table error during merge: {0}")]
    Table(#[from] TableError),

    #[error("Rule store error during merge: {0}")]
    Config(#[from] RuleStoreError),

    #[error("Job state error during merge: {0}")]
    Job(#[from] JobError),
}

/// Faults that abort a whole wake; the next scheduled wake resumes from checkpoint.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Rule store fault: {0}")]
    Config(#[from] RuleStoreError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Worker table error: {0}")]
    Table(#[from] TableError),

    #[error("File store error: {0}")]
    Store(#[from] FileError),

    #[error("Job state error: {0}")]
    Job(#[from] JobError),

    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("Job state error: {0}")]
    Job(#[from] JobError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Rule store fault: {0}")]
    Config(#[from] RuleStoreError),

    #[error("File store error: {0}")]
    Store(#[from] FileError),
}
