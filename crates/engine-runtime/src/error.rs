use engine_config::{error::RuleStoreError, settings::error::SettingsError};
use engine_core::error::{StateStoreError, TableError};
use engine_processing::error::{ControllerError, JobError, MergeError, SplitError};
use thiserror::Error;

/// Errors surfaced by orchestration and collaborators.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Rule store error: {0}")]
    Rules(#[from] RuleStoreError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Split failed: {0}")]
    Split(#[from] SplitError),

    #[error("Worker wake failed: {0}")]
    Controller(#[from] ControllerError),

    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Job state error: {0}")]
    Job(#[from] JobError),

    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// The task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox of {0} closed")]
    MailboxClosed(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook gave up after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },
}
