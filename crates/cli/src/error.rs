use connectors::error::FileError;
use engine_config::{error::RuleStoreError, settings::error::SettingsError};
use engine_core::error::StateStoreError;
use engine_processing::error::{ControllerError, JobError, MergeError, SplitError};
use engine_runtime::error::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid env file: {0}")]
    EnvFile(String),

    #[error("Rule store error: {0}")]
    Rules(#[from] RuleStoreError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Failed to read sheet: {0}")]
    Sheet(#[from] FileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Wake(#[from] ControllerError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
