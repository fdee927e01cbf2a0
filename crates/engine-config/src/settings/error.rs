use thiserror::Error;

/// Errors raised while reading engine settings from the environment.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A variable was present but could not be parsed.
    #[error("Invalid value '{value}' for SHEETFLOW_{key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    /// Values parsed but contradict each other.
    #[error("Settings validation failed: {0:?}")]
    ValidationFailed(Vec<String>),
}
