use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file format for '{name}': {reason}")]
    InvalidFormat { name: String, reason: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("File store unavailable: {0}")]
    Unavailable(String),
}

impl FileError {
    /// Faults about the file itself, which no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            FileError::InvalidFormat { .. }
                | FileError::CsvError(_)
                | FileError::Workbook(_)
                | FileError::NotFound(_)
        )
    }
}
