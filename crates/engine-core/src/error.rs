use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("State storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Failed to encode or decode state record: {0}")]
    Codec(#[from] bincode::Error),

    /// A check-then-set update was refused by its guard.
    #[error("State update rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Table '{0}' does not exist")]
    NotFound(String),

    #[error("Table '{0}' already exists")]
    AlreadyExists(String),

    #[error("Table '{table}' has {rows} rows, cannot truncate to {keep}")]
    Truncate { table: String, rows: u64, keep: u64 },

    #[error("Table I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table CSV error: {0}")]
    Csv(#[from] csv::Error),
}
