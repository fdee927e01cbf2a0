use crate::error::TableError;
use async_trait::async_trait;
use model::core::{category::Category, identifiers::WorkerId};

pub mod csv_store;

/// Named tables with a header row followed by data rows of display strings.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, TableError>;

    /// Creates an empty table; fails if it already exists.
    async fn create(&self, name: &str, header: &[String]) -> Result<(), TableError>;

    async fn header(&self, name: &str) -> Result<Vec<String>, TableError>;

    async fn append(&self, name: &str, rows: &[Vec<String>]) -> Result<(), TableError>;

    /// Data rows, header excluded.
    async fn rows(&self, name: &str) -> Result<Vec<Vec<String>>, TableError>;

    async fn row_count(&self, name: &str) -> Result<u64, TableError>;

    /// Keeps the header and the first `keep` data rows.
    async fn truncate(&self, name: &str, keep: u64) -> Result<(), TableError>;

    /// Atomically moves `source` over `target`, replacing it.
    async fn replace(&self, source: &str, target: &str) -> Result<(), TableError>;

    /// Removes a table. Missing tables are not an error.
    async fn drop_table(&self, name: &str) -> Result<(), TableError>;

    async fn list(&self) -> Result<Vec<String>, TableError>;
}

/// Naming of the per-category canonical, worker and scratch tables.
pub struct TableNames;

impl TableNames {
    pub fn canonical(category: Category) -> String {
        category.slug()
    }

    pub fn worker(category: Category, worker_id: WorkerId) -> String {
        format!("{}__worker_{worker_id}", category.slug())
    }

    pub fn scratch(category: Category) -> String {
        format!("{}__scratch", category.slug())
    }

    /// Whether `table` is a worker or scratch table of `category`.
    pub fn is_transient_of(category: Category, table: &str) -> bool {
        table
            .strip_prefix(&category.slug())
            .is_some_and(|rest| rest.starts_with("__"))
    }
}
