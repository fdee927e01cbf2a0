use crate::error::FileError;
use async_trait::async_trait;
use model::{
    core::{category::Category, identifiers::WorkerId},
    execution::routing::Bucket,
};
use std::path::{Path, PathBuf};

pub mod local;

/// Shared hierarchical store files arrive in and are moved through.
///
/// Folders are store-relative paths; see [`StoreLayout`].
#[async_trait]
pub trait FileStore: Send + Sync {
    /// File names directly under `dir`, sorted. A missing folder lists empty.
    async fn list(&self, dir: &Path) -> Result<Vec<String>, FileError>;

    async fn read(&self, dir: &Path, name: &str) -> Result<Vec<u8>, FileError>;

    /// Moves `name` from `from` into `to`, creating `to` if needed. A file of
    /// the same name already in `to` is kept; the moved one gets a ` (n)` suffix.
    async fn move_file(&self, from: &Path, name: &str, to: &Path) -> Result<(), FileError>;

    async fn put(&self, dir: &Path, name: &str, bytes: &[u8]) -> Result<(), FileError>;
}

/// Folder conventions inside the store.
pub struct StoreLayout;

impl StoreLayout {
    pub fn inbox(category: Category) -> PathBuf {
        PathBuf::from("inbox").join(category.to_string())
    }

    pub fn queue(category: Category, worker_id: WorkerId) -> PathBuf {
        PathBuf::from("queue")
            .join(category.to_string())
            .join(format!("worker-{worker_id}"))
    }

    pub fn bucket(category: Category, bucket: &Bucket) -> PathBuf {
        PathBuf::from("routed")
            .join(category.to_string())
            .join(bucket.folder())
    }
}
