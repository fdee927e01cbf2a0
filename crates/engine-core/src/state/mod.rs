use crate::{
    error::StateStoreError,
    state::models::{BreakerFlag, LockRecord},
};
use async_trait::async_trait;
use model::{
    core::{
        category::Category,
        identifiers::{RunId, WorkerId},
    },
    execution::{checkpoint::RunCheckpoint, job::CategoryJobState, outcome::FileOutcome},
};
use std::time::Duration;

pub mod models;
pub mod sled_store;

/// Guarded update applied to a category's job state inside one transaction.
/// Returning `Err` leaves the stored state untouched.
pub type JobUpdate<'a> =
    &'a (dyn Fn(CategoryJobState) -> Result<CategoryJobState, String> + Send + Sync);

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_checkpoint(&self, cp: &RunCheckpoint) -> Result<(), StateStoreError>;
    async fn load_checkpoint(
        &self,
        category: Category,
        worker_id: WorkerId,
    ) -> Result<Option<RunCheckpoint>, StateStoreError>;
    async fn clear_checkpoint(
        &self,
        category: Category,
        worker_id: WorkerId,
    ) -> Result<(), StateStoreError>;
    /// Bumps `last_heartbeat` of a stored checkpoint in place, leaving every
    /// other field as the owner last wrote it. Returns whether one existed.
    async fn touch_checkpoint(
        &self,
        category: Category,
        worker_id: WorkerId,
    ) -> Result<bool, StateStoreError>;

    async fn load_job(&self, category: Category)
    -> Result<Option<CategoryJobState>, StateStoreError>;
    async fn list_jobs(&self) -> Result<Vec<CategoryJobState>, StateStoreError>;
    /// Applies `update` to the stored state (or a fresh idle state) atomically.
    async fn update_job(
        &self,
        category: Category,
        update: JobUpdate<'_>,
    ) -> Result<CategoryJobState, StateStoreError>;

    /// Takes `name` for `owner` unless somebody else holds an unexpired lock.
    async fn try_lock(&self, name: &str, owner: &str, ttl: Duration)
    -> Result<bool, StateStoreError>;
    async fn release_lock(&self, name: &str, owner: &str) -> Result<(), StateStoreError>;
    async fn lock_holder(&self, name: &str) -> Result<Option<LockRecord>, StateStoreError>;

    async fn set_breaker(&self, category: Category, flag: &BreakerFlag)
    -> Result<(), StateStoreError>;
    async fn clear_breaker(&self, category: Category) -> Result<(), StateStoreError>;
    async fn load_breaker(&self, category: Category)
    -> Result<Option<BreakerFlag>, StateStoreError>;

    async fn record_outcome(&self, outcome: &FileOutcome) -> Result<(), StateStoreError>;
    async fn find_outcome(
        &self,
        category: Category,
        run_id: &RunId,
        file: &str,
    ) -> Result<Option<FileOutcome>, StateStoreError>;
    async fn list_outcomes(
        &self,
        category: Category,
        run_id: &RunId,
    ) -> Result<Vec<FileOutcome>, StateStoreError>;
}
