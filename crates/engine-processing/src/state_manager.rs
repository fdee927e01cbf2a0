use crate::{error::ControllerError, item::WorkerKey};
use connectors::store::{FileStore, StoreLayout};
use engine_core::{
    error::StateStoreError,
    state::StateStore,
    tables::{TableNames, TableStore},
};
use model::{
    core::identifiers::RunId,
    execution::checkpoint::{PendingFile, RunCheckpoint, WorkerState},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads, repairs and persists one worker's checkpoint.
pub struct CheckpointManager {
    key: WorkerKey,
    state: Arc<dyn StateStore>,
    tables: Arc<dyn TableStore>,
    files: Arc<dyn FileStore>,
}

impl CheckpointManager {
    pub fn new(
        key: WorkerKey,
        state: Arc<dyn StateStore>,
        tables: Arc<dyn TableStore>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            key,
            state,
            tables,
            files,
        }
    }

    pub fn key(&self) -> &WorkerKey {
        &self.key
    }

    /// Returns the checkpoint to continue `run_id` from.
    ///
    /// A pending marker means the last wake died while appending a file:
    /// - file still queued: its rows may be half written, so the worker table
    ///   is truncated back to the marker and the file is processed again;
    /// - file gone from the queue: it reached its bucket, so the table's
    ///   current length is authoritative.
    pub async fn resume(&self, run_id: &RunId) -> Result<RunCheckpoint, ControllerError> {
        let category = self.key.category();
        let worker_id = self.key.worker_id();
        let table = TableNames::worker(category, worker_id);

        let stored = self.state.load_checkpoint(category, worker_id).await?;
        let mut cp = match stored {
            Some(cp) if &cp.run_id == run_id => cp,
            Some(stale) => {
                warn!(
                    worker = %self.key,
                    stale_run = %stale.run_id,
                    run_id = %run_id,
                    "Discarding checkpoint of an earlier run"
                );
                RunCheckpoint::start(category, worker_id, run_id.clone())
            }
            None => {
                // Every append is preceded by a saved checkpoint, so rows
                // without one were committed by a wake whose checkpoint was
                // cleared before the worker reported done.
                let mut cp = RunCheckpoint::start(category, worker_id, run_id.clone());
                cp.next_row = self.table_rows(&table).await?;
                if cp.next_row > 0 {
                    warn!(
                        worker = %self.key,
                        rows = cp.next_row,
                        "No checkpoint found, keeping rows already in the worker table"
                    );
                } else {
                    debug!(worker = %self.key, "No checkpoint found, starting from the first row");
                }
                cp
            }
        };

        if let Some(pending) = cp.pending.take() {
            let queued = self
                .files
                .list(&StoreLayout::queue(category, worker_id))
                .await?
                .contains(&pending.name);

            if queued {
                if self.tables.exists(&table).await? {
                    self.tables.truncate(&table, pending.rows_before).await?;
                }
                cp.next_row = pending.rows_before;
                warn!(
                    worker = %self.key,
                    file = %pending.name,
                    rows = pending.rows_before,
                    "Rolled back partial append of interrupted file"
                );
            } else {
                cp.next_row = self.table_rows(&table).await?;
                info!(
                    worker = %self.key,
                    file = %pending.name,
                    next_row = cp.next_row,
                    "Interrupted file had already been routed"
                );
            }
        } else if self.tables.exists(&table).await? {
            let rows = self.table_rows(&table).await?;
            if rows > cp.next_row {
                self.tables.truncate(&table, cp.next_row).await?;
                warn!(worker = %self.key, rows, next_row = cp.next_row, "Trimmed rows beyond checkpoint");
            }
        }

        cp.state = WorkerState::BatchRunning;
        cp.touch();
        self.state.save_checkpoint(&cp).await?;
        info!(worker = %self.key, next_row = cp.next_row, continuations = cp.continuations, "Resuming worker");
        Ok(cp)
    }

    /// Records that `file` is about to be appended on top of `rows_before` rows.
    pub async fn begin_file(
        &self,
        cp: &mut RunCheckpoint,
        file: &str,
        rows_before: u64,
    ) -> Result<(), StateStoreError> {
        cp.pending = Some(PendingFile {
            name: file.to_string(),
            rows_before,
        });
        cp.touch();
        self.state.save_checkpoint(cp).await?;
        Ok(())
    }

    pub async fn commit(&self, cp: &mut RunCheckpoint) -> Result<(), ControllerError> {
        cp.pending = None;
        cp.touch();
        self.state.save_checkpoint(cp).await?;
        Ok(())
    }

    /// Refreshes the heartbeat of a stored checkpoint, if any. Safe to call
    /// without holding the worker lock.
    pub async fn heartbeat(&self) -> Result<(), ControllerError> {
        let touched = self
            .state
            .touch_checkpoint(self.key.category(), self.key.worker_id())
            .await?;
        if !touched {
            debug!(worker = %self.key, "No checkpoint to refresh");
        }
        Ok(())
    }

    pub async fn finish(&self) -> Result<(), ControllerError> {
        self.state
            .clear_checkpoint(self.key.category(), self.key.worker_id())
            .await?;
        debug!(worker = %self.key, "Cleared checkpoint");
        Ok(())
    }

    async fn table_rows(&self, table: &str) -> Result<u64, ControllerError> {
        if self.tables.exists(table).await? {
            Ok(self.tables.row_count(table).await?)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::store::local::LocalFileStore;
    use engine_core::{state::sled_store::SledStateStore, tables::csv_store::CsvTableStore};
    use model::core::category::Category;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        manager: CheckpointManager,
        tables: Arc<CsvTableStore>,
        files: Arc<LocalFileStore>,
        state: Arc<SledStateStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let state = Arc::new(SledStateStore::open(dir.path().join("state")).unwrap());
        let tables = Arc::new(CsvTableStore::open(dir.path().join("tables")).unwrap());
        let files = Arc::new(LocalFileStore::new(dir.path().join("store")));
        let cat: Category = "Export SKU TOK".parse().unwrap();
        let manager = CheckpointManager::new(
            WorkerKey::new(cat, 1),
            state.clone(),
            tables.clone(),
            files.clone(),
        );
        Fixture {
            _dir: dir,
            manager,
            tables,
            files,
            state,
        }
    }

    fn rows(n: usize) -> Vec<Vec<String>> {
        (0..n).map(|i| vec![i.to_string()]).collect()
    }

    #[tokio::test]
    async fn interrupted_append_is_rolled_back() {
        let f = fixture();
        let key = *f.manager.key();
        let table = TableNames::worker(key.category(), 1);
        let run = RunId::new("run-1");

        f.tables.create(&table, &["id".to_string()]).await.unwrap();
        f.files
            .put(&StoreLayout::queue(key.category(), 1), "b.csv", b"x")
            .await
            .unwrap();

        let mut cp = f.manager.resume(&run).await.unwrap();
        f.tables.append(&table, &rows(3)).await.unwrap();
        cp.next_row = 3;
        f.manager.commit(&mut cp).await.unwrap();
        f.manager.begin_file(&mut cp, "b.csv", 3).await.unwrap();
        // crash halfway through the append
        f.tables.append(&table, &rows(2)).await.unwrap();

        let cp = f.manager.resume(&run).await.unwrap();
        assert_eq!(cp.next_row, 3);
        assert!(cp.pending.is_none());
        assert_eq!(f.tables.row_count(&table).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn routed_file_keeps_its_rows() {
        let f = fixture();
        let key = *f.manager.key();
        let table = TableNames::worker(key.category(), 1);
        let run = RunId::new("run-1");

        f.tables.create(&table, &["id".to_string()]).await.unwrap();
        let mut cp = f.manager.resume(&run).await.unwrap();
        f.manager.begin_file(&mut cp, "gone.csv", 0).await.unwrap();
        f.tables.append(&table, &rows(4)).await.unwrap();

        let cp = f.manager.resume(&run).await.unwrap();
        assert_eq!(cp.next_row, 4);
    }

    #[tokio::test]
    async fn missing_checkpoint_keeps_committed_rows() {
        let f = fixture();
        let key = *f.manager.key();
        let table = TableNames::worker(key.category(), 1);

        f.tables.create(&table, &["id".to_string()]).await.unwrap();
        f.tables.append(&table, &rows(4)).await.unwrap();

        let cp = f.manager.resume(&RunId::new("run-1")).await.unwrap();
        assert_eq!(cp.next_row, 4);
        assert_eq!(f.tables.row_count(&table).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn rows_beyond_checkpoint_are_trimmed() {
        let f = fixture();
        let key = *f.manager.key();
        let table = TableNames::worker(key.category(), 1);
        let run = RunId::new("run-1");

        f.tables.create(&table, &["id".to_string()]).await.unwrap();
        let mut cp = f.manager.resume(&run).await.unwrap();
        f.tables.append(&table, &rows(2)).await.unwrap();
        cp.next_row = 2;
        f.manager.commit(&mut cp).await.unwrap();
        f.tables.append(&table, &rows(3)).await.unwrap();

        let cp = f.manager.resume(&run).await.unwrap();
        assert_eq!(cp.next_row, 2);
        assert_eq!(f.tables.row_count(&table).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stale_run_starts_over() {
        let f = fixture();
        let key = *f.manager.key();
        let mut old = RunCheckpoint::start(key.category(), 1, RunId::new("old"));
        old.next_row = 9;
        f.state.save_checkpoint(&old).await.unwrap();

        let cp = f.manager.resume(&RunId::new("new")).await.unwrap();
        assert_eq!(cp.next_row, 0);
        assert_eq!(cp.run_id, RunId::new("new"));

        f.manager.finish().await.unwrap();
        assert!(
            f.state
                .load_checkpoint(key.category(), 1)
                .await
                .unwrap()
                .is_none()
        );
    }
}
