use crate::{
    error::StateStoreError,
    state::{
        JobUpdate, StateStore,
        models::{BreakerFlag, LockRecord},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::{
        category::Category,
        identifiers::{RunId, WorkerId},
    },
    execution::{checkpoint::RunCheckpoint, job::CategoryJobState, outcome::FileOutcome},
};
use serde::{Serialize, de::DeserializeOwned};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::{path::Path, time::Duration};
use tracing::debug;

pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn chk_key(category: Category, worker_id: WorkerId) -> String {
        format!("chk:{}:{}", category.slug(), worker_id)
    }

    #[inline]
    fn job_key(category: Category) -> String {
        format!("job:{}", category.slug())
    }

    #[inline]
    fn lock_key(name: &str) -> String {
        format!("lock:{name}")
    }

    #[inline]
    fn brk_key(category: Category) -> String {
        format!("brk:{}", category.slug())
    }

    #[inline]
    fn led_prefix(category: Category, run_id: &RunId) -> String {
        format!("led:{}:{}:", category.slug(), run_id)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateStoreError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StateStoreError> {
        let bytes = bincode::serialize(value)?;
        self.db.insert(key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StateStoreError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (_key, value) = item?;
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }
}

fn abort<E: Into<StateStoreError>>(err: E) -> ConflictableTransactionError<StateStoreError> {
    ConflictableTransactionError::Abort(err.into())
}

fn unwrap_tx<T>(result: Result<T, TransactionError<StateStoreError>>) -> Result<T, StateStoreError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn save_checkpoint(&self, cp: &RunCheckpoint) -> Result<(), StateStoreError> {
        self.put(&Self::chk_key(cp.category, cp.worker_id), cp)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn load_checkpoint(
        &self,
        category: Category,
        worker_id: WorkerId,
    ) -> Result<Option<RunCheckpoint>, StateStoreError> {
        self.get(&Self::chk_key(category, worker_id))
    }

    async fn clear_checkpoint(
        &self,
        category: Category,
        worker_id: WorkerId,
    ) -> Result<(), StateStoreError> {
        self.db.remove(Self::chk_key(category, worker_id))?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn touch_checkpoint(
        &self,
        category: Category,
        worker_id: WorkerId,
    ) -> Result<bool, StateStoreError> {
        // Read-modify-write as one compare-and-swap, so a concurrent save by
        // the lock holder is never rolled back to an older checkpoint.
        let touched = self
            .db
            .update_and_fetch(Self::chk_key(category, worker_id), |old| {
                let bytes = old?;
                match bincode::deserialize::<RunCheckpoint>(bytes) {
                    Ok(mut cp) => {
                        cp.touch();
                        Some(bincode::serialize(&cp).unwrap_or_else(|_| bytes.to_vec()))
                    }
                    Err(_) => Some(bytes.to_vec()),
                }
            })?
            .is_some();
        if touched {
            self.db.flush_async().await?;
        }
        Ok(touched)
    }

    async fn load_job(
        &self,
        category: Category,
    ) -> Result<Option<CategoryJobState>, StateStoreError> {
        self.get(&Self::job_key(category))
    }

    async fn list_jobs(&self) -> Result<Vec<CategoryJobState>, StateStoreError> {
        self.scan("job:")
    }

    async fn update_job(
        &self,
        category: Category,
        update: JobUpdate<'_>,
    ) -> Result<CategoryJobState, StateStoreError> {
        let key = Self::job_key(category);

        // Check-then-set in one transaction: concurrent callers racing for the
        // same transition see each other's writes and only one guard passes.
        let result = self.db.transaction(|tx| {
            let current = match tx.get(key.as_bytes())? {
                Some(bytes) => bincode::deserialize::<CategoryJobState>(&bytes).map_err(abort)?,
                None => CategoryJobState::idle(category),
            };

            let next = update(current).map_err(|reason| abort(StateStoreError::Rejected(reason)))?;
            let bytes = bincode::serialize(&next).map_err(abort)?;
            tx.insert(key.as_bytes(), bytes)?;
            Ok(next)
        });

        let next = unwrap_tx(result)?;
        self.db.flush_async().await?;
        debug!(category = %category, phase = %next.phase, "Job state updated");
        Ok(next)
    }

    async fn try_lock(
        &self,
        name: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let key = Self::lock_key(name);
        let now = Utc::now();
        let record = LockRecord {
            owner: owner.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::milliseconds(ttl.as_millis() as i64),
        };
        let bytes = bincode::serialize(&record)?;

        let result = self.db.transaction(|tx| {
            if let Some(existing) = tx.get(key.as_bytes())? {
                let held: LockRecord = bincode::deserialize(&existing).map_err(abort)?;
                if held.owner != owner && !held.is_expired(now) {
                    return Ok(false);
                }
            }
            tx.insert(key.as_bytes(), bytes.as_slice())?;
            Ok(true)
        });

        unwrap_tx(result)
    }

    async fn release_lock(&self, name: &str, owner: &str) -> Result<(), StateStoreError> {
        let key = Self::lock_key(name);
        let result = self.db.transaction(|tx| {
            if let Some(existing) = tx.get(key.as_bytes())? {
                let held: LockRecord = bincode::deserialize(&existing).map_err(abort)?;
                if held.owner == owner {
                    tx.remove(key.as_bytes())?;
                }
            }
            Ok(())
        });
        unwrap_tx(result)
    }

    async fn lock_holder(&self, name: &str) -> Result<Option<LockRecord>, StateStoreError> {
        Ok(self
            .get::<LockRecord>(&Self::lock_key(name))?
            .filter(|l| !l.is_expired(Utc::now())))
    }

    async fn set_breaker(
        &self,
        category: Category,
        flag: &BreakerFlag,
    ) -> Result<(), StateStoreError> {
        self.put(&Self::brk_key(category), flag)
    }

    async fn clear_breaker(&self, category: Category) -> Result<(), StateStoreError> {
        self.db.remove(Self::brk_key(category))?;
        Ok(())
    }

    async fn load_breaker(
        &self,
        category: Category,
    ) -> Result<Option<BreakerFlag>, StateStoreError> {
        self.get(&Self::brk_key(category))
    }

    async fn record_outcome(&self, outcome: &FileOutcome) -> Result<(), StateStoreError> {
        let key = format!(
            "{}{}",
            Self::led_prefix(outcome.category, &outcome.run_id),
            outcome.file
        );
        self.put(&key, outcome)
    }

    async fn find_outcome(
        &self,
        category: Category,
        run_id: &RunId,
        file: &str,
    ) -> Result<Option<FileOutcome>, StateStoreError> {
        self.get(&format!("{}{}", Self::led_prefix(category, run_id), file))
    }

    async fn list_outcomes(
        &self,
        category: Category,
        run_id: &RunId,
    ) -> Result<Vec<FileOutcome>, StateStoreError> {
        self.scan(&Self::led_prefix(category, run_id))
    }
}
