use crate::error::JobError;
use engine_core::{error::StateStoreError, state::StateStore, status::StatusSink};
use model::{
    core::{
        category::Category,
        identifiers::{RunId, WorkerId},
    },
    execution::job::{CategoryJobState, JobCounters, JobPhase, WorkerStatus},
};
use chrono::Utc;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{error, info};

/// Guarded transitions of a category's job state.
///
/// Every transition is a single transactional update in the state store;
/// the resulting state is mirrored to the status sink.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn StateStore>,
    status: Arc<dyn StatusSink>,
}

/// Counter deltas reported by a worker for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub files_routed: u64,
    pub files_failed: u64,
    pub rows_written: u64,
}

impl JobTracker {
    pub fn new(store: Arc<dyn StateStore>, status: Arc<dyn StatusSink>) -> Self {
        Self { store, status }
    }

    pub async fn load(&self, category: Category) -> Result<CategoryJobState, JobError> {
        Ok(self
            .store
            .load_job(category)
            .await?
            .unwrap_or_else(|| CategoryJobState::idle(category)))
    }

    /// Starts a new run: fresh run id, every worker pending, counters reset.
    pub async fn begin_split(&self, category: Category, workers: u32) -> Result<CategoryJobState, JobError> {
        let run_id = RunId::generate();
        let state = self
            .transition(category, JobPhase::Splitting, &|mut job: CategoryJobState| {
                job.run_id = Some(run_id.clone());
                job.workers = (1..=workers.max(1))
                    .map(|w| (w, WorkerStatus::Pending))
                    .collect();
                job.counters = JobCounters::default();
                job.last_error = None;
                Ok(job)
            })
            .await?;
        info!(category = %category, run_id = %run_id, workers, "Job entered splitting");
        Ok(state)
    }

    pub async fn mark_running(&self, category: Category, files: u64) -> Result<CategoryJobState, JobError> {
        self.transition(category, JobPhase::WorkersRunning, &|mut job: CategoryJobState| {
            job.counters.files_split = files;
            Ok(job)
        })
        .await
    }

    /// Marks a worker done. Returns the new state and whether this call moved
    /// the job to `Merging`; exactly one worker sees `true`.
    pub async fn report_done(
        &self,
        category: Category,
        worker_id: WorkerId,
        rows: u64,
    ) -> Result<(CategoryJobState, bool), JobError> {
        let won = AtomicBool::new(false);
        let update = |mut job: CategoryJobState| {
            won.store(false, Ordering::SeqCst);
            if job.phase != JobPhase::WorkersRunning {
                return Err(format!("job is {}, not workers_running", job.phase));
            }
            match job.workers.get_mut(&worker_id) {
                Some(status) => *status = WorkerStatus::Done { rows },
                None => return Err(format!("worker {worker_id} is not part of this run")),
            }
            if job.all_workers_done() {
                job.phase = JobPhase::Merging;
                won.store(true, Ordering::SeqCst);
            }
            job.updated_at = Utc::now();
            Ok(job)
        };

        let state = self.store.update_job(category, &update).await.map_err(|e| match e {
            StateStoreError::Rejected(_) => JobError::InvalidTransition {
                category,
                from: JobPhase::WorkersRunning,
                to: JobPhase::Merging,
            },
            other => JobError::State(other),
        })?;
        self.status.publish(&state).await;

        let won = won.load(Ordering::SeqCst);
        info!(category = %category, worker = worker_id, rows, merging = won, "Worker reported done");
        Ok((state, won))
    }

    pub async fn add_counts(&self, category: Category, delta: CounterDelta) -> Result<(), JobError> {
        if delta == CounterDelta::default() {
            return Ok(());
        }
        let update = |mut job: CategoryJobState| {
            job.counters.files_routed += delta.files_routed;
            job.counters.files_failed += delta.files_failed;
            job.counters.rows_written += delta.rows_written;
            job.updated_at = Utc::now();
            Ok(job)
        };
        let state = self.store.update_job(category, &update).await?;
        self.status.publish(&state).await;
        Ok(())
    }

    /// Re-enters `Merging` from `Failed` when every worker already finished.
    pub async fn retry_merge(&self, category: Category) -> Result<CategoryJobState, JobError> {
        self.transition(category, JobPhase::Merging, &|job: CategoryJobState| {
            if job.all_workers_done() {
                Ok(job)
            } else {
                Err("not every worker has reported done".to_string())
            }
        })
        .await
    }

    pub async fn finalize(
        &self,
        category: Category,
        rows_merged: u64,
        duplicate_rows: u64,
    ) -> Result<CategoryJobState, JobError> {
        let state = self
            .transition(category, JobPhase::Finalized, &|mut job: CategoryJobState| {
                job.counters.rows_merged = rows_merged;
                job.counters.duplicate_rows = duplicate_rows;
                Ok(job)
            })
            .await?;
        info!(category = %category, rows_merged, duplicate_rows, "Job finalized");
        Ok(state)
    }

    pub async fn fail(&self, category: Category, reason: &str) -> Result<CategoryJobState, JobError> {
        let state = self
            .transition(category, JobPhase::Failed, &|mut job: CategoryJobState| {
                job.last_error = Some(reason.to_string());
                Ok(job)
            })
            .await?;
        error!(category = %category, reason, "Job failed");
        Ok(state)
    }

    async fn transition(
        &self,
        category: Category,
        to: JobPhase,
        edit: &(dyn Fn(CategoryJobState) -> Result<CategoryJobState, String> + Send + Sync),
    ) -> Result<CategoryJobState, JobError> {
        let update = |job: CategoryJobState| {
            if !job.phase.allows(to) {
                return Err(format!("{} -> {}", job.phase, to));
            }
            let mut job = edit(job)?;
            job.phase = to;
            job.updated_at = Utc::now();
            Ok(job)
        };

        match self.store.update_job(category, &update).await {
            Ok(state) => {
                self.status.publish(&state).await;
                Ok(state)
            }
            Err(StateStoreError::Rejected(_)) => {
                let from = self.load(category).await?.phase;
                Err(JobError::InvalidTransition { category, from, to })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{state::sled_store::SledStateStore, status::NoopStatusSink};
    use tempfile::tempdir;

    fn tracker(dir: &std::path::Path) -> JobTracker {
        let store = Arc::new(SledStateStore::open(dir).unwrap());
        JobTracker::new(store, Arc::new(NoopStatusSink))
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let dir = tempdir().unwrap();
        let jobs = tracker(dir.path());
        let cat: Category = "Informasi LAZ".parse().unwrap();

        let split = jobs.begin_split(cat, 2).await.unwrap();
        assert_eq!(split.phase, JobPhase::Splitting);
        assert!(split.run_id.is_some());

        jobs.mark_running(cat, 4).await.unwrap();

        let (state, won) = jobs.report_done(cat, 1, 10).await.unwrap();
        assert!(!won);
        assert_eq!(state.phase, JobPhase::WorkersRunning);

        let (state, won) = jobs.report_done(cat, 2, 5).await.unwrap();
        assert!(won);
        assert_eq!(state.phase, JobPhase::Merging);

        // a late duplicate report cannot win again
        assert!(matches!(
            jobs.report_done(cat, 2, 5).await,
            Err(JobError::InvalidTransition { .. })
        ));

        let done = jobs.finalize(cat, 15, 1).await.unwrap();
        assert_eq!(done.phase, JobPhase::Finalized);
        assert_eq!(done.counters.rows_merged, 15);
        assert_eq!(done.counters.files_split, 4);
    }

    #[tokio::test]
    async fn invalid_transitions_are_rejected() {
        let dir = tempdir().unwrap();
        let jobs = tracker(dir.path());
        let cat: Category = "Informasi LAZ".parse().unwrap();

        let err = jobs.finalize(cat, 0, 0).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidTransition {
                from: JobPhase::Idle,
                to: JobPhase::Finalized,
                ..
            }
        ));
        assert_eq!(jobs.load(cat).await.unwrap().phase, JobPhase::Idle);
    }

    #[tokio::test]
    async fn failed_merge_can_be_retried() {
        let dir = tempdir().unwrap();
        let jobs = tracker(dir.path());
        let cat: Category = "Proyeksi TIK".parse().unwrap();

        jobs.begin_split(cat, 1).await.unwrap();
        jobs.mark_running(cat, 1).await.unwrap();
        jobs.report_done(cat, 1, 3).await.unwrap();
        jobs.fail(cat, "canonical table missing").await.unwrap();

        let state = jobs.retry_merge(cat).await.unwrap();
        assert_eq!(state.phase, JobPhase::Merging);
        assert_eq!(state.last_error.as_deref(), Some("canonical table missing"));
    }
}
