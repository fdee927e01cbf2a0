use crate::{
    cb::{CircuitBreaker, CircuitBreakerState},
    classify::Classifier,
    context::PipelineContext,
    controller::checkpoint::{BatchOutcome, FileResult, advance, next_batch, record_file},
    error::{ClassifyError, ControllerError, FileFault},
    item::WorkerKey,
    job::CounterDelta,
    merge::{MergeReducer, MergeReport},
    retry::classify_file_fault,
    routing::Router,
    state_manager::CheckpointManager,
    transform::{ColumnPlan, extract_rows},
};
use chrono::Utc;
use connectors::{file::read_sheet, store::StoreLayout};
use engine_config::rules::RuleSnapshot;
use engine_core::{
    retry::{RetryError, RetryPolicy},
    tables::TableNames,
};
use model::{
    events::pipeline::PipelineEvent,
    execution::{
        checkpoint::{RunCheckpoint, WorkerState},
        job::{JobPhase, WorkerStatus},
        outcome::FileOutcome,
        routing::{Bucket, RoutingDecision},
    },
};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub mod checkpoint;

/// What one wake of a worker did.
#[derive(Debug, Clone, PartialEq)]
pub enum WakeOutcome {
    /// The job is not running or this worker already finished.
    Idle,
    /// Another wake holds this worker's lock.
    LockBusy,
    /// The category's breaker flag is set; nothing was processed.
    Tripped { retry_after: Duration },
    Rescheduled {
        processed: usize,
        remaining: usize,
        retry_after: Duration,
    },
    Drained {
        rows: u64,
        merge: Option<MergeReport>,
    },
}

/// A file that made it through one attempt.
#[derive(Debug)]
struct Processed {
    decision: RoutingDecision,
    rows: u64,
}

/// Batch Continuation Controller for one worker of one category.
pub struct WorkerController {
    ctx: PipelineContext,
    key: WorkerKey,
    checkpoints: CheckpointManager,
}

impl WorkerController {
    pub fn new(ctx: PipelineContext, key: WorkerKey) -> Self {
        let checkpoints = CheckpointManager::new(
            key,
            ctx.state.clone(),
            ctx.tables.clone(),
            ctx.files.clone(),
        );
        Self {
            ctx,
            key,
            checkpoints,
        }
    }

    pub fn key(&self) -> &WorkerKey {
        &self.key
    }

    /// Runs one bounded batch.
    pub async fn wake(&self) -> Result<WakeOutcome, ControllerError> {
        let deadline = Instant::now() + self.ctx.settings.usable_budget();

        if !self.acquire_lock().await? {
            debug!(worker = %self.key, "Worker lock busy, skipping wake");
            self.checkpoints.heartbeat().await?;
            return Ok(WakeOutcome::LockBusy);
        }

        let result = self.wake_locked(deadline).await;

        if let Err(e) = self
            .ctx
            .state
            .release_lock(&self.key.lock_name(), &self.ctx.instance)
            .await
        {
            warn!(worker = %self.key, error = %e, "Failed to release worker lock");
        }
        result
    }

    async fn acquire_lock(&self) -> Result<bool, ControllerError> {
        let timeout = self.ctx.settings.lock_timeout;
        let started = Instant::now();
        let poll = Duration::from_millis(50).min(timeout.max(Duration::from_millis(1)));
        loop {
            if self
                .ctx
                .state
                .try_lock(&self.key.lock_name(), &self.ctx.instance, self.ctx.settings.lock_ttl)
                .await?
            {
                return Ok(true);
            }
            if started.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn wake_locked(&self, deadline: Instant) -> Result<WakeOutcome, ControllerError> {
        let category = self.key.category();
        let worker_id = self.key.worker_id();
        let settings = &self.ctx.settings;

        let job = self.ctx.jobs().load(category).await?;
        if job.phase != JobPhase::WorkersRunning {
            debug!(worker = %self.key, phase = %job.phase, "Job not running, nothing to do");
            return Ok(WakeOutcome::Idle);
        }
        if !matches!(job.workers.get(&worker_id), Some(WorkerStatus::Pending)) {
            debug!(worker = %self.key, "Worker already reported done");
            return Ok(WakeOutcome::Idle);
        }
        let Some(run_id) = job.run_id.clone() else {
            return Ok(WakeOutcome::Idle);
        };

        if let Some(flag) = self.ctx.state.load_breaker(category).await? {
            warn!(
                worker = %self.key,
                reason = %flag.reason,
                tripped_at = %flag.tripped_at,
                "Breaker tripped, deferring batch"
            );
            self.checkpoints.heartbeat().await?;
            return Ok(WakeOutcome::Tripped {
                retry_after: settings.breaker_cooldown,
            });
        }

        let rules = self.ctx.rules.snapshot().await?;
        let limits = settings.limits_for(rules.tuning(category));
        let policy = RetryPolicy::new(limits.max_retries, limits.retry_delay, limits.retry_max_delay);
        let mut breaker = CircuitBreaker::for_batch(limits.retry_delay, limits.retry_max_delay);

        let mut cp = self.checkpoints.resume(&run_id).await?;
        let queue = StoreLayout::queue(category, worker_id);
        let batch = next_batch(self.ctx.files.list(&queue).await?, limits.batch_size);
        info!(
            worker = %self.key,
            run_id = %run_id,
            files = batch.len(),
            rules_version = rules.version(),
            "Starting batch"
        );

        let mut delta = CounterDelta::default();
        let mut processed = 0;
        let mut quarantined = false;

        for file in &batch {
            if Instant::now() >= deadline {
                warn!(worker = %self.key, "Time budget spent, leaving the rest for the next wake");
                break;
            }

            let mut backoff = None;
            let attempts = AtomicUsize::new(0);
            let result = policy
                .run_until(
                    Some(deadline),
                    |attempt| {
                        attempts.store(attempt, Ordering::Relaxed);
                        self.attempt_file(&rules, &cp, file, attempt)
                    },
                    classify_file_fault,
                )
                .await;
            let attempts = attempts.load(Ordering::Relaxed);
            self.ctx
                .metrics
                .increment_retries(attempts.saturating_sub(1) as u64);

            let file_result = match result {
                Ok(done) if !done.decision.bucket.is_failed() => {
                    breaker.record_success();
                    self.on_routed(&cp, file, &done, attempts).await;
                    delta.files_routed += 1;
                    delta.rows_written += done.rows;
                    FileResult::Routed {
                        bucket: done.decision.bucket,
                        rows: done.rows,
                    }
                }
                Ok(rejected) => {
                    breaker.record_success();
                    let reason = rejected
                        .decision
                        .reason
                        .unwrap_or_else(|| "validation failed".to_string());
                    self.on_failed(&cp, file, &reason, attempts, true).await;
                    delta.files_failed += 1;
                    FileResult::Failed
                }
                Err(RetryError::OutOfTime { error, attempts }) => {
                    warn!(
                        worker = %self.key,
                        file = %file,
                        attempts,
                        error = %error,
                        "Out of time while retrying, file stays queued"
                    );
                    self.rollback(&cp).await;
                    break;
                }
                Err(err) => {
                    let reason = err.error().to_string();
                    self.on_failed(&cp, file, &reason, err.attempts(), true).await;
                    delta.files_failed += 1;

                    if matches!(err, RetryError::AttemptsExceeded { .. }) {
                        match breaker.record_failure() {
                            CircuitBreakerState::Open => {
                                cp = record_file(cp, &FileResult::Failed);
                                self.checkpoints.commit(&mut cp).await?;
                                processed += 1;
                                quarantined = true;
                                error!(
                                    worker = %self.key,
                                    failures = breaker.consecutive_failures(),
                                    "Repeated infrastructure failures, stopping batch"
                                );
                                break;
                            }
                            CircuitBreakerState::RetryAfter(delay) => backoff = Some(delay),
                        }
                    }
                    FileResult::Failed
                }
            };

            cp = record_file(cp, &file_result);
            self.checkpoints.commit(&mut cp).await?;
            processed += 1;

            if let Some(delay) = backoff {
                let delay = delay.min(deadline.saturating_duration_since(Instant::now()));
                debug!(
                    worker = %self.key,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before the next file"
                );
                tokio::time::sleep(delay).await;
            }
        }

        let remaining = self.ctx.files.list(&queue).await?.len();
        let (mut cp, outcome) = advance(cp, processed, remaining);
        if let Err(e) = self.ctx.jobs().add_counts(category, delta).await {
            warn!(worker = %self.key, error = %e, "Failed to update job counters");
        }

        match outcome {
            BatchOutcome::Rescheduled {
                processed,
                remaining,
            } => {
                if quarantined {
                    cp.state = WorkerState::Quarantined;
                }
                self.checkpoints.commit(&mut cp).await?;
                self.ctx.metrics.increment_continuations(1);
                self.ctx
                    .events
                    .publish(PipelineEvent::BatchRescheduled {
                        category,
                        worker_id,
                        processed,
                        remaining,
                        continuation: cp.continuations,
                        timestamp: Utc::now(),
                    })
                    .await;
                info!(
                    worker = %self.key,
                    processed,
                    remaining,
                    continuation = cp.continuations,
                    "Batch done, continuation scheduled"
                );
                let retry_after = if quarantined {
                    settings.breaker_cooldown
                } else {
                    settings.reschedule_delay
                };
                Ok(WakeOutcome::Rescheduled {
                    processed,
                    remaining,
                    retry_after,
                })
            }
            BatchOutcome::Drained { rows } => {
                self.checkpoints.commit(&mut cp).await?;
                self.ctx
                    .events
                    .publish(PipelineEvent::WorkerDrained {
                        category,
                        worker_id,
                        rows,
                        timestamp: Utc::now(),
                    })
                    .await;
                info!(worker = %self.key, rows, files = cp.files_done, failed = cp.files_failed, "Worker queue drained");

                let (_, won) = self.ctx.jobs().report_done(category, worker_id, rows).await?;
                self.checkpoints.finish().await?;
                let merge = if won {
                    Some(MergeReducer::new(self.ctx.clone()).run(category).await?)
                } else {
                    None
                };
                Ok(WakeOutcome::Drained { rows, merge })
            }
        }
    }

    async fn attempt_file(
        &self,
        rules: &RuleSnapshot,
        cp: &RunCheckpoint,
        file: &str,
        attempt: usize,
    ) -> Result<Processed, FileFault> {
        let result = self.process_file(rules, cp, file).await;
        if let Err(e) = &result {
            warn!(worker = %self.key, file, attempt, error = %e, "File attempt failed");
        }
        result
    }

    async fn process_file(
        &self,
        rules: &RuleSnapshot,
        cp: &RunCheckpoint,
        file: &str,
    ) -> Result<Processed, FileFault> {
        let category = self.key.category();
        let queue = StoreLayout::queue(category, self.key.worker_id());

        let bytes = self
            .ctx
            .files
            .read(&queue, file)
            .await
            .map_err(FileFault::Read)?;
        let sheet = read_sheet(file, &bytes).map_err(FileFault::Parse)?;

        if let Some(previous) = self
            .ctx
            .state
            .find_outcome(category, &cp.run_id, file)
            .await?
            && !previous.bucket.is_failed()
        {
            return Err(FileFault::Duplicate);
        }

        let classified = Classifier::new(rules.rules()).classify_sheet(&sheet, file);
        match classified.category {
            None => {
                return Err(ClassifyError::Unknown {
                    file: file.to_string(),
                }
                .into());
            }
            Some(found) if found != category => {
                return Err(ClassifyError::Mismatch {
                    file: file.to_string(),
                    expected: category,
                    found,
                }
                .into());
            }
            Some(_) => {}
        }
        debug!(worker = %self.key, file, result = %classified, "Classified file");

        let decision = Router::new(rules).route(
            category,
            file,
            &sheet,
            classified.header_row,
            classified.data_row,
        )?;
        if decision.bucket.is_failed() {
            return Ok(Processed { decision, rows: 0 });
        }

        let schema = rules.schema(category)?;
        let header = sheet.row(classified.header_row).unwrap_or_default();
        let plan = ColumnPlan::build(schema, rules.special_columns(category), header);
        let extracted = extract_rows(&sheet, category.row_extraction(), classified.data_row);
        let rows: Vec<Vec<String>> = extracted.rows.iter().map(|row| plan.apply(row)).collect();
        if extracted.skipped > 0 {
            debug!(worker = %self.key, file, skipped_rows = extracted.skipped, "Skipped blank rows");
        }

        let tables = &self.ctx.tables;
        let table = TableNames::worker(category, self.key.worker_id());
        if !tables.exists(&table).await? {
            tables.create(&table, &schema.columns).await?;
            info!(worker = %self.key, table = %table, "Created worker table");
        }

        let current = tables.row_count(&table).await?;
        if current > cp.next_row {
            tables.truncate(&table, cp.next_row).await?;
        }
        let rows_before = current.min(cp.next_row);

        let mut marker = cp.clone();
        self.checkpoints
            .begin_file(&mut marker, file, rows_before)
            .await?;

        if !rows.is_empty() {
            tables.append(&table, &rows).await?;
        }

        self.ctx
            .files
            .move_file(&queue, file, &StoreLayout::bucket(category, &decision.bucket))
            .await
            .map_err(FileFault::Move)?;

        Ok(Processed {
            decision,
            rows: rows.len() as u64,
        })
    }

    async fn on_routed(&self, cp: &RunCheckpoint, file: &str, done: &Processed, attempts: usize) {
        let category = self.key.category();
        self.record_outcome(cp, file, done.decision.bucket.clone(), done.rows, attempts, None)
            .await;
        self.ctx.metrics.increment_routed(1);
        self.ctx.metrics.increment_rows(done.rows);
        info!(
            worker = %self.key,
            file,
            bucket = %done.decision.bucket,
            rows = done.rows,
            attempts,
            "File routed"
        );
        self.ctx
            .events
            .publish(PipelineEvent::FileRouted {
                category,
                worker_id: self.key.worker_id(),
                file: file.to_string(),
                bucket: done.decision.bucket.clone(),
                rows: done.rows,
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Terminal failure: undo partial rows, park the file in `Failed`, tell
    /// the operator once.
    async fn on_failed(
        &self,
        cp: &RunCheckpoint,
        file: &str,
        reason: &str,
        attempts: usize,
        still_queued: bool,
    ) {
        let category = self.key.category();
        let worker_id = self.key.worker_id();

        if still_queued {
            self.rollback(cp).await;
            let queue = StoreLayout::queue(category, worker_id);
            if let Err(e) = self
                .ctx
                .files
                .move_file(&queue, file, &StoreLayout::bucket(category, &Bucket::Failed))
                .await
            {
                error!(worker = %self.key, file, error = %e, "Could not move failed file out of the queue");
            }
        }

        error!(
            file,
            category = %category,
            worker = worker_id,
            error = reason,
            attempts,
            "File failed"
        );
        if self.routed_earlier(cp, file).await {
            debug!(worker = %self.key, file, "Keeping the routed ledger entry of the first copy");
        } else {
            self.record_outcome(cp, file, Bucket::Failed, 0, attempts, Some(reason.to_string()))
                .await;
        }
        self.ctx.metrics.increment_failed(1);
        self.ctx
            .events
            .publish(PipelineEvent::FileFailed {
                category,
                worker_id,
                file: file.to_string(),
                error: reason.to_string(),
                attempts,
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Drops rows past the checkpoint left behind by a failed attempt.
    async fn rollback(&self, cp: &RunCheckpoint) {
        let table = TableNames::worker(self.key.category(), self.key.worker_id());
        let tables = &self.ctx.tables;
        let result = async {
            if tables.exists(&table).await? && tables.row_count(&table).await? > cp.next_row {
                tables.truncate(&table, cp.next_row).await?;
            }
            Ok::<_, engine_core::error::TableError>(())
        }
        .await;
        if let Err(e) = result {
            warn!(worker = %self.key, error = %e, "Failed to roll back worker table");
        }
    }

    async fn routed_earlier(&self, cp: &RunCheckpoint, file: &str) -> bool {
        match self
            .ctx
            .state
            .find_outcome(self.key.category(), &cp.run_id, file)
            .await
        {
            Ok(previous) => previous.is_some_and(|p| !p.bucket.is_failed()),
            Err(e) => {
                warn!(worker = %self.key, file, error = %e, "Failed to read file ledger");
                false
            }
        }
    }

    async fn record_outcome(
        &self,
        cp: &RunCheckpoint,
        file: &str,
        bucket: Bucket,
        rows: u64,
        attempts: usize,
        error: Option<String>,
    ) {
        let outcome = FileOutcome {
            file: file.to_string(),
            category: self.key.category(),
            run_id: cp.run_id.clone(),
            worker_id: self.key.worker_id(),
            bucket,
            rows,
            attempts,
            error,
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.ctx.state.record_outcome(&outcome).await {
            warn!(worker = %self.key, file, error = %e, "Failed to write file ledger");
        }
    }
}
