use crate::{
    actor::{
        scheduler::WorkerExit,
        worker::{WorkerMsg, spawn_worker},
    },
    error::RuntimeError,
};
use engine_processing::{
    context::PipelineContext,
    controller::WorkerController,
    item::WorkerKey,
    split::{SplitOutcome, split},
};
use futures::future::join_all;
use model::{
    core::{
        category::Category,
        identifiers::{RunId, WorkerId},
    },
    execution::job::{JobCounters, JobPhase, WorkerStatus},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub category: Category,
    pub run_id: Option<RunId>,
    pub phase: JobPhase,
    pub counters: JobCounters,
    pub exits: Vec<(WorkerId, WorkerExit)>,
}

/// Runs a category end to end in this process: split, then one actor per
/// worker waking itself until its queue drains.
pub struct CategoryRunner {
    ctx: PipelineContext,
    cancel: CancellationToken,
}

impl CategoryRunner {
    pub fn new(ctx: PipelineContext, cancel: CancellationToken) -> Self {
        Self { ctx, cancel }
    }

    pub async fn run(&self, category: Category) -> Result<RunSummary, RuntimeError> {
        match split(&self.ctx, category).await? {
            SplitOutcome::NothingToDo => self.summary(category, Vec::new()).await,
            SplitOutcome::Split { run_id, report } => {
                info!(category = %category, run_id = %run_id, files = report.files, "Driving workers");
                self.drive(category).await
            }
        }
    }

    /// Wakes every worker of the current run that has not reported done.
    /// Also resumes a run whose process died mid-way.
    pub async fn drive(&self, category: Category) -> Result<RunSummary, RuntimeError> {
        let job = self.ctx.jobs().load(category).await?;
        if job.phase != JobPhase::WorkersRunning {
            info!(category = %category, phase = %job.phase, "No workers to drive");
            return self.summary(category, Vec::new()).await;
        }
        let pending: Vec<WorkerId> = job
            .workers
            .iter()
            .filter(|(_, status)| matches!(status, WorkerStatus::Pending))
            .map(|(id, _)| *id)
            .collect();

        let cancel = self.cancel.child_token();
        let (exit_tx, mut exit_rx) = mpsc::channel(pending.len().max(1));
        let mut handles = Vec::with_capacity(pending.len());
        for &worker_id in &pending {
            let controller =
                WorkerController::new(self.ctx.clone(), WorkerKey::new(category, worker_id));
            let (mailbox, handle) = spawn_worker(
                controller,
                self.ctx.settings.reschedule_delay,
                cancel.clone(),
                exit_tx.clone(),
            );
            mailbox.send(WorkerMsg::Wake).await?;
            handles.push(handle);
        }
        drop(exit_tx);

        let mut exits = Vec::with_capacity(pending.len());
        while let Some(exit) = exit_rx.recv().await {
            exits.push(exit);
            if exits.len() == pending.len() {
                break;
            }
        }
        cancel.cancel();

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(category = %category, error = %e, "Worker task ended abnormally");
            }
        }
        exits.sort_by_key(|(id, _)| *id);
        self.summary(category, exits).await
    }

    async fn summary(
        &self,
        category: Category,
        exits: Vec<(WorkerId, WorkerExit)>,
    ) -> Result<RunSummary, RuntimeError> {
        let job = self.ctx.jobs().load(category).await?;
        info!(
            category = %category,
            phase = %job.phase,
            files_routed = job.counters.files_routed,
            files_failed = job.counters.files_failed,
            rows_merged = job.counters.rows_merged,
            "Run summary"
        );
        Ok(RunSummary {
            category,
            run_id: job.run_id,
            phase: job.phase,
            counters: job.counters,
            exits,
        })
    }
}
