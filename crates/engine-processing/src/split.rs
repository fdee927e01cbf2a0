use crate::{
    context::PipelineContext,
    error::SplitError,
    partition::{PartitionReport, Partitioner},
};
use chrono::Utc;
use connectors::store::StoreLayout;
use engine_core::tables::TableNames;
use model::{
    core::{category::Category, identifiers::RunId},
    events::pipeline::PipelineEvent,
};
use tracing::{error, info};

#[derive(Debug)]
pub enum SplitOutcome {
    /// The inbox was empty; no run was started.
    NothingToDo,
    Split { run_id: RunId, report: PartitionReport },
}

/// Starts a run for `category`: resets the job, clears what the previous run
/// left behind and moves the inbox into per-worker queues.
pub async fn split(ctx: &PipelineContext, category: Category) -> Result<SplitOutcome, SplitError> {
    let settings = &ctx.settings;
    if ctx.files.list(&StoreLayout::inbox(category)).await?.is_empty() {
        info!(category = %category, "Inbox empty, no run started");
        return Ok(SplitOutcome::NothingToDo);
    }

    let jobs = ctx.jobs();
    let job = jobs.begin_split(category, settings.workers).await?;
    let run_id = job.run_id.clone().unwrap_or_else(RunId::generate);

    for table in ctx.tables.list().await? {
        if TableNames::is_transient_of(category, &table) {
            ctx.tables.drop_table(&table).await?;
        }
    }
    for worker_id in 1..=settings.workers.max(1) {
        ctx.state.clear_checkpoint(category, worker_id).await?;
    }

    let canonical = TableNames::canonical(category);
    if !ctx.tables.exists(&canonical).await? {
        let rules = ctx.rules.snapshot().await?;
        ctx.tables.create(&canonical, &rules.schema(category)?.columns).await?;
        info!(category = %category, table = %canonical, "Created canonical table");
    }

    let partitioner = Partitioner::new(
        ctx.files.clone(),
        settings.workers,
        settings.split_attempts,
        settings.split_cooldown,
    );
    let report = match partitioner.partition(category).await {
        Ok(report) => report,
        Err(err) => {
            error!(category = %category, error = %err, "Split failed");
            jobs.fail(category, &err.to_string()).await?;
            ctx.events
                .publish(PipelineEvent::CriticalError {
                    category: Some(category),
                    context: "split".to_string(),
                    error: err.to_string(),
                    timestamp: Utc::now(),
                })
                .await;
            return Err(err.into());
        }
    };

    jobs.mark_running(category, report.files as u64).await?;
    ctx.events
        .publish(PipelineEvent::SplitCompleted {
            category,
            run_id: run_id.clone(),
            files: report.files,
            workers: settings.workers,
            timestamp: Utc::now(),
        })
        .await;
    info!(
        category = %category,
        run_id = %run_id,
        files = report.files,
        workers = settings.workers,
        "Split complete"
    );
    Ok(SplitOutcome::Split { run_id, report })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, strings};
    use model::execution::job::JobPhase;

    #[tokio::test]
    async fn empty_inbox_starts_nothing() {
        let h = Harness::new();
        let outcome = split(&h.ctx, h.proyeksi).await.unwrap();
        assert!(matches!(outcome, SplitOutcome::NothingToDo));
        assert_eq!(h.ctx.jobs().load(h.proyeksi).await.unwrap().phase, JobPhase::Idle);
    }

    #[tokio::test]
    async fn fans_inbox_out_and_clears_previous_run() {
        let h = Harness::new();
        let cat = h.proyeksi;
        let stale = TableNames::worker(cat, 1);
        h.ctx.tables.create(&stale, &strings(&["Bulan", "Target"])).await.unwrap();
        h.ctx
            .tables
            .append(&stale, &[strings(&["Jan", "1"])])
            .await
            .unwrap();
        let inbox = StoreLayout::inbox(cat);
        for i in 1..=5 {
            h.ctx
                .files
                .put(&inbox, &format!("proyeksi {i}.csv"), b"Bulan,Target\n")
                .await
                .unwrap();
        }

        let SplitOutcome::Split { report, .. } = split(&h.ctx, cat).await.unwrap() else {
            panic!("expected a split");
        };

        assert_eq!(report.files, 5);
        assert!(!h.ctx.tables.exists(&stale).await.unwrap());
        assert!(h.ctx.tables.exists(&TableNames::canonical(cat)).await.unwrap());
        assert_eq!(h.ctx.files.list(&StoreLayout::queue(cat, 1)).await.unwrap().len(), 3);
        assert_eq!(h.ctx.files.list(&StoreLayout::queue(cat, 2)).await.unwrap().len(), 2);

        let job = h.ctx.jobs().load(cat).await.unwrap();
        assert_eq!(job.phase, JobPhase::WorkersRunning);
        assert_eq!(job.counters.files_split, 5);
        assert_eq!(job.workers.len(), 2);
    }
}
