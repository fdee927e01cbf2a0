use crate::{
    context::PipelineContext,
    error::{JobError, MergeError},
};
use chrono::Utc;
use engine_core::tables::TableNames;
use model::{
    core::{
        category::{Category, MergeMode},
        identifiers::{RunId, WorkerId},
    },
    events::pipeline::PipelineEvent,
    execution::job::{CategoryJobState, JobPhase, WorkerStatus},
};
use std::collections::HashSet;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub category: Category,
    pub run_id: RunId,
    pub mode: MergeMode,
    /// Data rows in the canonical table after the swap.
    pub rows: u64,
    /// Canonical rows that exactly repeat an earlier row. Counted, never removed.
    pub duplicate_rows: u64,
    pub workers: Vec<(WorkerId, u64)>,
}

/// Fan-in of worker tables into the canonical table through a scratch table.
///
/// The canonical table is only touched by the final swap, so a failure at
/// any earlier step leaves it exactly as it was.
pub struct MergeReducer {
    ctx: PipelineContext,
}

impl MergeReducer {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Merges a job that is in `Merging` and finalizes it. A failure moves
    /// the job to `Failed` and is reported as a critical event.
    pub async fn run(&self, category: Category) -> Result<MergeReport, MergeError> {
        let jobs = self.ctx.jobs();
        let job = jobs.load(category).await?;
        if job.phase != JobPhase::Merging {
            return Err(JobError::InvalidTransition {
                category,
                from: job.phase,
                to: JobPhase::Finalized,
            }
            .into());
        }

        let report = match self.merge_tables(&job).await {
            Ok(report) => report,
            Err(err) => {
                error!(category = %category, error = %err, "Merge failed");
                jobs.fail(category, &err.to_string()).await?;
                self.ctx
                    .events
                    .publish(PipelineEvent::CriticalError {
                        category: Some(category),
                        context: "merge".to_string(),
                        error: err.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
                return Err(err);
            }
        };

        jobs.finalize(category, report.rows, report.duplicate_rows)
            .await?;
        self.ctx.metrics.increment_merges(1);
        self.ctx
            .events
            .publish(PipelineEvent::MergeCompleted {
                category,
                run_id: report.run_id.clone(),
                rows: report.rows,
                duplicate_rows: report.duplicate_rows,
                timestamp: Utc::now(),
            })
            .await;
        Ok(report)
    }

    /// Rebuilds the canonical table from the job's worker tables.
    ///
    /// Does not change job state; running it twice for a replace category
    /// yields the same canonical table.
    pub async fn merge_tables(&self, job: &CategoryJobState) -> Result<MergeReport, MergeError> {
        let category = job.category;
        let run_id = job.run_id.clone().ok_or(MergeError::MissingRun(category))?;
        if !job.all_workers_done() {
            return Err(MergeError::WorkersPending(category));
        }

        let tables = &self.ctx.tables;
        let canonical = TableNames::canonical(category);
        let scratch = TableNames::scratch(category);
        if !tables.exists(&canonical).await? {
            return Err(MergeError::MissingCanonical(canonical));
        }

        tables.drop_table(&scratch).await?;
        let mode = category.merge_mode();
        match mode {
            MergeMode::Replace => {
                let rules = self.ctx.rules.snapshot().await?;
                let schema = rules.schema(category)?;
                tables.create(&scratch, &schema.columns).await?;
            }
            MergeMode::Append => {
                let header = tables.header(&canonical).await?;
                tables.create(&scratch, &header).await?;
                let existing = tables.rows(&canonical).await?;
                tables.append(&scratch, &existing).await?;
            }
        }

        let mut workers = Vec::with_capacity(job.workers.len());
        for (&worker_id, status) in &job.workers {
            let WorkerStatus::Done { rows } = *status else {
                return Err(MergeError::WorkersPending(category));
            };
            let table = TableNames::worker(category, worker_id);
            if !tables.exists(&table).await? {
                if rows > 0 {
                    tables.drop_table(&scratch).await?;
                    return Err(MergeError::MissingWorkerTable {
                        category,
                        worker_id,
                        rows,
                    });
                }
                workers.push((worker_id, 0));
                continue;
            }

            let data = tables.rows(&table).await?;
            if data.len() as u64 != rows {
                warn!(
                    category = %category,
                    worker = worker_id,
                    reported = rows,
                    found = data.len(),
                    "Worker table size differs from reported rows"
                );
            }
            tables.append(&scratch, &data).await?;
            workers.push((worker_id, data.len() as u64));
        }

        tables.replace(&scratch, &canonical).await?;

        let merged = tables.rows(&canonical).await?;
        let duplicate_rows = count_duplicates(&merged);
        if duplicate_rows > 0 {
            warn!(category = %category, duplicate_rows, "Canonical table holds duplicate rows");
        }
        info!(
            category = %category,
            run_id = %run_id,
            mode = ?mode,
            rows = merged.len(),
            duplicate_rows,
            "Merged worker tables"
        );

        Ok(MergeReport {
            category,
            run_id,
            mode,
            rows: merged.len() as u64,
            duplicate_rows,
            workers,
        })
    }
}

pub fn count_duplicates(rows: &[Vec<String>]) -> u64 {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter().filter(|row| !seen.insert(row.as_slice())).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, strings};

    async fn seed_worker(h: &Harness, category: Category, worker_id: WorkerId, rows: &[&[&str]]) {
        let table = TableNames::worker(category, worker_id);
        h.ctx
            .tables
            .create(&table, &strings(&["ID", "Nama"]))
            .await
            .unwrap();
        let rows: Vec<Vec<String>> = rows.iter().map(|r| strings(r)).collect();
        h.ctx.tables.append(&table, &rows).await.unwrap();
    }

    fn done(category: Category, workers: &[(WorkerId, u64)]) -> CategoryJobState {
        let mut job = CategoryJobState::idle(category);
        job.run_id = Some(RunId::new("run"));
        job.phase = JobPhase::Merging;
        job.workers = workers
            .iter()
            .map(|(w, rows)| (*w, WorkerStatus::Done { rows: *rows }))
            .collect();
        job
    }

    #[tokio::test]
    async fn replace_merge_is_idempotent() {
        let h = Harness::new();
        let cat = h.produk;
        h.ctx
            .tables
            .create(&TableNames::canonical(cat), &strings(&["ID", "Nama"]))
            .await
            .unwrap();
        h.ctx
            .tables
            .append(&TableNames::canonical(cat), &[strings(&["old", "row"])])
            .await
            .unwrap();
        seed_worker(&h, cat, 1, &[&["1", "a"], &["2", "b"]]).await;
        seed_worker(&h, cat, 2, &[&["3", "c"]]).await;

        let reducer = MergeReducer::new(h.ctx.clone());
        let job = done(cat, &[(1, 2), (2, 1), (3, 0)]);

        let first = reducer.merge_tables(&job).await.unwrap();
        let after_first = h.ctx.tables.rows(&TableNames::canonical(cat)).await.unwrap();
        let second = reducer.merge_tables(&job).await.unwrap();
        let after_second = h.ctx.tables.rows(&TableNames::canonical(cat)).await.unwrap();

        assert_eq!(first.rows, 3);
        assert_eq!(first, second);
        assert_eq!(after_first, after_second);
        assert_eq!(after_first[0], strings(&["1", "a"]));
        assert!(!h.ctx.tables.exists(&TableNames::scratch(cat)).await.unwrap());
    }

    #[tokio::test]
    async fn append_merge_adds_worker_rows() {
        let h = Harness::new();
        let cat = h.dash;
        let canonical = TableNames::canonical(cat);
        h.ctx
            .tables
            .create(&canonical, &strings(&["Tanggal", "Penjualan"]))
            .await
            .unwrap();
        h.ctx
            .tables
            .append(
                &canonical,
                &[strings(&["2024-01-01", "5"]), strings(&["2024-01-02", "6"])],
            )
            .await
            .unwrap();
        seed_worker(&h, cat, 1, &[&["2024-01-03", "7"]]).await;
        seed_worker(&h, cat, 2, &[&["2024-01-04", "8"], &["2024-01-05", "9"]]).await;

        let before = h.ctx.tables.row_count(&canonical).await.unwrap();
        let report = MergeReducer::new(h.ctx.clone())
            .merge_tables(&done(cat, &[(1, 1), (2, 2)]))
            .await
            .unwrap();

        assert_eq!(report.rows, before + 3);
        assert_eq!(h.ctx.tables.row_count(&canonical).await.unwrap(), 5);
        assert_eq!(h.ctx.tables.header(&canonical).await.unwrap(), strings(&["Tanggal", "Penjualan"]));
    }

    #[tokio::test]
    async fn missing_worker_table_leaves_canonical_untouched() {
        let h = Harness::new();
        let cat = h.produk;
        let canonical = TableNames::canonical(cat);
        h.ctx
            .tables
            .create(&canonical, &strings(&["ID", "Nama"]))
            .await
            .unwrap();
        h.ctx
            .tables
            .append(&canonical, &[strings(&["keep", "me"])])
            .await
            .unwrap();
        seed_worker(&h, cat, 1, &[&["1", "a"]]).await;

        let err = MergeReducer::new(h.ctx.clone())
            .merge_tables(&done(cat, &[(1, 1), (2, 4)]))
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::MissingWorkerTable { worker_id: 2, .. }));
        assert_eq!(
            h.ctx.tables.rows(&canonical).await.unwrap(),
            vec![strings(&["keep", "me"])]
        );
    }

    #[tokio::test]
    async fn missing_canonical_is_fatal() {
        let h = Harness::new();
        let err = MergeReducer::new(h.ctx.clone())
            .merge_tables(&done(h.produk, &[(1, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::MissingCanonical(_)));
    }

    #[test]
    fn duplicates_are_counted() {
        let rows = vec![strings(&["a"]), strings(&["b"]), strings(&["a"]), strings(&["a"])];
        assert_eq!(count_duplicates(&rows), 2);
    }
}
