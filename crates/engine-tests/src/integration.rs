#[cfg(test)]
mod tests {
    use crate::{
        Pipeline,
        utils::{
            FlakyFileStore, bucket_files, count_events, dash_csv, drain_events, drop_in_inbox,
            produk_csv, proyeksi_csv, queued_files,
        },
    };
    use chrono::Utc;
    use connectors::store::FileStore;
    use engine_core::{state::models::BreakerFlag, tables::TableNames};
    use engine_processing::split::SplitOutcome;
    use engine_runtime::{actor::scheduler::WorkerExit, runner::CategoryRunner};
    use model::{
        events::pipeline::PipelineEvent,
        execution::{checkpoint::RunCheckpoint, job::JobPhase, routing::Bucket},
    };
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    fn gs() -> Bucket {
        Bucket::Brand("GS".to_string())
    }

    // Test Settings: WORKERS = 3, BATCH_SIZE = 4.
    // Scenario: 30 product exports land in the inbox, two rows each, all ids known as GS.
    // Expected Outcome:
    // - Each worker owns 10 files and needs three wakes, two of them reschedules, before
    //   its queue drains.
    // - The last worker merges; the job is Finalized with 60 canonical rows.
    // - All 30 files end up in the GS bucket and the merge is the last event.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let p = Pipeline::new(3, 4);
        let cat = Pipeline::category("BA Produk SHO");
        let files: Vec<_> = (1..=30)
            .map(|i| (format!("produk_{i:03}.csv"), produk_csv(&["100", "101"])))
            .collect();
        drop_in_inbox(&p.ctx, cat, &files).await;
        let (_sub, mut rx) = p.ctx.events.subscribe(256).await;

        let summary = CategoryRunner::new(p.ctx.clone(), CancellationToken::new())
            .run(cat)
            .await
            .unwrap();

        assert_eq!(summary.phase, JobPhase::Finalized);
        assert_eq!(summary.counters.files_routed, 30);
        assert_eq!(summary.counters.rows_merged, 60);
        assert_eq!(summary.exits.len(), 3);
        assert_eq!(
            summary
                .exits
                .iter()
                .filter(|(_, exit)| matches!(exit, WorkerExit::Drained { merged: true, .. }))
                .count(),
            1
        );

        let events = drain_events(&mut rx);
        for worker in 1..=3 {
            let reschedules = count_events(&events, |e| {
                matches!(e, PipelineEvent::BatchRescheduled { worker_id, .. } if *worker_id == worker)
            });
            assert_eq!(reschedules, 2, "worker {worker}");
        }
        assert_eq!(count_events(&events, |e| matches!(e, PipelineEvent::WorkerDrained { .. })), 3);
        assert!(matches!(
            events.last().map(|e| e.as_ref()),
            Some(PipelineEvent::MergeCompleted { rows: 60, .. })
        ));

        assert_eq!(bucket_files(&p.ctx, cat, &gs()).await.len(), 30);
        assert_eq!(queued_files(&p.ctx, cat, 3).await, 0);

        let rows = p.ctx.tables.rows(&TableNames::canonical(cat)).await.unwrap();
        assert_eq!(rows.len(), 60);
        assert_eq!(rows[0], vec!["100", "Barang 100", "3"]);
        assert!(p.ctx.tables.exists(&TableNames::worker(cat, 1)).await.unwrap());
    }

    // Test Settings: WORKERS = 1, MAX_RETRIES = 3.
    // Scenario: One file sits on a share that is offline for every read; two files are healthy.
    // Expected Outcome:
    // - The offline file is tried exactly 3 times and parked in Failed.
    // - The healthy files are routed and merged.
    // - The operator is notified once through a single FileFailed event.
    #[traced_test]
    #[tokio::test]
    async fn tc02() {
        let mut p = Pipeline::new(1, 10);
        let flaky = FlakyFileStore::wrap(p.ctx.files.clone());
        p.ctx.files = flaky.clone();
        let cat = Pipeline::category("BA Produk SHO");
        drop_in_inbox(
            &p.ctx,
            cat,
            &[
                ("produk_a.csv".to_string(), produk_csv(&["100"])),
                ("produk_flaky.csv".to_string(), produk_csv(&["101"])),
                ("produk_b.csv".to_string(), produk_csv(&["102"])),
            ],
        )
        .await;
        let (_sub, mut rx) = p.ctx.events.subscribe(64).await;

        let summary = CategoryRunner::new(p.ctx.clone(), CancellationToken::new())
            .run(cat)
            .await
            .unwrap();

        assert_eq!(flaky.flaky_reads(), 3);
        assert_eq!(summary.phase, JobPhase::Finalized);
        assert_eq!(summary.counters.files_failed, 1);
        assert_eq!(summary.counters.rows_merged, 2);
        assert_eq!(bucket_files(&p.ctx, cat, &Bucket::Failed).await, vec!["produk_flaky.csv"]);
        assert_eq!(bucket_files(&p.ctx, cat, &gs()).await.len(), 2);

        let events = drain_events(&mut rx);
        let failures: Vec<_> = events
            .iter()
            .filter_map(|e| match e.as_ref() {
                PipelineEvent::FileFailed { file, attempts, .. } => Some((file.clone(), *attempts)),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![("produk_flaky.csv".to_string(), 3)]);

        let run_id = summary.run_id.unwrap();
        let outcome = p
            .ctx
            .state
            .find_outcome(cat, &run_id, "produk_flaky.csv")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.bucket, Bucket::Failed);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.error.unwrap().contains("share offline"));
    }

    // Test Settings: WORKERS = 2.
    // Scenario: The same projection files are delivered twice, one run after the other.
    // Expected Outcome: The replace merge leaves identical canonical contents after both runs.
    #[traced_test]
    #[tokio::test]
    async fn tc03() {
        let p = Pipeline::new(2, 10);
        let cat = Pipeline::category("Proyeksi SHO");
        let files = vec![
            ("proyeksi jan.csv".to_string(), proyeksi_csv(&[("Jan", "100"), ("Feb", "120")])),
            ("proyeksi mar.csv".to_string(), proyeksi_csv(&[("Mar", "90")])),
            ("proyeksi apr.csv".to_string(), proyeksi_csv(&[("Apr", "110")])),
        ];
        let runner = CategoryRunner::new(p.ctx.clone(), CancellationToken::new());
        let canonical = TableNames::canonical(cat);

        drop_in_inbox(&p.ctx, cat, &files).await;
        let first = runner.run(cat).await.unwrap();
        let mut after_first = p.ctx.tables.rows(&canonical).await.unwrap();

        drop_in_inbox(&p.ctx, cat, &files).await;
        let second = runner.run(cat).await.unwrap();
        let mut after_second = p.ctx.tables.rows(&canonical).await.unwrap();

        assert_eq!(first.phase, JobPhase::Finalized);
        assert_eq!(second.phase, JobPhase::Finalized);
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(after_first.len(), 4);
        after_first.sort();
        after_second.sort();
        assert_eq!(after_first, after_second);
    }

    // Test Settings: WORKERS = 2.
    // Scenario: Dashboard summaries for brand GS arrive in two deliveries of 2 and 3 files.
    // Expected Outcome:
    // - Each file contributes one row and is routed by the brand token in its name.
    // - The append merge grows the canonical table from 2 to 5 rows.
    #[traced_test]
    #[tokio::test]
    async fn tc04() {
        let p = Pipeline::new(2, 10);
        let cat = Pipeline::category("BA Dash SHO");
        let runner = CategoryRunner::new(p.ctx.clone(), CancellationToken::new());
        let canonical = TableNames::canonical(cat);

        drop_in_inbox(
            &p.ctx,
            cat,
            &[
                ("Dash GS 2024-01.csv".to_string(), dash_csv("2024-01-31", 10)),
                ("Dash GS 2024-02.csv".to_string(), dash_csv("2024-02-29", 20)),
            ],
        )
        .await;
        runner.run(cat).await.unwrap();
        let before = p.ctx.tables.row_count(&canonical).await.unwrap();

        drop_in_inbox(
            &p.ctx,
            cat,
            &[
                ("Dash GS 2024-03.csv".to_string(), dash_csv("2024-03-31", 30)),
                ("Dash GS 2024-04.csv".to_string(), dash_csv("2024-04-30", 40)),
                ("Dash GS 2024-05.csv".to_string(), dash_csv("2024-05-31", 50)),
            ],
        )
        .await;
        let summary = runner.run(cat).await.unwrap();

        assert_eq!(before, 2);
        assert_eq!(summary.phase, JobPhase::Finalized);
        assert_eq!(p.ctx.tables.row_count(&canonical).await.unwrap(), before + 3);
        assert_eq!(bucket_files(&p.ctx, cat, &gs()).await.len(), 5);
    }

    // Test Settings: WORKERS = 2.
    // Scenario: Next to one good export, the product inbox holds an unrecognisable sheet,
    // a projection sheet and an export whose ids belong to no known brand.
    // Expected Outcome:
    // - The three bad files land in Failed, each reported once.
    // - The good file is routed and merged; the run still finalizes.
    #[traced_test]
    #[tokio::test]
    async fn tc05() {
        let p = Pipeline::new(2, 10);
        let cat = Pipeline::category("BA Produk SHO");
        drop_in_inbox(
            &p.ctx,
            cat,
            &[
                ("produk_ok.csv".to_string(), produk_csv(&["100", "101"])),
                ("catatan.csv".to_string(), b"foo,bar\n1,2\n".to_vec()),
                ("proyeksi salah.csv".to_string(), proyeksi_csv(&[("Jan", "1")])),
                ("produk_asing.csv".to_string(), produk_csv(&["900", "901"])),
            ],
        )
        .await;
        let (_sub, mut rx) = p.ctx.events.subscribe(64).await;

        let summary = CategoryRunner::new(p.ctx.clone(), CancellationToken::new())
            .run(cat)
            .await
            .unwrap();

        assert_eq!(summary.phase, JobPhase::Finalized);
        assert_eq!(summary.counters.files_failed, 3);
        assert_eq!(summary.counters.files_routed, 1);
        assert_eq!(summary.counters.rows_merged, 2);
        assert_eq!(
            bucket_files(&p.ctx, cat, &Bucket::Failed).await,
            vec!["catatan.csv", "produk_asing.csv", "proyeksi salah.csv"]
        );
        assert_eq!(bucket_files(&p.ctx, cat, &gs()).await, vec!["produk_ok.csv"]);
        assert_eq!(queued_files(&p.ctx, cat, 2).await, 0);

        let events = drain_events(&mut rx);
        assert_eq!(count_events(&events, |e| matches!(e, PipelineEvent::FileFailed { .. })), 3);
    }

    // Test Settings: WORKERS = 1.
    // Scenario: A crashed wake left rows in the worker table that no checkpoint accounts for.
    // Expected Outcome: Resuming trims the orphaned rows, so only the files' rows are merged.
    #[traced_test]
    #[tokio::test]
    async fn tc06() {
        let p = Pipeline::new(1, 10);
        let cat = Pipeline::category("Proyeksi SHO");
        drop_in_inbox(
            &p.ctx,
            cat,
            &[
                ("proyeksi 1.csv".to_string(), proyeksi_csv(&[("Jan", "1"), ("Feb", "2")])),
                ("proyeksi 2.csv".to_string(), proyeksi_csv(&[("Mar", "3")])),
            ],
        )
        .await;
        let run_id = match engine_processing::split::split(&p.ctx, cat).await.unwrap() {
            SplitOutcome::Split { run_id, .. } => run_id,
            other => panic!("unexpected split outcome {other:?}"),
        };

        let table = TableNames::worker(cat, 1);
        let header: Vec<String> = vec!["Bulan".into(), "Target".into()];
        p.ctx.tables.create(&table, &header).await.unwrap();
        p.ctx
            .state
            .save_checkpoint(&RunCheckpoint::start(cat, 1, run_id))
            .await
            .unwrap();
        let garbage = vec![vec!["x".to_string(), "0".to_string()]; 3];
        p.ctx.tables.append(&table, &garbage).await.unwrap();

        let summary = CategoryRunner::new(p.ctx.clone(), CancellationToken::new())
            .drive(cat)
            .await
            .unwrap();

        assert_eq!(summary.phase, JobPhase::Finalized);
        let rows = p.ctx.tables.rows(&TableNames::canonical(cat)).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row[0] != "x"));
    }

    // Test Settings: WORKERS = 2, breaker cooldown 20 ms.
    // Scenario: An operator trips the category breaker before the run, the run is cancelled
    // while workers keep deferring, then the breaker is reset and the run resumed.
    // Expected Outcome:
    // - While tripped no file leaves the queues and every worker exits Cancelled.
    // - After the reset, driving the run finalizes it with all files routed.
    #[traced_test]
    #[tokio::test]
    async fn tc07() {
        let p = Pipeline::new(2, 10);
        let cat = Pipeline::category("Proyeksi SHO");
        let files: Vec<_> = (1..=4)
            .map(|i| (format!("proyeksi {i}.csv"), proyeksi_csv(&[("Jan", "1")])))
            .collect();
        drop_in_inbox(&p.ctx, cat, &files).await;
        p.ctx
            .state
            .set_breaker(
                cat,
                &BreakerFlag {
                    reason: "upstream maintenance".to_string(),
                    tripped_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let runner = CategoryRunner::new(p.ctx.clone(), cancel.clone());
        let run = tokio::spawn(async move { runner.run(cat).await });
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        let tripped = run.await.unwrap().unwrap();

        assert_eq!(tripped.phase, JobPhase::WorkersRunning);
        assert_eq!(tripped.exits.len(), 2);
        assert!(tripped.exits.iter().all(|(_, exit)| *exit == WorkerExit::Cancelled));
        assert_eq!(queued_files(&p.ctx, cat, 2).await, 4);

        p.ctx.state.clear_breaker(cat).await.unwrap();
        let resumed = CategoryRunner::new(p.ctx.clone(), CancellationToken::new())
            .drive(cat)
            .await
            .unwrap();

        assert_eq!(resumed.phase, JobPhase::Finalized);
        assert_eq!(resumed.run_id, tripped.run_id);
        assert_eq!(resumed.counters.files_routed, 4);
        assert_eq!(bucket_files(&p.ctx, cat, &Bucket::Validated).await.len(), 4);
    }

    #[tokio::test]
    async fn flaky_store_passes_healthy_files_through() {
        let p = Pipeline::new(1, 10);
        let flaky = FlakyFileStore::wrap(p.ctx.files.clone());
        let dir = std::path::Path::new("scratch");
        flaky.put(dir, "ok.csv", b"a\n").await.unwrap();
        flaky.put(dir, "flaky.csv", b"a\n").await.unwrap();

        assert_eq!(flaky.read(dir, "ok.csv").await.unwrap(), b"a\n");
        assert!(flaky.read(dir, "flaky.csv").await.is_err());
        assert_eq!(flaky.flaky_reads(), 1);
    }
}
