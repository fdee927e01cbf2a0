use crate::error::CliError;
use engine_runtime::runner::RunSummary;
use model::execution::{
    classification::ClassificationResult,
    job::{CategoryJobState, WorkerStatus},
};

pub fn print_status(jobs: &[CategoryJobState], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(jobs)?);
        return Ok(());
    }
    if jobs.is_empty() {
        println!("No jobs recorded yet.");
        return Ok(());
    }

    println!(
        "{:<22} {:<16} {:>7} {:>7} {:>7} {:>9} {:>9} {:>5}  {}",
        "Category", "Phase", "Split", "Routed", "Failed", "Rows", "Merged", "Dups", "Updated"
    );
    for job in jobs {
        let done = job
            .workers
            .values()
            .filter(|w| !matches!(w, WorkerStatus::Pending))
            .count();
        println!(
            "{:<22} {:<16} {:>7} {:>7} {:>7} {:>9} {:>9} {:>5}  {}",
            job.category.to_string(),
            format!("{} ({done}/{})", job.phase, job.workers.len()),
            job.counters.files_split,
            job.counters.files_routed,
            job.counters.files_failed,
            job.counters.rows_written,
            job.counters.rows_merged,
            job.counters.duplicate_rows,
            job.updated_at.format("%Y-%m-%d %H:%M:%S"),
        );
        if let Some(error) = &job.last_error {
            println!("    last error: {error}");
        }
    }
    Ok(())
}

pub fn print_summary(summary: &RunSummary) {
    println!("{}: {}", summary.category, summary.phase);
    if let Some(run_id) = &summary.run_id {
        println!("  run            {run_id}");
    }
    println!("  files routed   {}", summary.counters.files_routed);
    println!("  files failed   {}", summary.counters.files_failed);
    println!("  rows merged    {}", summary.counters.rows_merged);
    println!("  duplicate rows {}", summary.counters.duplicate_rows);
    for (worker_id, exit) in &summary.exits {
        println!("  worker {worker_id:<7} {exit:?}");
    }
}

pub fn print_classification(file: &str, result: &ClassificationResult) -> Result<(), CliError> {
    println!("{file}: {result}");
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
