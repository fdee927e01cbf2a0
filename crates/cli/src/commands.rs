use clap::Subcommand;
use model::core::{category::Category, identifiers::WorkerId};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Split a category's inbox and drive its workers until the merge finishes
    Run {
        category: Category,

        #[arg(long, help = "Skip the split and continue the workers of the current run")]
        resume: bool,
    },
    /// Move the inbox into worker queues and start a new run
    Split { category: Category },
    /// Run a single batch for one worker
    Wake {
        category: Category,

        #[arg(long)]
        worker: WorkerId,
    },
    /// Merge worker tables into the canonical table
    Merge {
        category: Category,

        #[arg(long, help = "Retry a merge that previously failed")]
        retry: bool,
    },
    /// Show job state for every category that has run
    Status {
        #[arg(long, help = "Only this category")]
        category: Option<Category>,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
    /// Trip or reset a category's circuit breaker
    Breaker {
        #[command(subcommand)]
        command: BreakerCommand,
    },
    /// Classify a single file against the rule store without moving it
    Classify { file: PathBuf },
}

#[derive(Subcommand)]
pub enum BreakerCommand {
    Trip {
        category: Category,

        #[arg(long, default_value = "tripped by operator")]
        reason: String,
    },
    Reset { category: Category },
}
