use crate::{
    commands::{BreakerCommand, Commands},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use chrono::Utc;
use clap::Parser;
use connectors::file::read_sheet;
use engine_config::{
    rules::source::{JsonRuleSource, RuleSource},
    settings::Settings,
};
use engine_core::state::models::BreakerFlag;
use engine_processing::{
    classify::Classifier,
    context::PipelineContext,
    controller::WorkerController,
    item::WorkerKey,
    merge::MergeReducer,
    split::{SplitOutcome, split},
};
use engine_runtime::{
    collaborators::{DirectoryExport, notifier_for, spawn_export, spawn_notifier},
    context::build_context,
    runner::CategoryRunner,
};
use model::execution::job::JobPhase;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "sheetflow", version = "0.1.0", about = "Marketplace report pipeline")]
struct Cli {
    #[arg(long, global = true, help = "Env file with SHEETFLOW_* settings")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let code = match run(Cli::parse()).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(e) => {
            error!(error = %e, "sheetflow failed");
            eprintln!("error: {e}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = Settings::from_env(&env::load_env(cli.env_file.as_deref())?)?;

    if let Commands::Classify { file } = &cli.command {
        return classify(&settings, file).await;
    }

    let ctx = build_context(settings)?;
    match cli.command {
        Commands::Run { category, resume } => {
            let shutdown = ShutdownCoordinator::new(CancellationToken::new());
            shutdown.register_handlers();

            let collaborators = CancellationToken::new();
            let handles = start_collaborators(&ctx, collaborators.clone()).await;

            let runner = CategoryRunner::new(ctx.clone(), shutdown.cancel_token());
            let summary = if resume {
                runner.drive(category).await
            } else {
                runner.run(category).await
            };

            collaborators.cancel();
            for result in futures::future::join_all(handles).await {
                if let Err(e) = result {
                    warn!(error = %e, "Collaborator task ended abnormally");
                }
            }

            output::print_summary(&summary?);
            if shutdown.is_shutdown_requested() {
                return Err(CliError::ShutdownRequested);
            }
        }
        Commands::Split { category } => match split(&ctx, category).await? {
            SplitOutcome::NothingToDo => println!("{category}: inbox empty, nothing to split"),
            SplitOutcome::Split { run_id, report } => {
                println!("{category}: run {run_id}, {} file(s)", report.files);
                for part in &report.partitions {
                    println!("  worker {:<3} {} file(s)", part.worker_id, part.files.len());
                }
            }
        },
        Commands::Wake { category, worker } => {
            let outcome = WorkerController::new(ctx.clone(), WorkerKey::new(category, worker))
                .wake()
                .await?;
            println!("{category} worker {worker}: {outcome:?}");
        }
        Commands::Merge { category, retry } => {
            let jobs = ctx.jobs();
            if retry && jobs.load(category).await?.phase == JobPhase::Failed {
                jobs.retry_merge(category).await?;
                info!(category = %category, "Retrying failed merge");
            }
            let report = MergeReducer::new(ctx.clone()).run(category).await?;
            println!(
                "{category}: {} rows merged ({:?}), {} duplicate row(s)",
                report.rows, report.mode, report.duplicate_rows
            );
        }
        Commands::Status { category, json } => {
            let mut jobs = ctx.state.list_jobs().await?;
            if let Some(category) = category {
                jobs.retain(|job| job.category == category);
            }
            output::print_status(&jobs, json)?;
        }
        Commands::Breaker { command } => match command {
            BreakerCommand::Trip { category, reason } => {
                let flag = BreakerFlag {
                    reason,
                    tripped_at: Utc::now(),
                };
                ctx.state.set_breaker(category, &flag).await?;
                println!("{category}: breaker tripped ({})", flag.reason);
            }
            BreakerCommand::Reset { category } => {
                ctx.state.clear_breaker(category).await?;
                println!("{category}: breaker reset");
            }
        },
        Commands::Classify { .. } => {}
    }

    Ok(())
}

async fn start_collaborators(
    ctx: &PipelineContext,
    cancel: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = vec![
        spawn_notifier(&ctx.events, notifier_for(&ctx.settings), cancel.clone()).await,
    ];
    if let Some(dir) = &ctx.settings.export_dir {
        let export = DirectoryExport::new(ctx.tables.clone(), dir);
        handles.push(spawn_export(&ctx.events, export, cancel).await);
    }
    handles
}

async fn classify(settings: &Settings, file: &Path) -> Result<(), CliError> {
    let rules = JsonRuleSource::new(&settings.rules_path).snapshot().await?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sheet = read_sheet(&name, &tokio::fs::read(file).await?)?;
    let result = Classifier::new(rules.rules()).classify_sheet(&sheet, &name);
    output::print_classification(&name, &result)
}
