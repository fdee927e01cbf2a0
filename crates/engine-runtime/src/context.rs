use crate::{collaborators::JsonStatusBoard, error::RuntimeError};
use connectors::store::local::LocalFileStore;
use engine_config::{rules::source::JsonRuleSource, settings::Settings};
use engine_core::{
    event_bus::bus::EventBus, metrics::Metrics, state::sled_store::SledStateStore,
    tables::csv_store::CsvTableStore,
};
use engine_processing::context::PipelineContext;
use std::sync::Arc;
use tracing::info;

/// Opens the durable stores under `settings` and wires a context.
pub fn build_context(settings: Settings) -> Result<PipelineContext, RuntimeError> {
    let state = SledStateStore::open(&settings.state_dir)?;
    let tables = CsvTableStore::open(settings.root.join("tables"))?;
    let instance = format!("sheetflow-{}", uuid::Uuid::new_v4());
    info!(
        root = %settings.root.display(),
        state_dir = %settings.state_dir.display(),
        instance = %instance,
        "Opened pipeline stores"
    );

    Ok(PipelineContext {
        state: Arc::new(state),
        tables: Arc::new(tables),
        files: Arc::new(LocalFileStore::new(&settings.root)),
        rules: Arc::new(JsonRuleSource::new(&settings.rules_path)),
        status: Arc::new(JsonStatusBoard::new(&settings.status_dir)),
        events: EventBus::new(),
        metrics: Metrics::new(),
        instance,
        settings: Arc::new(settings),
    })
}
