use crate::job::JobTracker;
use connectors::store::FileStore;
use engine_config::{rules::source::RuleSource, settings::Settings};
use engine_core::{
    event_bus::bus::EventBus, metrics::Metrics, state::StateStore, status::StatusSink,
    tables::TableStore,
};
use model::events::pipeline::PipelineEvent;
use std::sync::Arc;

/// Shared handles every split, wake and merge runs against.
#[derive(Clone)]
pub struct PipelineContext {
    pub settings: Arc<Settings>,
    pub state: Arc<dyn StateStore>,
    pub tables: Arc<dyn TableStore>,
    pub files: Arc<dyn FileStore>,
    pub rules: Arc<dyn RuleSource>,
    pub status: Arc<dyn StatusSink>,
    pub events: EventBus<PipelineEvent>,
    pub metrics: Metrics,
    /// Written into lock records so operators can see who holds a worker.
    pub instance: String,
}

impl PipelineContext {
    pub fn jobs(&self) -> JobTracker {
        JobTracker::new(self.state.clone(), self.status.clone())
    }
}
