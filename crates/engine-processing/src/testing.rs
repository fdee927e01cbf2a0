use crate::context::PipelineContext;
use connectors::store::local::LocalFileStore;
use engine_config::{
    rules::{RuleSnapshot, source::StaticRuleSource},
    settings::Settings,
};
use engine_core::{
    event_bus::bus::EventBus, metrics::Metrics, state::sled_store::SledStateStore,
    status::NoopStatusSink, tables::csv_store::CsvTableStore,
};
use model::core::category::Category;
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;

pub const RULES: &str = r#"{
    "categories": [
        { "category": "BA Produk SHO", "required_keys": ["ID", "Nama", "Terjual"], "filename_pattern": "produk" },
        { "category": "BA Dash SHO", "required_keys": ["Tanggal", "Penjualan"], "header_row": 1, "data_row": 2 },
        { "category": "Proyeksi SHO", "required_keys": ["Bulan", "Target"] }
    ],
    "validation": [
        { "category": "BA Produk SHO", "reference": { "100": "GS", "101": "GS", "200": "HYDR" }, "match_threshold": 0.5 }
    ],
    "schemas": [
        { "category": "BA Produk SHO", "columns": ["ID", "Nama", "Total Terjual"] },
        { "category": "BA Dash SHO", "columns": ["Tanggal", "Penjualan"] },
        { "category": "Proyeksi SHO", "columns": ["Bulan", "Target"] }
    ],
    "special_columns": [
        { "category": "BA Produk SHO", "target_column": "Total Terjual", "action": "SUM_PREFIX", "prefix": "terjual" }
    ]
}"#;

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Temporary stores wired into a context with fast timings.
pub struct Harness {
    pub dir: TempDir,
    pub ctx: PipelineContext,
    pub produk: Category,
    pub dash: Category,
    pub proyeksi: Category,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_root(dir.path().join("store"));
        settings.workers = 2;
        settings.batch_size = 10;
        settings.retry_delay = Duration::from_millis(1);
        settings.retry_max_delay = Duration::from_millis(2);
        settings.lock_timeout = Duration::from_millis(20);
        settings.split_cooldown = Duration::from_millis(1);

        let snapshot = RuleSnapshot::from_bytes(RULES.as_bytes()).unwrap();
        let ctx = PipelineContext {
            state: Arc::new(SledStateStore::open(dir.path().join("state")).unwrap()),
            tables: Arc::new(CsvTableStore::open(dir.path().join("tables")).unwrap()),
            files: Arc::new(LocalFileStore::new(&settings.root)),
            rules: Arc::new(StaticRuleSource(Arc::new(snapshot))),
            status: Arc::new(NoopStatusSink),
            events: EventBus::new(),
            metrics: Metrics::new(),
            instance: "test".to_string(),
            settings: Arc::new(settings),
        };

        Self {
            dir,
            ctx,
            produk: "BA Produk SHO".parse().unwrap(),
            dash: "BA Dash SHO".parse().unwrap(),
            proyeksi: "Proyeksi SHO".parse().unwrap(),
        }
    }
}
