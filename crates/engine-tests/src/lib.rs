#![allow(dead_code)]

use engine_config::settings::Settings;
use engine_processing::context::PipelineContext;
use engine_runtime::context::build_context;
use model::core::category::Category;
use std::time::Duration;
use tempfile::TempDir;

pub mod integration;
pub mod utils;

/// Rule store shared by the scenarios. Product performance is routed by
/// sampling ids against the reference table, the dashboard by the brand
/// token in its file name, projections are accepted as-is.
pub const RULES: &str = r#"{
    "categories": [
        { "category": "BA Produk SHO", "required_keys": ["ID", "Nama", "Terjual"], "filename_pattern": "produk" },
        { "category": "BA Dash SHO", "required_keys": ["Tanggal", "Penjualan"] },
        { "category": "Proyeksi SHO", "required_keys": ["Bulan", "Target"] }
    ],
    "validation": [
        {
            "category": "BA Produk SHO",
            "reference": { "100": "GS", "101": "GS", "102": "GS", "200": "HYDR" },
            "match_threshold": 0.5
        }
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

/// A store root in a temp dir with the rule store written and timings
/// shrunk so continuations follow each other quickly.
pub struct Pipeline {
    pub dir: TempDir,
    pub ctx: PipelineContext,
}

impl Pipeline {
    pub fn new(workers: u32, batch_size: usize) -> Self {
        Self::with_settings(|s| {
            s.workers = workers;
            s.batch_size = batch_size;
        })
    }

    pub fn with_settings(tweak: impl FnOnce(&mut Settings)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut settings = Settings::with_root(dir.path());
        settings.retry_delay = Duration::from_millis(1);
        settings.retry_max_delay = Duration::from_millis(4);
        settings.lock_timeout = Duration::from_millis(50);
        settings.reschedule_delay = Duration::from_millis(1);
        settings.breaker_cooldown = Duration::from_millis(20);
        settings.split_cooldown = Duration::from_millis(1);
        settings.notify_enabled = false;
        tweak(&mut settings);

        std::fs::write(&settings.rules_path, RULES).expect("write rules");
        let ctx = build_context(settings).expect("build context");
        Self { dir, ctx }
    }

    pub fn category(name: &str) -> Category {
        name.parse().expect("category")
    }
}
