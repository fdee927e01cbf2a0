use crate::error::RuntimeError;
use engine_core::{
    event_bus::bus::EventBus,
    tables::{TableNames, TableStore},
};
use model::{core::category::Category, events::pipeline::PipelineEvent};
use std::{path::PathBuf, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Hands finalized canonical tables to a downstream loader by dropping a
/// CSV copy into a watched directory.
#[derive(Clone)]
pub struct DirectoryExport {
    tables: Arc<dyn TableStore>,
    dir: PathBuf,
}

impl DirectoryExport {
    pub fn new(tables: Arc<dyn TableStore>, dir: impl Into<PathBuf>) -> Self {
        Self {
            tables,
            dir: dir.into(),
        }
    }

    /// Writes `<dir>/<slug>.csv` and returns its path.
    pub async fn export(&self, category: Category) -> Result<PathBuf, RuntimeError> {
        let canonical = TableNames::canonical(category);
        let header = self.tables.header(&canonical).await?;
        let rows = self.tables.rows(&canonical).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&header)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| RuntimeError::Io(e.into_error()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.csv", category.slug()));
        let tmp = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!(category = %category, rows = rows.len(), path = %path.display(), "Exported canonical table");
        Ok(path)
    }
}

/// Exports every category whose merge completes. Runs detached from
/// finalization; a failed export is only logged.
pub async fn spawn_export(
    events: &EventBus<PipelineEvent>,
    export: DirectoryExport,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let (_, mut rx) = events.subscribe(64).await;
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let PipelineEvent::MergeCompleted { category, .. } = event.as_ref()
                && let Err(e) = export.export(*category).await
            {
                error!(category = %category, error = %e, "Export failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::tables::csv_store::CsvTableStore;

    #[tokio::test]
    async fn exports_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let tables = Arc::new(CsvTableStore::open(dir.path().join("tables")).unwrap());
        let category: Category = "Proyeksi LAZ".parse().unwrap();
        let canonical = TableNames::canonical(category);
        tables
            .create(&canonical, &["Bulan".to_string(), "Target".to_string()])
            .await
            .unwrap();
        tables
            .append(&canonical, &[vec!["Jan".to_string(), "1.500".to_string()]])
            .await
            .unwrap();

        let path = DirectoryExport::new(tables, dir.path().join("out"))
            .export(category)
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "proyeksi_laz.csv");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Bulan,Target\nJan,1.500\n");
    }
}
