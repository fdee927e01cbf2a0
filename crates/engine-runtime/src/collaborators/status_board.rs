use async_trait::async_trait;
use engine_core::status::StatusSink;
use model::execution::job::CategoryJobState;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Mirrors each category's job state into `<dir>/<slug>.json`.
pub struct JsonStatusBoard {
    dir: PathBuf,
}

impl JsonStatusBoard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, state: &CategoryJobState) -> PathBuf {
        self.dir.join(format!("{}.json", state.category.slug()))
    }

    async fn write(&self, path: &Path, state: &CategoryJobState) -> std::io::Result<()> {
        let body = serde_json::to_vec_pretty(state)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await
    }
}

#[async_trait]
impl StatusSink for JsonStatusBoard {
    async fn publish(&self, state: &CategoryJobState) {
        let path = self.path_for(state);
        match self.write(&path, state).await {
            Ok(()) => debug!(category = %state.category, phase = %state.phase, "Status board updated"),
            Err(e) => warn!(
                category = %state.category,
                path = %path.display(),
                error = %e,
                "Failed to update status board"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::job::JobPhase;

    #[tokio::test]
    async fn writes_one_document_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let board = JsonStatusBoard::new(dir.path().join("status"));
        let mut state = CategoryJobState::idle("BA Produk SHO".parse().unwrap());
        state.phase = JobPhase::Merging;

        board.publish(&state).await;

        let raw = std::fs::read(dir.path().join("status/ba_produk_sho.json")).unwrap();
        let stored: CategoryJobState = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored, state);
    }
}
