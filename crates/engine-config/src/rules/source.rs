use crate::{error::RuleStoreError, rules::RuleSnapshot};
use async_trait::async_trait;
use std::{path::PathBuf, sync::Arc};
use tracing::debug;

/// Where rule snapshots come from. Implementations re-read on every call so
/// edits show up on the next batch without a restart.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<RuleSnapshot>, RuleStoreError>;
}

/// JSON document on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonRuleSource {
    path: PathBuf,
}

impl JsonRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RuleSource for JsonRuleSource {
    async fn snapshot(&self) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| RuleStoreError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let snapshot = RuleSnapshot::from_bytes(&bytes)?;
        debug!(version = snapshot.version(), path = %self.path.display(), "Loaded rule snapshot");
        Ok(Arc::new(snapshot))
    }
}

/// Fixed snapshot, for callers that already hold one.
#[derive(Debug, Clone)]
pub struct StaticRuleSource(pub Arc<RuleSnapshot>);

#[async_trait]
impl RuleSource for StaticRuleSource {
    async fn snapshot(&self) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn rereads_file_on_every_call() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        tokio::fs::write(&path, r#"{ "categories": [] }"#).await.unwrap();

        let source = JsonRuleSource::new(&path);
        let first = source.snapshot().await.unwrap();
        assert!(first.rules().is_empty());

        tokio::fs::write(
            &path,
            r#"{
                "categories": [ { "category": "Proyeksi LAZ", "required_keys": ["bulan"] } ],
                "schemas": [ { "category": "Proyeksi LAZ", "columns": ["Bulan"] } ]
            }"#,
        )
        .await
        .unwrap();

        let second = source.snapshot().await.unwrap();
        assert_eq!(second.rules().len(), 1);
        assert_ne!(first.version(), second.version());
    }

    #[tokio::test]
    async fn missing_file_is_io_fault() {
        let dir = tempdir().unwrap();
        let source = JsonRuleSource::new(dir.path().join("nope.json"));
        assert!(matches!(
            source.snapshot().await,
            Err(RuleStoreError::Io { .. })
        ));
    }
}
