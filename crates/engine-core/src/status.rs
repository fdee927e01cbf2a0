use async_trait::async_trait;
use model::execution::job::CategoryJobState;

/// Write-only surface that mirrors job state for humans. Implementations
/// swallow and log their own failures.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, state: &CategoryJobState);
}

pub struct NoopStatusSink;

#[async_trait]
impl StatusSink for NoopStatusSink {
    async fn publish(&self, _state: &CategoryJobState) {}
}
