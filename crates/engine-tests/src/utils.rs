use async_trait::async_trait;
use connectors::{
    error::FileError,
    store::{FileStore, StoreLayout},
};
use engine_processing::context::PipelineContext;
use model::{
    core::category::Category,
    events::pipeline::PipelineEvent,
    execution::routing::Bucket,
};
use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::mpsc;

/// A product performance export: every id gets `Terjual` and
/// `Terjual Promo` cells that the schema folds into `Total Terjual`.
pub fn produk_csv(ids: &[&str]) -> Vec<u8> {
    let mut out = String::from("ID,Nama,Terjual,Terjual Promo\n");
    for (i, id) in ids.iter().enumerate() {
        out.push_str(&format!("{id},Barang {id},{},2\n", i + 1));
    }
    out.into_bytes()
}

pub fn dash_csv(date: &str, sales: u64) -> Vec<u8> {
    format!("Tanggal,Penjualan\n{date},{sales}\n").into_bytes()
}

pub fn proyeksi_csv(rows: &[(&str, &str)]) -> Vec<u8> {
    let mut out = String::from("Bulan,Target\n");
    for (month, target) in rows {
        out.push_str(&format!("{month},{target}\n"));
    }
    out.into_bytes()
}

pub async fn drop_in_inbox(ctx: &PipelineContext, category: Category, files: &[(String, Vec<u8>)]) {
    let inbox = StoreLayout::inbox(category);
    for (name, bytes) in files {
        ctx.files.put(&inbox, name, bytes).await.expect("put inbox file");
    }
}

pub async fn bucket_files(ctx: &PipelineContext, category: Category, bucket: &Bucket) -> Vec<String> {
    ctx.files
        .list(&StoreLayout::bucket(category, bucket))
        .await
        .expect("list bucket")
}

pub async fn queued_files(ctx: &PipelineContext, category: Category, workers: u32) -> usize {
    let mut total = 0;
    for worker_id in 1..=workers {
        total += ctx
            .files
            .list(&StoreLayout::queue(category, worker_id))
            .await
            .expect("list queue")
            .len();
    }
    total
}

/// Everything published so far, in order.
pub fn drain_events(rx: &mut mpsc::Receiver<Arc<PipelineEvent>>) -> Vec<Arc<PipelineEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn count_events(events: &[Arc<PipelineEvent>], pred: impl Fn(&PipelineEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

/// Fails every read of a file whose name contains `flaky`, the way an
/// unreachable share does, and counts how often it was tried.
pub struct FlakyFileStore {
    inner: Arc<dyn FileStore>,
    flaky_reads: AtomicUsize,
}

impl FlakyFileStore {
    pub fn wrap(inner: Arc<dyn FileStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            flaky_reads: AtomicUsize::new(0),
        })
    }

    pub fn flaky_reads(&self) -> usize {
        self.flaky_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStore for FlakyFileStore {
    async fn list(&self, dir: &Path) -> Result<Vec<String>, FileError> {
        self.inner.list(dir).await
    }

    async fn read(&self, dir: &Path, name: &str) -> Result<Vec<u8>, FileError> {
        if name.contains("flaky") {
            self.flaky_reads.fetch_add(1, Ordering::SeqCst);
            return Err(FileError::Unavailable(format!("{name}: share offline")));
        }
        self.inner.read(dir, name).await
    }

    async fn move_file(&self, from: &Path, name: &str, to: &Path) -> Result<(), FileError> {
        self.inner.move_file(from, name, to).await
    }

    async fn put(&self, dir: &Path, name: &str, bytes: &[u8]) -> Result<(), FileError> {
        self.inner.put(dir, name, bytes).await
    }
}
